//! Schema module - Genome records and configuration types.

mod config;
mod genome;

pub use config::*;
pub use genome::*;
