//! Compute module - Numerical computation for skeleton physics and evolution.

mod brain;
mod geometry;
mod kinematics;
mod rollout;
mod solver;

pub mod evolution;

pub use brain::*;
pub use geometry::*;
pub use kinematics::*;
pub use rollout::*;
pub use solver::*;
