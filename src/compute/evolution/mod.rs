//! Evolutionary search over creature genomes.
//!
//! # Overview
//!
//! - **Genome Operations** (`genome`): Controller initialization, crossover and mutation
//! - **Search** (`search`): Generational engine (evaluate, rank, breed)
//! - **Archive** (`archive`): Per-generation best-creature files and their index
//!
//! # Example
//!
//! ```rust,no_run
//! use creature_evolve::schema::{Creature, EvolutionConfig};
//! use creature_evolve::compute::evolution::{EvolutionEngine, GenerationArchive};
//!
//! let config = EvolutionConfig::default();
//! let mut engine = EvolutionEngine::new(config, Creature::example()).unwrap();
//! let mut archive = GenerationArchive::new("output").unwrap();
//! archive.reset().unwrap();
//!
//! engine.run_with_callback(|report| {
//!     archive.save_generation(report).unwrap();
//! }).unwrap();
//! archive.write_index().unwrap();
//! ```
//!
//! # Elitism
//!
//! With `ElitismMode::Crossover` the top quarter of the ranking only seeds
//! crossover, so the best fitness can drop between generations.
//! `ElitismMode::CarryOver` copies the elites unchanged and guarantees
//! the best fitness never decreases.

mod archive;
mod genome;
mod search;

pub use archive::{GenerationArchive, INDEX_FILE, generation_file, load_creature};
pub use genome::{GenomeRng, genome_distance};
pub use search::{EvolutionEngine, EvolutionError, GenerationReport, PopulationError};
