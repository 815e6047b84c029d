//! Creature Evolve - Neural locomotion controllers for articulated 2D skeletons.
//!
//! This crate evolves feed-forward controllers for tree-shaped skeletons of
//! rigid bones. Every candidate is scored by a deterministic physics rollout
//! and a generational genetic algorithm turns those scores into the next
//! population.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Genome records and configuration types
//! - `compute`: Numerical computation (kinematics, constraint solver,
//!   neural controller, rollout, evolution)
//!
//! # Example
//!
//! ```rust,no_run
//! use creature_evolve::{
//!     compute::{Simulator, evolution::EvolutionEngine},
//!     schema::{Creature, EvolutionConfig},
//! };
//!
//! let creature = Creature::example();
//!
//! // Score a single creature
//! let simulator = Simulator::new(Default::default());
//! let outcome = simulator.simulate(&creature).unwrap();
//! println!("Fitness: {}", outcome.fitness);
//!
//! // Evolve a population from it
//! let config = EvolutionConfig::default();
//! let mut engine = EvolutionEngine::new(config, creature).unwrap();
//! let reports = engine.run_with_callback(|report| {
//!     println!("Generation {}: best fitness = {:.3}",
//!         report.generation, report.best_fitness);
//! }).unwrap();
//! println!("Generations run: {}", reports.len());
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{ConstraintSolver, NeuralNetwork, Pose, Simulator, Skeleton};
pub use schema::{Bone, Creature, EvolutionConfig, PhysicsConfig, SimulationConfig};
