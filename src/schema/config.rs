//! Configuration types for physics, rollout and evolution parameters.

use serde::{Deserialize, Serialize};

/// Constraint solver parameters.
///
/// Trainer and replay must run with identical values, otherwise a replayed
/// creature diverges from the rollout that scored it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Downward displacement added to every joint per step.
    pub gravity: f64,
    /// Y coordinate of the ground plane (screen coordinates, y grows downward).
    pub ground_y: f64,
    /// Relaxation iterations per step.
    pub iterations: usize,
    /// Fraction of the angular error corrected per iteration by controller bias.
    pub correction_strength: f64,
    /// Blend factor (0.0-1.0) pulling grounded joints back toward their
    /// previous horizontal position.
    pub ground_friction: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 0.5,
            ground_y: 500.0,
            iterations: 15,
            correction_strength: 0.05,
            ground_friction: 0.5,
        }
    }
}

impl PhysicsConfig {
    /// Validate physics parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gravity.is_finite() || !self.ground_y.is_finite() {
            return Err(ConfigError::NonFinite("physics"));
        }
        if self.iterations == 0 {
            return Err(ConfigError::InvalidIterations);
        }
        if !(0.0..=1.0).contains(&self.correction_strength) {
            return Err(ConfigError::OutOfUnitRange {
                field: "correction_strength",
                value: self.correction_strength,
            });
        }
        if !(0.0..=1.0).contains(&self.ground_friction) {
            return Err(ConfigError::OutOfUnitRange {
                field: "ground_friction",
                value: self.ground_friction,
            });
        }
        Ok(())
    }
}

/// Fitness definition used to reduce a rollout to a scalar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMode {
    /// Reward lifting the center of gravity and the root off the ground.
    #[default]
    Height,
    /// Reward horizontal travel of the root to the right of its anchor.
    Displacement,
}

/// Rollout parameters for scoring one creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of physics steps per rollout.
    pub steps: usize,
    /// World position of the root joint at the start of a rollout.
    pub root_anchor: (f64, f64),
    /// Controller outputs in (0, 1) map to deviations in
    /// `[-max_deviation, max_deviation]` degrees.
    pub max_deviation: f64,
    /// Root counts as touching the ground within this distance of it.
    pub ground_contact_margin: f64,
    /// A skeleton is stable when every bone's swing half-width is below this (degrees).
    pub stability_threshold: f64,
    /// Fitness definition.
    pub fitness: FitnessMode,
    /// Weight of center-of-gravity lift in height fitness.
    pub cog_weight: f64,
    /// Weight of root lift in height fitness.
    pub root_weight: f64,
    /// Physics parameters.
    pub physics: PhysicsConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            steps: 600,
            root_anchor: (300.0, 300.0),
            max_deviation: 45.0,
            ground_contact_margin: 5.0,
            stability_threshold: 1.0,
            fitness: FitnessMode::Height,
            cog_weight: 0.7,
            root_weight: 0.3,
            physics: PhysicsConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Validate rollout parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.root_anchor.0.is_finite() || !self.root_anchor.1.is_finite() {
            return Err(ConfigError::NonFinite("root_anchor"));
        }
        if !self.max_deviation.is_finite() || self.max_deviation < 0.0 {
            return Err(ConfigError::NonFinite("max_deviation"));
        }
        self.physics.validate()
    }
}

/// How the top-ranked individuals reach the next generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElitismMode {
    /// Elites are only used as first parents for crossover. The best fitness
    /// may drop between generations.
    #[default]
    Crossover,
    /// Elites are copied unchanged into the next generation, then the rest
    /// of the population is bred as usual.
    CarryOver,
}

/// Top-level configuration for a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Individuals per generation, fixed for the whole run.
    pub population_size: usize,
    /// Generations to evaluate.
    pub generations: usize,
    /// Probability of a bone-angle mutation per child, also the per-weight
    /// mutation probability of the controller.
    pub mutation_rate: f64,
    /// Hidden layer width for controllers created from scratch.
    pub hidden_nodes: usize,
    /// Maximum base-angle perturbation in degrees.
    pub angle_mutation: f64,
    /// Maximum perturbation of a controller weight or bias.
    pub weight_mutation: f64,
    /// Elitism policy.
    pub elitism: ElitismMode,
    /// Random seed for reproducibility.
    pub random_seed: Option<u64>,
    /// Rollout settings.
    pub simulation: SimulationConfig,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            generations: 20,
            mutation_rate: 0.05,
            hidden_nodes: 16,
            angle_mutation: 5.0,
            weight_mutation: 0.1,
            elitism: ElitismMode::default(),
            random_seed: None,
            simulation: SimulationConfig::default(),
        }
    }
}

impl EvolutionConfig {
    /// Size of the elite pool: a quarter of the population, at least one.
    pub fn elite_size(&self) -> usize {
        (self.population_size / 4).max(1)
    }

    /// Size of the breeding pool for second parents: the top half, at least one.
    pub fn breeding_pool_size(&self) -> usize {
        (self.population_size / 2).max(1)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::OutOfUnitRange {
                field: "mutation_rate",
                value: self.mutation_rate,
            });
        }
        if self.hidden_nodes == 0 {
            return Err(ConfigError::InvalidHiddenNodes);
        }
        if !self.angle_mutation.is_finite() || !self.weight_mutation.is_finite() {
            return Err(ConfigError::NonFinite("mutation magnitude"));
        }
        self.simulation.validate()
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be non-zero")]
    EmptyPopulation,
    #[error("Solver iteration count must be non-zero")]
    InvalidIterations,
    #[error("Hidden layer must have at least one node")]
    InvalidHiddenNodes,
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },
    #[error("{0} must be finite")]
    NonFinite(&'static str),
}
