//! Generational genetic algorithm over creature genomes.
//!
//! Each generation runs Evaluate, Rank and Breed in that order. Evaluation
//! is the only parallel stage: every rollout reads its own creature and
//! nothing else, and ranking waits for all of them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use crate::compute::{BrainError, RolloutError, Simulator, Skeleton, SkeletonError, Topology};
use crate::schema::{ConfigError, Creature, ElitismMode, EvolutionConfig};

use super::genome::{GenomeRng, genome_distance};

/// Population shapes that break positional gene alignment.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PopulationError {
    #[error("Population is empty")]
    Empty,
    #[error("Individual {index} has {actual} bones, expected {expected}")]
    BoneCountMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Individual {index} has bone '{actual}' at gene {gene}, expected '{expected}'")]
    BoneLayoutMismatch {
        index: usize,
        gene: usize,
        expected: String,
        actual: String,
    },
    #[error("Individual {index} has controller topology {actual:?}, expected {expected:?}")]
    TopologyMismatch {
        index: usize,
        expected: Option<Topology>,
        actual: Option<Topology>,
    },
}

/// Errors that abort a training run.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid seed creature: {0}")]
    Skeleton(#[from] SkeletonError),
    #[error("Invalid seed controller: {0}")]
    Brain(#[from] BrainError),
    #[error("Malformed population: {0}")]
    Population(#[from] PopulationError),
    #[error("Rollout of individual {index} failed: {source}")]
    Rollout {
        index: usize,
        #[source]
        source: RolloutError,
    },
}

/// Summary of one evaluated and ranked generation.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// Generation number, starting at 0.
    pub generation: usize,
    /// Best-ranked creature, with its fitness.
    pub best: Creature,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    /// Mean pairwise genome distance.
    pub diversity: f64,
}

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    rng: GenomeRng,
    simulator: Simulator,
    seed_creature: Creature,
    population: Vec<Creature>,
    generation: usize,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create a new evolution engine from a seed genome.
    pub fn new(config: EvolutionConfig, seed_creature: Creature) -> Result<Self, EvolutionError> {
        config.validate()?;
        let skeleton = Skeleton::resolve(&seed_creature.bones)?;
        if let Some(topology) = seed_creature.topology()
            && topology.outputs != skeleton.len()
        {
            return Err(BrainError::DimensionMismatch {
                expected: skeleton.len(),
                actual: topology.outputs,
            }
            .into());
        }

        let seed = config.random_seed.unwrap_or_else(rand::random);
        debug!("Evolution seed: {seed}");

        Ok(Self {
            simulator: Simulator::new(config.simulation.clone()),
            rng: GenomeRng::new(seed),
            config,
            seed_creature,
            population: Vec::new(),
            generation: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get cancellation handle.
    ///
    /// Setting it stops the run before the next generation starts.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Current population. Fitness-descending right after ranking.
    pub fn population(&self) -> &[Creature] {
        &self.population
    }

    /// Generations completed so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Build generation 0 from the seed creature.
    ///
    /// A seed without a controller gets a fresh random one per individual.
    pub fn initialize(&mut self) {
        let topology = self.seed_creature.default_topology(self.config.hidden_nodes);
        self.population = (0..self.config.population_size)
            .map(|_| {
                let mut creature = self.seed_creature.clone();
                creature.fitness = 0.0;
                if creature.brain.is_none() {
                    creature.brain = Some(self.rng.random_brain(topology));
                }
                creature
            })
            .collect();
        self.generation = 0;
    }

    /// Check that every individual is gene-aligned with the first.
    pub fn validate_population(&self) -> Result<(), PopulationError> {
        let first = self.population.first().ok_or(PopulationError::Empty)?;
        let expected_topology = first.topology();

        for (index, creature) in self.population.iter().enumerate().skip(1) {
            if creature.bone_count() != first.bone_count() {
                return Err(PopulationError::BoneCountMismatch {
                    index,
                    expected: first.bone_count(),
                    actual: creature.bone_count(),
                });
            }
            for (gene, (a, b)) in first.bones.iter().zip(&creature.bones).enumerate() {
                if a.id != b.id || a.parent != b.parent {
                    return Err(PopulationError::BoneLayoutMismatch {
                        index,
                        gene,
                        expected: a.id.clone(),
                        actual: b.id.clone(),
                    });
                }
            }
            if creature.topology() != expected_topology {
                return Err(PopulationError::TopologyMismatch {
                    index,
                    expected: expected_topology,
                    actual: creature.topology(),
                });
            }
        }
        Ok(())
    }

    /// Score every individual.
    fn evaluate_population(&mut self) -> Result<(), EvolutionError> {
        let simulator = &self.simulator;
        let score = |creature: &Creature| simulator.simulate(creature).map(|o| o.fitness);

        #[cfg(not(target_arch = "wasm32"))]
        let results: Vec<Result<f64, RolloutError>> = self.population.par_iter().map(score).collect();

        // Sequential evaluation for WASM
        #[cfg(target_arch = "wasm32")]
        let results: Vec<Result<f64, RolloutError>> = self.population.iter().map(score).collect();

        for (index, (creature, result)) in self.population.iter_mut().zip(results).enumerate() {
            creature.fitness = result.map_err(|source| EvolutionError::Rollout { index, source })?;
        }
        Ok(())
    }

    /// Sort by fitness, descending. Ties keep their current order.
    fn rank(&mut self) {
        self.population
            .sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
    }

    /// Replace the ranked population with the next generation.
    fn breed(&mut self) {
        let size = self.config.population_size;
        let elite = self.config.elite_size().min(self.population.len());
        let pool = self.config.breeding_pool_size().min(self.population.len());

        let mut next_gen = Vec::with_capacity(size);

        if self.config.elitism == ElitismMode::CarryOver {
            next_gen.extend(self.population[..elite].iter().cloned());
        }

        let mut offspring = 0;
        while next_gen.len() < size {
            // First parents walk the elite pool in rank order, then go random
            let idx1 = if offspring < elite {
                offspring
            } else {
                self.rng.pick(elite)
            };
            let idx2 = self.rng.pick(pool);

            let mut child = self
                .rng
                .crossover(&self.population[idx1], &self.population[idx2]);
            self.rng.mutate(
                &mut child,
                self.config.mutation_rate,
                self.config.angle_mutation,
                self.config.weight_mutation,
            );

            next_gen.push(child);
            offspring += 1;
        }

        self.population = next_gen;
    }

    /// Mean pairwise genome distance.
    fn compute_diversity(&self) -> f64 {
        let n = self.population.len();
        if n < 2 {
            return 0.0;
        }

        let mut total = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                total += genome_distance(&self.population[i], &self.population[j]);
            }
        }
        total / (n * (n - 1) / 2) as f64
    }

    /// Evaluate, rank and breed one generation.
    ///
    /// The returned report describes the ranked population before breeding.
    pub fn step_generation(&mut self) -> Result<GenerationReport, EvolutionError> {
        if self.population.is_empty() {
            self.initialize();
        }
        self.validate_population()?;

        self.evaluate_population()?;
        self.rank();

        let best = self.population[0].clone();
        let avg_fitness =
            self.population.iter().map(|c| c.fitness).sum::<f64>() / self.population.len() as f64;
        let report = GenerationReport {
            generation: self.generation,
            best_fitness: best.fitness,
            best,
            avg_fitness,
            diversity: self.compute_diversity(),
        };

        self.breed();
        self.generation += 1;
        Ok(report)
    }

    /// Run evolution from generation 0 with a progress callback.
    ///
    /// Returns one report per completed generation, in generation order.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<Vec<GenerationReport>, EvolutionError>
    where
        F: FnMut(&GenerationReport),
    {
        self.initialize();
        let mut reports = Vec::with_capacity(self.config.generations);

        for _ in 0..self.config.generations {
            if self.cancelled.load(Ordering::Relaxed) {
                info!("Evolution cancelled after {} generations", self.generation);
                break;
            }

            let report = self.step_generation()?;
            info!(
                "Generation {}: best = {:.3}, avg = {:.3}, diversity = {:.3}",
                report.generation, report.best_fitness, report.avg_fitness, report.diversity
            );
            callback(&report);
            reports.push(report);
        }

        Ok(reports)
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<Vec<GenerationReport>, EvolutionError> {
        self.run_with_callback(|_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::NeuralNetwork;
    use crate::schema::{Bone, SimulationConfig};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn test_config(population_size: usize, generations: usize) -> EvolutionConfig {
        EvolutionConfig {
            population_size,
            generations,
            hidden_nodes: 4,
            random_seed: Some(42),
            simulation: SimulationConfig {
                steps: 30,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_evolution_engine_creation() {
        let mut engine = EvolutionEngine::new(test_config(10, 5), Creature::example()).unwrap();
        engine.initialize();

        assert_eq!(engine.population().len(), 10);
        assert!(engine.validate_population().is_ok());
        // Every individual gets its own controller
        assert_ne!(engine.population[0].brain, engine.population[1].brain);
    }

    #[test]
    fn test_seed_controller_is_cloned() {
        let seed = Creature::example();
        let brain = NeuralNetwork::random(seed.default_topology(3), &mut StdRng::seed_from_u64(1));
        let seed = seed.with_brain(brain.clone());

        let mut engine = EvolutionEngine::new(test_config(4, 1), seed).unwrap();
        engine.initialize();
        assert!(engine.population().iter().all(|c| c.brain.as_ref() == Some(&brain)));
    }

    #[test]
    fn test_evolution_run() {
        let config = EvolutionConfig {
            mutation_rate: 0.0,
            ..test_config(4, 3)
        };
        let mut engine = EvolutionEngine::new(config, Creature::example()).unwrap();

        let mut seen = Vec::new();
        let reports = engine.run_with_callback(|r| seen.push(r.generation)).unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(seen, vec![0, 1, 2]);
        assert!(reports.iter().enumerate().all(|(i, r)| r.generation == i));
        assert!(reports.iter().all(|r| r.best_fitness >= r.avg_fitness));
        assert_eq!(engine.population().len(), 4);
        assert_eq!(engine.generation(), 3);
    }

    #[test]
    fn test_population_size_is_fixed() {
        let mut engine = EvolutionEngine::new(test_config(7, 3), Creature::example()).unwrap();
        engine.initialize();
        for _ in 0..3 {
            engine.step_generation().unwrap();
            assert_eq!(engine.population().len(), 7);
        }
    }

    #[test]
    fn test_ranking_is_descending() {
        let mut engine = EvolutionEngine::new(test_config(8, 1), Creature::example()).unwrap();
        engine.initialize();
        engine.evaluate_population().unwrap();
        engine.rank();
        assert!(
            engine
                .population()
                .windows(2)
                .all(|w| w[0].fitness >= w[1].fitness)
        );
    }

    #[test]
    fn test_rank_ties_keep_order() {
        let mut engine = EvolutionEngine::new(test_config(4, 1), Creature::example()).unwrap();
        engine.initialize();
        for (i, creature) in engine.population.iter_mut().enumerate() {
            creature.fitness = if i == 2 { 5.0 } else { 1.0 };
            creature.bones[0].base_angle = i as f64;
        }
        engine.rank();
        let order: Vec<f64> = engine.population().iter().map(|c| c.bones[0].base_angle).collect();
        assert_eq!(order, vec![2.0, 0.0, 1.0, 3.0]);
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = || {
            let mut engine = EvolutionEngine::new(test_config(6, 3), Creature::example()).unwrap();
            engine.run().unwrap()
        };
        let a = run();
        let b = run();

        assert_eq!(a.len(), b.len());
        for (ra, rb) in a.iter().zip(&b) {
            assert_eq!(ra.best_fitness, rb.best_fitness);
            assert_eq!(ra.best, rb.best);
        }
    }

    #[test]
    fn test_carry_over_elitism_never_regresses() {
        let config = EvolutionConfig {
            elitism: ElitismMode::CarryOver,
            mutation_rate: 0.5,
            ..test_config(8, 5)
        };
        let mut engine = EvolutionEngine::new(config, Creature::example()).unwrap();
        let reports = engine.run().unwrap();

        for pair in reports.windows(2) {
            assert!(pair[1].best_fitness >= pair[0].best_fitness);
        }
    }

    #[test]
    fn test_carry_over_keeps_elites_unchanged() {
        let config = EvolutionConfig {
            elitism: ElitismMode::CarryOver,
            mutation_rate: 1.0,
            ..test_config(8, 1)
        };
        let mut engine = EvolutionEngine::new(config, Creature::example()).unwrap();
        engine.initialize();
        engine.evaluate_population().unwrap();
        engine.rank();
        let elites: Vec<Creature> = engine.population()[..2].to_vec();

        engine.breed();
        assert_eq!(&engine.population()[..2], elites.as_slice());
    }

    #[test]
    fn test_malformed_population_rejected() {
        let mut engine = EvolutionEngine::new(test_config(4, 1), Creature::example()).unwrap();
        engine.initialize();
        engine.population[2].bones.pop();
        assert!(matches!(
            engine.step_generation(),
            Err(EvolutionError::Population(PopulationError::BoneCountMismatch { index: 2, .. }))
        ));

        engine.initialize();
        engine.population[1].brain = None;
        assert!(matches!(
            engine.validate_population(),
            Err(PopulationError::TopologyMismatch { index: 1, .. })
        ));

        engine.initialize();
        engine.population[3].bones[1].id = "renamed".into();
        assert!(matches!(
            engine.validate_population(),
            Err(PopulationError::BoneLayoutMismatch { index: 3, gene: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_seed_rejected() {
        let seed = Creature::new(vec![Bone::new("a", Some("b"), 1.0, 0.0, 0.0)]);
        assert!(matches!(
            EvolutionEngine::new(test_config(4, 1), seed),
            Err(EvolutionError::Skeleton(SkeletonError::MissingRoot))
        ));

        let seed = Creature::example();
        let wrong = crate::compute::Topology {
            inputs: seed.perception_size(),
            hidden: 2,
            outputs: 1,
        };
        let seed = seed.with_brain(NeuralNetwork::random(wrong, &mut StdRng::seed_from_u64(0)));
        assert!(matches!(
            EvolutionEngine::new(test_config(4, 1), seed),
            Err(EvolutionError::Brain(BrainError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_cancellation() {
        let mut engine = EvolutionEngine::new(test_config(4, 100), Creature::example()).unwrap();
        let cancel = engine.cancel_handle();

        // Cancel immediately
        cancel.store(true, Ordering::Relaxed);

        let reports = engine.run().unwrap();
        assert!(reports.is_empty());
        assert_eq!(engine.population().len(), 4);
        assert!(engine.validate_population().is_ok());
    }
}
