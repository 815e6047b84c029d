//! Genome manipulation utilities for evolutionary search.
//!
//! Provides controller initialization, crossover, and mutation operations.
//! Every stochastic choice in a run is drawn from one seeded generator.

use rand::prelude::*;

use crate::compute::{NeuralNetwork, Topology};
use crate::schema::Creature;

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Fresh controller with uniform [-1, 1] weights.
    pub fn random_brain(&mut self, topology: Topology) -> NeuralNetwork {
        NeuralNetwork::random(topology, &mut self.rng)
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Build a child from two gene-aligned parents.
    ///
    /// Each bone is copied from a parent chosen by a fair coin flip. The
    /// controller is cloned wholesale from one parent, also by coin flip.
    pub fn crossover(&mut self, parent1: &Creature, parent2: &Creature) -> Creature {
        let bones = parent1
            .bones
            .iter()
            .zip(&parent2.bones)
            .map(|(b1, b2)| {
                if self.rng.gen_bool(0.5) {
                    b1.clone()
                } else {
                    b2.clone()
                }
            })
            .collect();

        let brain = if self.rng.gen_bool(0.5) {
            parent1.brain.clone()
        } else {
            parent2.brain.clone()
        };

        Creature {
            bones,
            fitness: 0.0,
            brain,
        }
    }

    /// Mutate a creature.
    ///
    /// With probability `rate` one random bone's rest angle moves by up to
    /// `angle_magnitude` degrees. The controller always gets a per-weight
    /// mutation at the same rate.
    pub fn mutate(
        &mut self,
        creature: &mut Creature,
        rate: f64,
        angle_magnitude: f64,
        weight_magnitude: f64,
    ) {
        if !creature.bones.is_empty() && self.rng.r#gen::<f64>() < rate {
            let idx = self.rng.gen_range(0..creature.bones.len());
            creature.bones[idx].base_angle += self.rng.gen_range(-1.0..=1.0) * angle_magnitude;
        }

        if let Some(brain) = &mut creature.brain {
            brain.mutate(rate, weight_magnitude, &mut self.rng);
        }
    }
}

/// Mean absolute difference of bone rest angles, in degrees.
///
/// Genomes are compared gene by gene; controllers are ignored.
pub fn genome_distance(c1: &Creature, c2: &Creature) -> f64 {
    let count = c1.bones.len().min(c2.bones.len());
    if count == 0 {
        return 0.0;
    }
    let total: f64 = c1
        .bones
        .iter()
        .zip(&c2.bones)
        .map(|(b1, b2)| (b1.base_angle - b2.base_angle).abs())
        .sum();
    total / count as f64
}
