//! Rollout evaluator - couples a creature's controller to the physics loop
//! and reduces the trajectory to a fitness score.

use log::debug;

use crate::schema::{Creature, FitnessMode, SimulationConfig};

use super::brain::BrainError;
use super::geometry::{Heading, Vec2};
use super::kinematics::{Pose, Skeleton, SkeletonError};
use super::solver::ConstraintSolver;

/// Errors that abort a rollout.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RolloutError {
    #[error("Malformed skeleton: {0}")]
    Skeleton(#[from] SkeletonError),
    #[error("Controller mismatch: {0}")]
    Brain(#[from] BrainError),
}

/// Positions the fitness is computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RolloutSample {
    /// Step index the sample was taken after, `None` for the initial pose.
    pub step: Option<usize>,
    pub center_of_gravity: Vec2,
    pub root: Vec2,
}

/// Result of scoring one creature.
#[derive(Debug, Clone)]
pub struct RolloutOutcome {
    pub fitness: f64,
    /// Sample the fitness was computed from.
    pub basis: RolloutSample,
    /// Pose after the last step.
    pub final_pose: Pose,
    pub steps: usize,
}

/// Drives creatures through fixed-length physics rollouts.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimulationConfig,
    solver: ConstraintSolver,
}

impl Simulator {
    /// Create a new simulator.
    pub fn new(config: SimulationConfig) -> Self {
        let solver = ConstraintSolver::new(config.physics.clone());
        Self { config, solver }
    }

    /// Get the rollout configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The solver shared by training and replay.
    pub fn solver(&self) -> &ConstraintSolver {
        &self.solver
    }

    #[inline]
    fn anchor(&self) -> Vec2 {
        Vec2::new(self.config.root_anchor.0, self.config.root_anchor.1)
    }

    /// Set up a rollout that can be advanced step by step.
    pub fn start<'a>(&'a self, creature: &'a Creature) -> Result<Rollout<'a>, RolloutError> {
        let skeleton = Skeleton::resolve(&creature.bones)?;
        if let Some(brain) = &creature.brain {
            let outputs = brain.topology().outputs;
            if outputs != skeleton.len() {
                return Err(BrainError::DimensionMismatch {
                    expected: skeleton.len(),
                    actual: outputs,
                }
                .into());
            }
        }

        let pose = skeleton.initial_pose(self.anchor());
        let stable = is_stable(creature, self.config.stability_threshold);
        let initial = self.sample(&pose, &skeleton, None);

        Ok(Rollout {
            simulator: self,
            creature,
            skeleton,
            pose,
            step: 0,
            stable,
            basis: None,
            latest: initial,
        })
    }

    /// Score a creature over the configured number of steps.
    pub fn simulate(&self, creature: &Creature) -> Result<RolloutOutcome, RolloutError> {
        let mut rollout = self.start(creature)?;
        for _ in 0..self.config.steps {
            rollout.step()?;
        }
        Ok(rollout.finish())
    }

    /// Joint positions for the initial pose and after every step, for renderers.
    pub fn replay(&self, creature: &Creature) -> Result<Vec<Vec<Vec2>>, RolloutError> {
        let mut rollout = self.start(creature)?;
        let mut frames = Vec::with_capacity(self.config.steps + 1);
        frames.push(rollout.pose().positions.clone());
        for _ in 0..self.config.steps {
            rollout.step()?;
            frames.push(rollout.pose().positions.clone());
        }
        Ok(frames)
    }

    /// Perception vector: center of gravity (x, y), root ground contact,
    /// then every bone's rest angle in gene order.
    pub fn perceive(&self, pose: &Pose, skeleton: &Skeleton, creature: &Creature) -> Vec<f64> {
        let cog = self.center_of_gravity(pose, skeleton);
        let root = pose.positions[skeleton.root()];
        let ground_contact = root.y > self.config.physics.ground_y - self.config.ground_contact_margin;

        let mut inputs = Vec::with_capacity(creature.perception_size());
        inputs.push(cog.x);
        inputs.push(cog.y);
        inputs.push(if ground_contact { 1.0 } else { 0.0 });
        inputs.extend(creature.bones.iter().map(|b| b.base_angle));
        inputs
    }

    /// Weighted mean joint position, falling back to the anchor's x on the
    /// ground when no usable weight remains.
    pub fn center_of_gravity(&self, pose: &Pose, skeleton: &Skeleton) -> Vec2 {
        center_of_gravity(pose, skeleton).unwrap_or(Vec2::new(
            self.config.root_anchor.0,
            self.config.physics.ground_y,
        ))
    }

    fn sample(&self, pose: &Pose, skeleton: &Skeleton, step: Option<usize>) -> RolloutSample {
        RolloutSample {
            step,
            center_of_gravity: self.center_of_gravity(pose, skeleton),
            root: pose.positions[skeleton.root()],
        }
    }

    /// Reduce a sample to a fitness score. Never negative, never NaN.
    pub fn fitness(&self, basis: &RolloutSample, final_root: Vec2) -> f64 {
        let ground = self.config.physics.ground_y;
        let fitness = match self.config.fitness {
            FitnessMode::Height => {
                self.config.cog_weight * (ground - basis.center_of_gravity.y).max(0.0)
                    + self.config.root_weight * (ground - basis.root.y).max(0.0)
            }
            FitnessMode::Displacement => (final_root.x - self.config.root_anchor.0).max(0.0),
        };
        if fitness.is_finite() { fitness } else { 0.0 }
    }
}

/// Mass-weighted mean of all finite joint positions.
///
/// Returns `None` when the usable weight is zero.
pub fn center_of_gravity(pose: &Pose, skeleton: &Skeleton) -> Option<Vec2> {
    let mut total = 0.0;
    let mut sum = Vec2::zeros();
    for (p, bone) in pose.positions.iter().zip(skeleton.bones()) {
        if p.all_finite() && bone.weight.is_finite() {
            sum += *p * bone.weight;
            total += bone.weight;
        }
    }
    (total > 0.0).then(|| sum * (1.0 / total))
}

/// Stable when no bone can swing more than `threshold` degrees.
fn is_stable(creature: &Creature, threshold: f64) -> bool {
    creature.bones.iter().all(|b| b.mov_angle < threshold)
}

/// Pad with zeros or truncate so the vector has `len` entries.
fn fit_inputs(mut inputs: Vec<f64>, len: usize) -> Vec<f64> {
    inputs.resize(len, 0.0);
    inputs
}

/// A rollout in progress.
pub struct Rollout<'a> {
    simulator: &'a Simulator,
    creature: &'a Creature,
    skeleton: Skeleton,
    pose: Pose,
    step: usize,
    stable: bool,
    basis: Option<RolloutSample>,
    latest: RolloutSample,
}

impl Rollout<'_> {
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Steps taken so far.
    pub fn steps_taken(&self) -> usize {
        self.step
    }

    /// Feed perception through the controller, write its outputs as target
    /// deviations and advance the solver one step.
    pub fn step(&mut self) -> Result<(), RolloutError> {
        let sim = self.simulator;
        if let Some(brain) = &self.creature.brain {
            let perception = sim.perceive(&self.pose, &self.skeleton, self.creature);
            let expected = brain.topology().inputs;
            if perception.len() != expected {
                debug!(
                    "Fitting perception of {} values to controller input size {}",
                    perception.len(),
                    expected
                );
            }
            let outputs = brain.predict(&fit_inputs(perception, expected))?;
            let scale = sim.config.max_deviation;
            for (deviation, out) in self.pose.deviations.iter_mut().zip(outputs) {
                *deviation = Some((out * 2.0 - 1.0) * scale);
            }
        }

        sim.solver.update(&mut self.pose, &self.skeleton);

        self.latest = sim.sample(&self.pose, &self.skeleton, Some(self.step));
        if self.stable {
            self.basis = Some(self.latest);
        }
        self.step += 1;
        Ok(())
    }

    /// Compute fitness from the last stable sample, or the latest one.
    pub fn finish(self) -> RolloutOutcome {
        let basis = self.basis.unwrap_or(self.latest);
        let final_root = self.pose.positions[self.skeleton.root()];
        RolloutOutcome {
            fitness: self.simulator.fitness(&basis, final_root),
            basis,
            final_pose: self.pose,
            steps: self.step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::NeuralNetwork;
    use crate::compute::geometry::wrap_signed;
    use crate::schema::{Bone, PhysicsConfig};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn config(steps: usize) -> SimulationConfig {
        SimulationConfig {
            steps,
            physics: PhysicsConfig::default(),
            ..Default::default()
        }
    }

    fn with_random_brain(creature: Creature, seed: u64) -> Creature {
        let topology = creature.default_topology(6);
        let brain = NeuralNetwork::random(topology, &mut StdRng::seed_from_u64(seed));
        creature.with_brain(brain)
    }

    #[test]
    fn test_single_root_settles_on_ground() {
        let creature = Creature::new(vec![Bone::new("root", None, 1.0, 0.0, 0.0)]);
        let outcome = Simulator::new(config(600)).simulate(&creature).unwrap();

        let root = outcome.final_pose.positions[0];
        assert_eq!(root.y, 500.0);
        assert_eq!(outcome.fitness, 0.0);
    }

    #[test]
    fn test_locked_chain_under_control() {
        let creature = with_random_brain(
            Creature::new(vec![
                Bone::new("root", None, 1.0, 0.0, 0.0),
                Bone::new("child", Some("root"), 50.0, 0.0, 0.0),
            ]),
            11,
        );
        let outcome = Simulator::new(config(100)).simulate(&creature).unwrap();

        let pose = &outcome.final_pose;
        let distance = pose.positions[0].metric_distance(&pose.positions[1]);
        let angle = (pose.positions[1] - pose.positions[0]).heading();
        assert!((distance - 50.0).abs() < 1e-6);
        assert!(wrap_signed(angle).abs() < 1e-6);
    }

    #[test]
    fn test_height_fitness_before_any_step() {
        // Root and cog both 200 above the ground
        let creature = Creature::new(vec![Bone::new("root", None, 1.0, 0.0, 0.0)]);
        let outcome = Simulator::new(config(0)).simulate(&creature).unwrap();
        assert!((outcome.fitness - 200.0).abs() < 1e-9);
        assert_eq!(outcome.basis.step, None);
    }

    #[test]
    fn test_zero_weight_falls_back_to_ground() {
        let creature = Creature::new(vec![Bone::new("root", None, 1.0, 0.0, 0.0).with_weight(0.0)]);
        let outcome = Simulator::new(config(0)).simulate(&creature).unwrap();
        // Only the root term contributes
        assert!((outcome.fitness - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_displacement_fitness() {
        let creature = Creature::new(vec![Bone::new("root", None, 1.0, 0.0, 0.0)]);
        let sim = Simulator::new(SimulationConfig {
            fitness: FitnessMode::Displacement,
            ..config(50)
        });
        assert_eq!(sim.simulate(&creature).unwrap().fitness, 0.0);

        let basis = RolloutSample {
            step: Some(0),
            center_of_gravity: Vec2::new(0.0, 0.0),
            root: Vec2::new(0.0, 0.0),
        };
        assert!((sim.fitness(&basis, Vec2::new(342.0, 0.0)) - 42.0).abs() < 1e-9);
        assert_eq!(sim.fitness(&basis, Vec2::new(100.0, 0.0)), 0.0);
    }

    #[test]
    fn test_rollout_is_deterministic() {
        let creature = with_random_brain(Creature::example(), 5);
        let sim = Simulator::new(config(200));
        let a = sim.simulate(&creature).unwrap();
        let b = sim.simulate(&creature).unwrap();
        assert_eq!(a.fitness, b.fitness);
        assert_eq!(a.final_pose, b.final_pose);
    }

    #[test]
    fn test_fitness_never_nan() {
        let creature = with_random_brain(Creature::example(), 8);
        let outcome = Simulator::new(config(300)).simulate(&creature).unwrap();
        assert!(outcome.fitness.is_finite());
        assert!(outcome.fitness >= 0.0);
    }

    #[test]
    fn test_perception_layout() {
        let creature = Creature::new(vec![
            Bone::new("root", None, 1.0, 0.0, 0.0).with_weight(1.0),
            Bone::new("arm", Some("root"), 10.0, 90.0, 0.0).with_weight(1.0),
        ]);
        let sim = Simulator::new(config(0));
        let skeleton = Skeleton::resolve(&creature.bones).unwrap();
        let pose = skeleton.initial_pose(Vec2::new(300.0, 300.0));

        let inputs = sim.perceive(&pose, &skeleton, &creature);
        assert_eq!(inputs.len(), creature.perception_size());
        assert!((inputs[0] - 305.0).abs() < 1e-9);
        assert!((inputs[1] - 300.0).abs() < 1e-9);
        assert_eq!(inputs[2], 0.0);
        assert_eq!(&inputs[3..], &[0.0, 90.0]);
    }

    #[test]
    fn test_center_of_gravity_skips_nan() {
        let skeleton = Skeleton::resolve(&[
            Bone::new("root", None, 1.0, 0.0, 0.0),
            Bone::new("a", Some("root"), 1.0, 0.0, 0.0),
        ])
        .unwrap();
        let pose = Pose::new(vec![Vec2::new(1.0, 2.0), Vec2::new(f64::NAN, 0.0)]);
        assert_eq!(center_of_gravity(&pose, &skeleton), Some(Vec2::new(1.0, 2.0)));
    }

    #[test]
    fn test_brain_output_mismatch() {
        let creature = Creature::example();
        let topology = crate::compute::Topology {
            inputs: creature.perception_size(),
            hidden: 4,
            outputs: 2,
        };
        let brain = NeuralNetwork::random(topology, &mut StdRng::seed_from_u64(1));
        let creature = creature.with_brain(brain);
        assert!(matches!(
            Simulator::new(config(10)).simulate(&creature),
            Err(RolloutError::Brain(BrainError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_short_controller_input_is_padded() {
        let creature = Creature::example();
        let topology = crate::compute::Topology {
            inputs: 3,
            hidden: 4,
            outputs: creature.bone_count(),
        };
        let brain = NeuralNetwork::random(topology, &mut StdRng::seed_from_u64(1));
        let creature = creature.with_brain(brain);
        assert!(Simulator::new(config(10)).simulate(&creature).is_ok());
    }

    #[test]
    fn test_malformed_skeleton_is_an_error() {
        let creature = Creature::new(vec![
            Bone::new("root", None, 1.0, 0.0, 0.0),
            Bone::new("a", Some("b"), 1.0, 0.0, 0.0),
        ]);
        assert!(matches!(
            Simulator::new(config(10)).simulate(&creature),
            Err(RolloutError::Skeleton(SkeletonError::DisconnectedBone { .. }))
        ));

        let rootless = Creature::new(vec![Bone::new("a", Some("b"), 1.0, 0.0, 0.0)]);
        assert!(matches!(
            Simulator::new(config(10)).simulate(&rootless),
            Err(RolloutError::Skeleton(SkeletonError::MissingRoot))
        ));
    }

    #[test]
    fn test_replay_matches_simulation() {
        let creature = with_random_brain(Creature::example(), 3);
        let sim = Simulator::new(config(40));
        let frames = sim.replay(&creature).unwrap();
        let outcome = sim.simulate(&creature).unwrap();

        assert_eq!(frames.len(), 41);
        assert_eq!(frames.last().unwrap(), &outcome.final_pose.positions);
    }
}
