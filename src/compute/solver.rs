//! Constraint solver - position-based physics for articulated skeletons.
//!
//! Each step applies gravity and ground contact, then relaxes bone lengths,
//! joint angle limits and controller bias for a fixed number of iterations.
//! Grounded joints have their horizontal slide damped, and a final pass
//! walks the tree from the root and sets every bone to its exact length
//! inside its angle limits. There is no velocity state.
//!
//! The same solver drives training rollouts and replay, so a replay
//! reproduces training exactly given the same `PhysicsConfig`.

use crate::schema::PhysicsConfig;

use super::geometry::{Heading, Vec2, wrap_signed};
use super::kinematics::{Pose, Skeleton};

/// Iterative constraint solver.
#[derive(Debug, Clone)]
pub struct ConstraintSolver {
    config: PhysicsConfig,
}

impl ConstraintSolver {
    /// Create a new solver.
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    /// Get the physics configuration.
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Advance the pose by one timestep in place.
    ///
    /// Afterwards every bone has its exact length and lies within its
    /// angle limits.
    pub fn update(&self, pose: &mut Pose, skeleton: &Skeleton) {
        debug_assert_eq!(pose.len(), skeleton.len());

        pose.previous.copy_from_slice(&pose.positions);

        for p in &mut pose.positions {
            p.y += self.config.gravity;
        }

        let grounded = self.clamp_to_ground(pose);

        for _ in 0..self.config.iterations {
            self.relax(pose, skeleton);
        }

        self.apply_friction(pose, &grounded);
        close_chain(pose, skeleton);
    }

    /// Advance the pose by several timesteps.
    pub fn run(&self, pose: &mut Pose, skeleton: &Skeleton, steps: usize) {
        for _ in 0..steps {
            self.update(pose, skeleton);
        }
    }

    /// One relaxation pass over every non-root bone, parents first.
    fn relax(&self, pose: &mut Pose, skeleton: &Skeleton) {
        for &i in skeleton.order() {
            let bone = skeleton.bone(i);
            let Some(p) = bone.parent else {
                continue;
            };

            // Length
            let diff = pose.positions[i] - pose.positions[p];
            let dist = diff.norm();
            if is_usable(dist) {
                let correction = diff * ((bone.length - dist) / dist * 0.5);
                pose.positions[i] += correction;
                pose.positions[p] -= correction;
            }

            // Angle limits
            let limits = bone.limits();
            if !limits.is_full() {
                let diff = pose.positions[i] - pose.positions[p];
                if is_usable(diff.norm()) {
                    let current = diff.heading();
                    if !limits.contains(current) {
                        let allowed = limits.clamp(current);
                        pose.positions[i] =
                            pose.positions[p] + Vec2::from_heading(allowed) * bone.length;
                    }
                }
            }

            // Controller bias
            if let Some(deviation) = pose.deviations[i] {
                let diff = pose.positions[i] - pose.positions[p];
                if !is_usable(diff.norm()) || !deviation.is_finite() {
                    continue;
                }
                let target = limits.clamp(bone.rest_angle + deviation);
                let delta = wrap_signed(target - diff.heading());
                let rotated =
                    diff.rotated_by(self.config.correction_strength * bone.strength * delta);
                let rotated_len = rotated.norm();
                if is_usable(rotated_len) {
                    pose.positions[i] = pose.positions[p] + rotated * (bone.length / rotated_len);
                }
            }
        }
    }

    /// Clamp joints below the ground and report which ones touched it.
    fn clamp_to_ground(&self, pose: &mut Pose) -> Vec<bool> {
        let ground = self.config.ground_y;
        pose.positions
            .iter_mut()
            .map(|p| {
                let contact = p.y >= ground;
                if contact {
                    p.y = ground;
                }
                contact
            })
            .collect()
    }

    /// Damp the horizontal slide of grounded joints since the step began.
    fn apply_friction(&self, pose: &mut Pose, grounded: &[bool]) {
        let keep = 1.0 - self.config.ground_friction;
        for ((p, prev), _) in pose
            .positions
            .iter_mut()
            .zip(&pose.previous)
            .zip(grounded)
            .filter(|(_, contact)| **contact)
        {
            p.x = prev.x + (p.x - prev.x) * keep;
        }
    }
}

/// Place every child joint at its exact bone length from its parent,
/// inside the bone's angle limits. Parents are placed before children, so
/// only child joints move.
fn close_chain(pose: &mut Pose, skeleton: &Skeleton) {
    for &i in skeleton.order() {
        let bone = skeleton.bone(i);
        let Some(p) = bone.parent else {
            continue;
        };

        let diff = pose.positions[i] - pose.positions[p];
        let dist = diff.norm();
        if !is_usable(dist) {
            continue;
        }

        let limits = bone.limits();
        let current = diff.heading();
        pose.positions[i] = if limits.contains(current) {
            pose.positions[p] + diff * (bone.length / dist)
        } else {
            pose.positions[p] + Vec2::from_heading(limits.clamp(current)) * bone.length
        };
    }
}

/// Distances of zero or NaN give no usable direction.
#[inline]
fn is_usable(dist: f64) -> bool {
    dist > 0.0 && dist.is_finite()
}
