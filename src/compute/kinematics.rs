//! Skeleton kinematics - resolves a bone tree into rest angles and joint positions.
//!
//! Bones may appear in any order. Resolution builds a parent-to-children
//! adjacency list once and walks it breadth-first from the root, so each
//! child is placed after its parent.

use std::collections::{HashMap, VecDeque};

use crate::schema::Bone;

use super::geometry::{AngleRange, Heading, Vec2};

/// Structural errors that make a skeleton unusable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkeletonError {
    #[error("Skeleton has no root bone (every bone has a parent)")]
    MissingRoot,
    #[error("Skeleton has {0} root bones, expected exactly one")]
    MultipleRoots(usize),
    #[error("Bone id '{0}' appears more than once")]
    DuplicateBone(String),
    #[error("Bone '{id}' is not connected to the root (parent '{parent}')")]
    DisconnectedBone { id: String, parent: String },
    #[error("Bone '{id}' is invalid: {reason}")]
    InvalidBone { id: String, reason: &'static str },
}

/// Per-bone data the solver reads every step.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBone {
    /// Parent index, `None` for the root.
    pub parent: Option<usize>,
    pub length: f64,
    /// Global rest angle: sum of local rest angles from the root down.
    pub rest_angle: f64,
    pub mov_angle: f64,
    pub weight: f64,
    pub strength: f64,
}

impl ResolvedBone {
    /// Permitted global angles for this bone.
    #[inline]
    pub fn limits(&self) -> AngleRange {
        AngleRange::around(self.rest_angle, self.mov_angle)
    }
}

/// Immutable simulation view of a creature's bones.
///
/// Indices follow the genome's bone order.
#[derive(Debug, Clone)]
pub struct Skeleton {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    bones: Vec<ResolvedBone>,
    root: usize,
    /// Breadth-first order from the root.
    order: Vec<usize>,
}

impl Skeleton {
    /// Resolve a bone list into a skeleton.
    pub fn resolve(bones: &[Bone]) -> Result<Self, SkeletonError> {
        let mut index = HashMap::with_capacity(bones.len());
        for (i, bone) in bones.iter().enumerate() {
            validate_bone(bone)?;
            if index.insert(bone.id.clone(), i).is_some() {
                return Err(SkeletonError::DuplicateBone(bone.id.clone()));
            }
        }

        let roots: Vec<usize> = bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_root())
            .map(|(i, _)| i)
            .collect();
        let root = match roots.as_slice() {
            [] => return Err(SkeletonError::MissingRoot),
            [root] => *root,
            many => return Err(SkeletonError::MultipleRoots(many.len())),
        };

        let mut parents = vec![None; bones.len()];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); bones.len()];
        for (i, bone) in bones.iter().enumerate() {
            if let Some(parent_id) = &bone.parent {
                let p = *index
                    .get(parent_id)
                    .ok_or_else(|| SkeletonError::DisconnectedBone {
                        id: bone.id.clone(),
                        parent: parent_id.clone(),
                    })?;
                parents[i] = Some(p);
                children[p].push(i);
            }
        }

        let mut rest_angles = vec![0.0; bones.len()];
        let mut visited = vec![false; bones.len()];
        let mut order = Vec::with_capacity(bones.len());
        let mut queue = VecDeque::from([root]);
        rest_angles[root] = bones[root].base_angle;
        visited[root] = true;

        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &child in &children[i] {
                if !visited[child] {
                    visited[child] = true;
                    rest_angles[child] = rest_angles[i] + bones[child].base_angle;
                    queue.push_back(child);
                }
            }
        }

        // Anything unreached sits on a cycle that never touches the root
        if let Some(i) = visited.iter().position(|v| !v) {
            return Err(SkeletonError::DisconnectedBone {
                id: bones[i].id.clone(),
                parent: bones[i].parent.clone().unwrap_or_default(),
            });
        }

        let resolved = bones
            .iter()
            .zip(parents)
            .zip(rest_angles)
            .map(|((bone, parent), rest_angle)| ResolvedBone {
                parent,
                length: bone.length,
                rest_angle,
                mov_angle: bone.mov_angle,
                weight: bone.weight,
                strength: bone.strength,
            })
            .collect();

        Ok(Self {
            ids: bones.iter().map(|b| b.id.clone()).collect(),
            index,
            bones: resolved,
            root,
            order,
        })
    }

    /// Number of bones.
    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    /// A resolved skeleton always has a root, so this is never true.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[inline]
    pub fn root(&self) -> usize {
        self.root
    }

    #[inline]
    pub fn bone(&self, index: usize) -> &ResolvedBone {
        &self.bones[index]
    }

    pub fn bones(&self) -> &[ResolvedBone] {
        &self.bones
    }

    #[inline]
    pub fn id(&self, index: usize) -> &str {
        &self.ids[index]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Bone indices in breadth-first order from the root.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Place every joint from the rest angles with the root at `anchor`.
    pub fn initial_pose(&self, anchor: Vec2) -> Pose {
        let mut positions = vec![Vec2::zeros(); self.len()];
        positions[self.root] = anchor;
        for &i in &self.order {
            let bone = &self.bones[i];
            if let Some(p) = bone.parent {
                positions[i] = positions[p] + Vec2::from_heading(bone.rest_angle) * bone.length;
            }
        }
        Pose::new(positions)
    }
}

fn validate_bone(bone: &Bone) -> Result<(), SkeletonError> {
    let invalid = |reason| SkeletonError::InvalidBone {
        id: bone.id.clone(),
        reason,
    };
    if !(bone.length.is_finite() && bone.length > 0.0) {
        return Err(invalid("length must be positive"));
    }
    if !(bone.mov_angle.is_finite() && bone.mov_angle >= 0.0) {
        return Err(invalid("mov_angle must be non-negative"));
    }
    if !bone.base_angle.is_finite() {
        return Err(invalid("angle must be finite"));
    }
    // Zero weight is accepted: a massless bone is left out of the center
    // of gravity, and an all-massless skeleton uses the ground fallback
    if !(bone.weight.is_finite() && bone.weight >= 0.0) {
        return Err(invalid("weight must be non-negative"));
    }
    if !(bone.strength.is_finite() && bone.strength > 0.0) {
        return Err(invalid("strength must be positive"));
    }
    Ok(())
}

/// Transient per-rollout joint state.
///
/// Holds one position per bone plus the controller's latest target
/// deviations. Genome data never lives here.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub positions: Vec<Vec2>,
    /// Position snapshot taken at the start of the last step.
    pub previous: Vec<Vec2>,
    /// Controller output per bone in degrees, `None` when uncontrolled.
    pub deviations: Vec<Option<f64>>,
}

impl Pose {
    pub fn new(positions: Vec<Vec2>) -> Self {
        let n = positions.len();
        Self {
            previous: positions.clone(),
            positions,
            deviations: vec![None; n],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Current global angle of a bone, `None` for the root or a collapsed bone.
    pub fn bone_angle(&self, skeleton: &Skeleton, index: usize) -> Option<f64> {
        let parent = skeleton.bone(index).parent?;
        let diff = self.positions[index] - self.positions[parent];
        (diff.norm() > 0.0).then(|| diff.heading())
    }

    /// Distance between a bone's joint and its parent's joint.
    pub fn bone_length(&self, skeleton: &Skeleton, index: usize) -> Option<f64> {
        let parent = skeleton.bone(index).parent?;
        Some(self.positions[index].metric_distance(&self.positions[parent]))
    }

    /// Positions keyed by bone id, for renderers.
    pub fn positions_by_id<'a>(
        &'a self,
        skeleton: &'a Skeleton,
    ) -> impl Iterator<Item = (&'a str, Vec2)> + 'a {
        self.positions
            .iter()
            .enumerate()
            .map(|(i, &p)| (skeleton.id(i), p))
    }
}
