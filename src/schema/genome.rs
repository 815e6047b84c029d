//! Genome records: bones, creatures and their JSON form.
//!
//! A creature file looks like:
//!
//! ```json
//! {
//!   "bones": [
//!     { "id": "body", "parent": null, "length": 1, "angle": 0, "mov_angle": 0,
//!       "weight": 3, "strength": 1 },
//!     { "id": "leg", "parent": "body", "length": 50, "angle": 180, "mov_angle": 45,
//!       "weight": 1, "strength": 1 }
//!   ],
//!   "fitness": 0,
//!   "brain": null
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::compute::{NeuralNetwork, Topology};

fn default_mass() -> f64 {
    1.0
}

/// One rigid segment of a skeleton.
///
/// The bone's position in the pose is the joint at its far end; the root
/// bone's joint is the skeleton's anchor point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    /// Unique identifier within the creature.
    pub id: String,
    /// Parent bone id, `None` for the root.
    #[serde(default)]
    pub parent: Option<String>,
    /// Segment length, must be positive.
    pub length: f64,
    /// Rest angle relative to the parent, in degrees.
    #[serde(rename = "angle")]
    pub base_angle: f64,
    /// Half-width of the permitted swing around the rest angle, in degrees.
    pub mov_angle: f64,
    /// Mass used for the center of gravity.
    #[serde(default = "default_mass")]
    pub weight: f64,
    /// Multiplier on controller correction strength.
    #[serde(default = "default_mass")]
    pub strength: f64,
}

impl Bone {
    /// Create a bone with unit weight and strength.
    pub fn new(
        id: impl Into<String>,
        parent: Option<&str>,
        length: f64,
        base_angle: f64,
        mov_angle: f64,
    ) -> Self {
        Self {
            id: id.into(),
            parent: parent.map(str::to_owned),
            length,
            base_angle,
            mov_angle,
            weight: 1.0,
            strength: 1.0,
        }
    }

    /// Set the bone's mass.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the bone's correction strength multiplier.
    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }

    /// Whether this is the root bone.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A skeleton plus an optional controller and its last fitness.
///
/// Cloning deep-copies bones and controller, so two creatures never share
/// mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    /// Bones in gene order.
    pub bones: Vec<Bone>,
    /// Fitness from the last evaluation.
    #[serde(default)]
    pub fitness: f64,
    /// Neural controller.
    #[serde(default)]
    pub brain: Option<NeuralNetwork>,
}

impl Creature {
    /// Create an unevaluated creature without a controller.
    pub fn new(bones: Vec<Bone>) -> Self {
        Self {
            bones,
            fitness: 0.0,
            brain: None,
        }
    }

    /// Attach a controller.
    pub fn with_brain(mut self, brain: NeuralNetwork) -> Self {
        self.brain = Some(brain);
        self
    }

    /// Parse a creature from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Number of bones.
    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Perception vector length for this skeleton:
    /// center of gravity (x, y), root ground contact, one angle per bone.
    #[inline]
    pub fn perception_size(&self) -> usize {
        3 + self.bones.len()
    }

    /// Controller topology a brand new brain for this creature should have.
    pub fn default_topology(&self, hidden_nodes: usize) -> Topology {
        Topology {
            inputs: self.perception_size(),
            hidden: hidden_nodes,
            outputs: self.bones.len(),
        }
    }

    /// Topology of the attached controller.
    pub fn topology(&self) -> Option<Topology> {
        self.brain.as_ref().map(NeuralNetwork::topology)
    }

    /// A small quadruped-like seed creature.
    pub fn example() -> Self {
        Self::new(vec![
            Bone::new("body", None, 1.0, 90.0, 0.0).with_weight(3.0),
            Bone::new("neck", Some("body"), 40.0, -60.0, 30.0),
            Bone::new("head", Some("neck"), 20.0, 30.0, 20.0).with_weight(0.5),
            Bone::new("front_leg", Some("body"), 50.0, 60.0, 45.0).with_strength(1.5),
            Bone::new("front_foot", Some("front_leg"), 30.0, 20.0, 30.0),
            Bone::new("back_leg", Some("body"), 50.0, 120.0, 45.0).with_strength(1.5),
            Bone::new("back_foot", Some("back_leg"), 30.0, -20.0, 30.0),
            Bone::new("tail", Some("body"), 60.0, -120.0, 20.0).with_weight(0.5),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Skeleton;

    #[test]
    fn test_parse_genome_file() {
        let json = r#"{
            "bones": [
                { "id": "a", "parent": null, "length": 10, "angle": 0, "mov_angle": 0,
                  "weight": 2, "strength": 1 },
                { "id": "b", "parent": "a", "length": 25.5, "angle": 45, "mov_angle": 10,
                  "weight": 1, "strength": 0.5 }
            ],
            "fitness": 3.5,
            "brain": null
        }"#;

        let creature = Creature::from_json(json).unwrap();
        assert_eq!(creature.bone_count(), 2);
        assert!(creature.bones[0].is_root());
        assert_eq!(creature.bones[1].parent.as_deref(), Some("a"));
        assert_eq!(creature.bones[1].base_angle, 45.0);
        assert_eq!(creature.bones[1].strength, 0.5);
        assert_eq!(creature.fitness, 3.5);
        assert!(creature.brain.is_none());
    }

    #[test]
    fn test_missing_optional_fields() {
        let json = r#"{ "bones": [ { "id": "a", "length": 5, "angle": 0, "mov_angle": 0 } ] }"#;
        let creature = Creature::from_json(json).unwrap();
        assert_eq!(creature.bones[0].weight, 1.0);
        assert_eq!(creature.bones[0].strength, 1.0);
        assert_eq!(creature.bones[0].parent, None);
        assert_eq!(creature.fitness, 0.0);
    }

    #[test]
    fn test_serialized_field_names() {
        let creature = Creature::new(vec![Bone::new("a", None, 5.0, 12.0, 3.0)]);
        let value: serde_json::Value =
            serde_json::from_str(&creature.to_json_pretty().unwrap()).unwrap();

        let bone = &value["bones"][0];
        assert_eq!(bone["angle"], 12.0);
        assert_eq!(bone["mov_angle"], 3.0);
        assert!(bone["parent"].is_null());
        assert!(value["brain"].is_null());
    }

    #[test]
    fn test_clone_is_deep() {
        let original = Creature::example();
        let mut copy = original.clone();
        copy.bones[1].base_angle += 10.0;
        assert_ne!(original.bones[1].base_angle, copy.bones[1].base_angle);
    }

    #[test]
    fn test_example_is_well_formed() {
        let creature = Creature::example();
        assert!(Skeleton::resolve(&creature.bones).is_ok());
        let topology = creature.default_topology(8);
        assert_eq!(topology.inputs, 3 + creature.bone_count());
        assert_eq!(topology.outputs, creature.bone_count());
    }
}
