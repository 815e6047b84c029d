//! Neural controller - fixed-topology feed-forward network.
//!
//! One hidden layer, sigmoid activations on both layers. The topology is
//! chosen once for a lineage and never resized.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Layer sizes of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topology {
    pub inputs: usize,
    pub hidden: usize,
    pub outputs: usize,
}

/// Controller errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrainError {
    #[error("Expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Invalid controller record: {0}")]
    InvalidRecord(String),
}

/// Feed-forward controller mapping perception to per-bone outputs in (0, 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BrainRecord", into = "BrainRecord")]
pub struct NeuralNetwork {
    topology: Topology,
    /// hidden x inputs
    weights_ih: Vec<Vec<f64>>,
    /// outputs x hidden
    weights_ho: Vec<Vec<f64>>,
    bias_h: Vec<f64>,
    bias_o: Vec<f64>,
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn random_matrix<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|_| (0..cols).map(|_| rng.gen_range(-1.0..=1.0)).collect())
        .collect()
}

/// `sigmoid(weights · inputs + bias)` for one layer.
fn layer(weights: &[Vec<f64>], bias: &[f64], inputs: &[f64]) -> Vec<f64> {
    weights
        .iter()
        .zip(bias)
        .map(|(row, b)| {
            let sum: f64 = row.iter().zip(inputs).map(|(w, x)| w * x).sum();
            sigmoid(sum + b)
        })
        .collect()
}

impl NeuralNetwork {
    /// Create a network with every weight and bias drawn uniformly from [-1, 1].
    pub fn random<R: Rng + ?Sized>(topology: Topology, rng: &mut R) -> Self {
        Self {
            topology,
            weights_ih: random_matrix(topology.hidden, topology.inputs, rng),
            weights_ho: random_matrix(topology.outputs, topology.hidden, rng),
            bias_h: (0..topology.hidden)
                .map(|_| rng.gen_range(-1.0..=1.0))
                .collect(),
            bias_o: (0..topology.outputs)
                .map(|_| rng.gen_range(-1.0..=1.0))
                .collect(),
        }
    }

    /// Create a network from explicit weights.
    ///
    /// `weights_ih` is hidden x inputs, `weights_ho` is outputs x hidden.
    pub fn from_weights(
        weights_ih: Vec<Vec<f64>>,
        weights_ho: Vec<Vec<f64>>,
        bias_h: Vec<f64>,
        bias_o: Vec<f64>,
    ) -> Result<Self, BrainError> {
        let hidden = weights_ih.len();
        let inputs = weights_ih.first().map_or(0, Vec::len);
        let outputs = weights_ho.len();

        let invalid = |what: &str| Err(BrainError::InvalidRecord(what.to_string()));
        if hidden == 0 || inputs == 0 || outputs == 0 {
            return invalid("layers must be non-empty");
        }
        if weights_ih.iter().any(|row| row.len() != inputs) {
            return invalid("weights_ih rows differ in length");
        }
        if weights_ho.iter().any(|row| row.len() != hidden) {
            return invalid("weights_ho rows must match hidden layer size");
        }
        if bias_h.len() != hidden || bias_o.len() != outputs {
            return invalid("bias length does not match layer size");
        }

        Ok(Self {
            topology: Topology {
                inputs,
                hidden,
                outputs,
            },
            weights_ih,
            weights_ho,
            bias_h,
            bias_o,
        })
    }

    #[inline]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Run the network forward.
    pub fn predict(&self, inputs: &[f64]) -> Result<Vec<f64>, BrainError> {
        if inputs.len() != self.topology.inputs {
            return Err(BrainError::DimensionMismatch {
                expected: self.topology.inputs,
                actual: inputs.len(),
            });
        }
        let hidden = layer(&self.weights_ih, &self.bias_h, inputs);
        Ok(layer(&self.weights_ho, &self.bias_o, &hidden))
    }

    /// Perturb each weight and bias with probability `rate` by a uniform
    /// draw from `[-magnitude, magnitude]`.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rate: f64, magnitude: f64, rng: &mut R) {
        let weights = self
            .weights_ih
            .iter_mut()
            .chain(self.weights_ho.iter_mut())
            .flat_map(|row| row.iter_mut());
        let biases = self.bias_h.iter_mut().chain(self.bias_o.iter_mut());

        for value in weights.chain(biases) {
            if rng.r#gen::<f64>() < rate {
                *value += rng.gen_range(-1.0..=1.0) * magnitude;
            }
        }
    }

    /// All weights followed by all biases, in a fixed order.
    pub fn parameters(&self) -> impl Iterator<Item = f64> + '_ {
        self.weights_ih
            .iter()
            .chain(&self.weights_ho)
            .flatten()
            .chain(&self.bias_h)
            .chain(&self.bias_o)
            .copied()
    }
}

/// On-disk controller record. Biases are stored as single-column matrices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainRecord {
    #[serde(rename = "inputNodes")]
    pub input_nodes: usize,
    #[serde(rename = "hiddenNodes")]
    pub hidden_nodes: usize,
    #[serde(rename = "outputNodes")]
    pub output_nodes: usize,
    pub weights_ih: Vec<Vec<f64>>,
    pub weights_ho: Vec<Vec<f64>>,
    pub bias_h: Vec<Vec<f64>>,
    pub bias_o: Vec<Vec<f64>>,
}

fn column(matrix: Vec<Vec<f64>>, name: &str) -> Result<Vec<f64>, BrainError> {
    matrix
        .into_iter()
        .map(|row| match row.as_slice() {
            [v] => Ok(*v),
            _ => Err(BrainError::InvalidRecord(format!(
                "{name} must be a single-column matrix"
            ))),
        })
        .collect()
}

impl TryFrom<BrainRecord> for NeuralNetwork {
    type Error = BrainError;

    fn try_from(record: BrainRecord) -> Result<Self, Self::Error> {
        let network = NeuralNetwork::from_weights(
            record.weights_ih,
            record.weights_ho,
            column(record.bias_h, "bias_h")?,
            column(record.bias_o, "bias_o")?,
        )?;
        let declared = Topology {
            inputs: record.input_nodes,
            hidden: record.hidden_nodes,
            outputs: record.output_nodes,
        };
        if network.topology != declared {
            return Err(BrainError::InvalidRecord(format!(
                "declared topology {declared:?} does not match weights {:?}",
                network.topology
            )));
        }
        Ok(network)
    }
}

impl From<NeuralNetwork> for BrainRecord {
    fn from(network: NeuralNetwork) -> Self {
        Self {
            input_nodes: network.topology.inputs,
            hidden_nodes: network.topology.hidden,
            output_nodes: network.topology.outputs,
            weights_ih: network.weights_ih,
            weights_ho: network.weights_ho,
            bias_h: network.bias_h.into_iter().map(|b| vec![b]).collect(),
            bias_o: network.bias_o.into_iter().map(|b| vec![b]).collect(),
        }
    }
}
