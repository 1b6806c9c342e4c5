//! Model artifacts: the on-disk form of a trained value function.
//!
//! An artifact bundles an architecture descriptor, an ordered list of
//! row-major parameter tensors and the metadata needed to interpret them
//! (input dimension, validated domain, optional input normalization, output
//! scaling). Two encodings are accepted, see [`codec`]:
//!
//! ```text
//! JSON    { "format_version": 1, "architecture": { "kind": "mlp", ... }, ... }
//! binary  b"HJVB" ++ rkyv archive of ModelArtifact
//! ```
//!
//! Artifacts are produced by an offline training pipeline. This crate only
//! reads and validates them (and writes them back for tooling and tests).

pub mod codec;

use rkyv::Archive;
use serde::{Deserialize, Serialize};

pub use codec::{decode, encode_binary, encode_json, read, write_binary, write_json};

/// The only artifact layout this engine understands.
pub const FORMAT_VERSION: u32 = 1;

/// Row-major numeric tensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Archive, rkyv::Serialize, rkyv::Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Self {
        Self { shape, data }
    }

    pub fn vector(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Number of elements implied by the shape; `None` if the product
    /// overflows `usize`.
    pub fn numel(&self) -> Option<usize> {
        self.shape.iter().try_fold(1usize, |n, d| n.checked_mul(*d))
    }
}

/// Elementwise nonlinearity applied after every hidden dense layer.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Archive, rkyv::Serialize, rkyv::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Tanh,
    Sine,
    Softplus,
    Sigmoid,
    Relu,
    Identity,
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Activation::Tanh => write!(f, "tanh"),
            Activation::Sine => write!(f, "sine"),
            Activation::Softplus => write!(f, "softplus"),
            Activation::Sigmoid => write!(f, "sigmoid"),
            Activation::Relu => write!(f, "relu"),
            Activation::Identity => write!(f, "identity"),
        }
    }
}

/// Architecture descriptor. Selects the [`ValueModel`](crate::evaluator::ValueModel)
/// implementation at load time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Archive, rkyv::Serialize, rkyv::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Architecture {
    /// Dense network. Parameters are `[W1, b1, W2, b2, ...]` with `Wk` shaped
    /// `[out, in]`; the last layer has a single output and no activation.
    Mlp { activation: Activation },
    /// Tabulated values on a regular lattice over `[lower, upper]` (model
    /// coordinates), multilinearly interpolated. One parameter tensor shaped
    /// `cells`.
    Grid {
        cells: Vec<usize>,
        lower: Vec<f64>,
        upper: Vec<f64>,
    },
}

impl Architecture {
    pub fn kind(&self) -> &'static str {
        match self {
            Architecture::Mlp { .. } => "mlp",
            Architecture::Grid { .. } => "grid",
        }
    }
}

/// Box over which the training data gives validated accuracy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Archive, rkyv::Serialize, rkyv::Deserialize)]
pub struct InputBounds {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

/// Affine input normalization `z = (x - mean) / std`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Archive, rkyv::Serialize, rkyv::Deserialize)]
pub struct Normalization {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

/// Output de-scaling `value = scale * y + offset`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Archive, rkyv::Serialize, rkyv::Deserialize)]
pub struct OutputScale {
    pub scale: f64,
    pub offset: f64,
}

impl Default for OutputScale {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }
}

/// Metadata the meta-planner asks of a tracking value function. Every field
/// is optional; queries needing an absent field fail with
/// [`PlannerError::Unavailable`](crate::error::PlannerError::Unavailable).
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, Archive, rkyv::Serialize, rkyv::Deserialize,
)]
#[serde(default)]
pub struct PlannerParams {
    pub control_lower: Option<Vec<f64>>,
    pub control_upper: Option<Vec<f64>>,
    pub tracking_bound: Option<Vec<f64>>,
    pub max_planner_speed: Option<Vec<f64>>,
    pub priority_lower: Option<f64>,
    pub priority_upper: Option<f64>,
}

/// A complete, self-describing trained value function.
///
/// `input_bounds` and `output_scale` are optional on the wire only so that a
/// missing field is reported as a typed load error rather than a parse error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Archive, rkyv::Serialize, rkyv::Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub architecture: Architecture,
    pub parameters: Vec<Tensor>,
    pub input_dim: usize,
    #[serde(default)]
    pub input_bounds: Option<InputBounds>,
    #[serde(default)]
    pub input_normalization: Option<Normalization>,
    #[serde(default)]
    pub output_scale: Option<OutputScale>,
    #[serde(default)]
    pub planner: Option<PlannerParams>,
    #[serde(default)]
    pub description: String,
}

impl ModelArtifact {
    /// Content identity over everything that affects query answers.
    pub fn id(&self) -> ModelId {
        let mut h = blake3::Hasher::new();
        h.update(b"hjvalue.artifact");
        h.update(&self.format_version.to_le_bytes());
        h.update(self.architecture.kind().as_bytes());
        match &self.architecture {
            Architecture::Mlp { activation } => {
                h.update(activation.to_string().as_bytes());
            }
            Architecture::Grid {
                cells,
                lower,
                upper,
            } => {
                hash_usizes(&mut h, cells);
                hash_floats(&mut h, lower);
                hash_floats(&mut h, upper);
            }
        }
        h.update(&(self.input_dim as u64).to_le_bytes());
        h.update(&(self.parameters.len() as u64).to_le_bytes());
        for t in &self.parameters {
            hash_usizes(&mut h, &t.shape);
            hash_floats(&mut h, &t.data);
        }
        if let Some(b) = &self.input_bounds {
            hash_floats(&mut h, &b.min);
            hash_floats(&mut h, &b.max);
        }
        if let Some(n) = &self.input_normalization {
            hash_floats(&mut h, &n.mean);
            hash_floats(&mut h, &n.std);
        }
        if let Some(s) = &self.output_scale {
            hash_floats(&mut h, &[s.scale, s.offset]);
        }
        ModelId(*h.finalize().as_bytes())
    }
}

fn hash_usizes(h: &mut blake3::Hasher, xs: &[usize]) {
    h.update(&(xs.len() as u64).to_le_bytes());
    for x in xs {
        h.update(&(*x as u64).to_le_bytes());
    }
}

fn hash_floats(h: &mut blake3::Hasher, xs: &[f64]) {
    h.update(&(xs.len() as u64).to_le_bytes());
    for x in xs {
        h.update(&x.to_bits().to_le_bytes());
    }
}

/// BLAKE3 identity of a loaded artifact. Every query result carries the id
/// of the model that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(pub [u8; 32]);

impl ModelId {
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// First 8 bytes as hex.
    pub fn to_short(&self) -> String {
        self.0[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl std::fmt::Debug for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.to_short())
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.to_short())
    }
}
