//! Artifact builders shared by the integration tests.

#![allow(dead_code)]

use hjvalue::artifact::{
    self, Activation, Architecture, InputBounds, ModelArtifact, OutputScale, PlannerParams,
    Tensor, FORMAT_VERSION,
};
use hjvalue::ArtifactSource;

/// Deterministic pseudo-random weights in roughly [-0.8, 0.8].
fn weights(seed: u64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.8 * ((i as f64 + 1.0) * 1.618 + seed as f64 * 2.71).sin())
        .collect()
}

/// Fully connected network `widths[0] -> ... -> 1` on the box [-1, 1]^dim.
pub fn mlp(seed: u64, activation: Activation, widths: &[usize]) -> ModelArtifact {
    let mut parameters = Vec::new();
    let mut k = seed * 1000;
    let mut dims: Vec<usize> = widths.to_vec();
    dims.push(1);
    for pair in dims.windows(2) {
        let (inputs, outputs) = (pair[0], pair[1]);
        parameters.push(Tensor::new(vec![outputs, inputs], weights(k, inputs * outputs)));
        k += 1;
        parameters.push(Tensor::vector(weights(k, outputs)));
        k += 1;
    }
    let dim = widths[0];
    ModelArtifact {
        format_version: FORMAT_VERSION,
        architecture: Architecture::Mlp { activation },
        parameters,
        input_dim: dim,
        input_bounds: Some(InputBounds {
            min: vec![-1.0; dim],
            max: vec![1.0; dim],
        }),
        input_normalization: None,
        output_scale: Some(OutputScale {
            scale: 2.0,
            offset: -0.25,
        }),
        planner: None,
        description: format!("test network seed {}", seed),
    }
}

/// The canonical 2-D scenario: `2 -> 8 -> 8 -> 1` tanh on [-1, 1]^2.
pub fn planar(seed: u64) -> ModelArtifact {
    mlp(seed, Activation::Tanh, &[2, 8, 8])
}

/// `n x n` grid of `sin(x) * cos(y)` over [-1, 1]^2.
pub fn grid(n: usize) -> ModelArtifact {
    let step = 2.0 / (n - 1) as f64;
    let mut data = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let x = -1.0 + i as f64 * step;
            let y = -1.0 + j as f64 * step;
            data.push(x.sin() * y.cos());
        }
    }
    ModelArtifact {
        format_version: FORMAT_VERSION,
        architecture: Architecture::Grid {
            cells: vec![n, n],
            lower: vec![-1.0, -1.0],
            upper: vec![1.0, 1.0],
        },
        parameters: vec![Tensor::new(vec![n, n], data)],
        input_dim: 2,
        input_bounds: Some(InputBounds {
            min: vec![-1.0, -1.0],
            max: vec![1.0, 1.0],
        }),
        input_normalization: None,
        output_scale: Some(OutputScale::default()),
        planner: Some(PlannerParams {
            control_lower: Some(vec![-0.5, -0.5]),
            control_upper: Some(vec![0.5, 0.5]),
            tracking_bound: Some(vec![0.1, 0.1]),
            max_planner_speed: Some(vec![1.0, 1.0]),
            priority_lower: Some(-0.5),
            priority_upper: Some(0.5),
        }),
        description: String::new(),
    }
}

pub fn source(artifact: &ModelArtifact) -> ArtifactSource {
    match artifact::encode_json(artifact) {
        Ok(bytes) => ArtifactSource::Bytes(bytes),
        Err(e) => panic!("encode failed: {}", e),
    }
}
