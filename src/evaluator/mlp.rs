//! Dense multilayer perceptron value model.
//!
//! Parameters arrive as `[W1, b1, ..., WL, bL]`, each `Wk` row-major with
//! shape `[out_k, in_k]`. Hidden layers apply the activation; the output
//! layer is affine with a single unit. The backward pass runs over the
//! pre-activations recorded during the forward pass, so the gradient is the
//! exact derivative of the value returned alongside it.

use super::ValueModel;
use crate::artifact::{Activation, Tensor};
use crate::error::LoadError;

/// One affine layer: `out = W * in + b`.
#[derive(Clone, Debug)]
pub struct Dense {
    inputs: usize,
    outputs: usize,
    weights: Vec<f64>, // [outputs * inputs], row-major
    bias: Vec<f64>,    // [outputs]
}

impl Dense {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.outputs);
        for o in 0..self.outputs {
            let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
            let mut acc = self.bias[o];
            for (w, x) in row.iter().zip(input) {
                acc += w * x;
            }
            out.push(acc);
        }
        out
    }

    /// `W^T * delta`: pulls an output-side gradient back to the inputs.
    fn backward(&self, delta: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.inputs];
        for (o, d) in delta.iter().enumerate() {
            let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
            for (acc, w) in out.iter_mut().zip(row) {
                *acc += w * d;
            }
        }
        out
    }
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Sine => x.sin(),
            Activation::Softplus => x.max(0.0) + (-x.abs()).exp().ln_1p(),
            Activation::Sigmoid => sigmoid(x),
            Activation::Relu => x.max(0.0),
            Activation::Identity => x,
        }
    }

    /// Derivative with respect to the pre-activation `x`.
    #[inline]
    pub fn derivative(self, x: f64) -> f64 {
        match self {
            Activation::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            Activation::Sine => x.cos(),
            Activation::Softplus => sigmoid(x),
            Activation::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            Activation::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Identity => 1.0,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[derive(Clone, Debug)]
pub struct Mlp {
    layers: Vec<Dense>,
    activation: Activation,
}

impl Mlp {
    /// Build from the artifact's parameter list, checking the layer chain.
    pub fn from_tensors(
        activation: Activation,
        tensors: &[Tensor],
        input_dim: usize,
    ) -> Result<Self, LoadError> {
        if tensors.is_empty() || tensors.len() % 2 != 0 {
            return Err(LoadError::ShapeMismatch(format!(
                "mlp expects weight/bias pairs, got {} tensors",
                tensors.len()
            )));
        }

        let mut layers = Vec::with_capacity(tensors.len() / 2);
        let mut fan_in = input_dim;
        for (k, pair) in tensors.chunks_exact(2).enumerate() {
            let (w, b) = (&pair[0], &pair[1]);
            if w.shape.len() != 2 {
                return Err(LoadError::ShapeMismatch(format!(
                    "layer {} weight must be 2-D, got shape {:?}",
                    k, w.shape
                )));
            }
            let (outputs, inputs) = (w.shape[0], w.shape[1]);
            if inputs != fan_in {
                return Err(LoadError::ShapeMismatch(if k == 0 {
                    format!(
                        "first layer takes {} inputs but input_dim is {}",
                        inputs, input_dim
                    )
                } else {
                    format!(
                        "layer {} takes {} inputs but layer {} produces {}",
                        k,
                        inputs,
                        k - 1,
                        fan_in
                    )
                }));
            }
            if outputs == 0 {
                return Err(LoadError::ShapeMismatch(format!("layer {} has no outputs", k)));
            }
            if w.numel() != Some(w.data.len()) || b.numel() != Some(b.data.len()) {
                return Err(LoadError::ShapeMismatch(format!(
                    "layer {} data length does not match its shape",
                    k
                )));
            }
            if b.shape != [outputs] {
                return Err(LoadError::ShapeMismatch(format!(
                    "layer {} bias shape {:?}, expected [{}]",
                    k, b.shape, outputs
                )));
            }
            layers.push(Dense {
                inputs,
                outputs,
                weights: w.data.clone(),
                bias: b.data.clone(),
            });
            fan_in = outputs;
        }

        if fan_in != 1 {
            return Err(LoadError::ShapeMismatch(format!(
                "output layer must have 1 unit, has {}",
                fan_in
            )));
        }

        Ok(Self { layers, activation })
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Layer widths from input to output, e.g. `[4, 64, 64, 1]`.
    pub fn widths(&self) -> Vec<usize> {
        let mut w = vec![self.input_dim()];
        w.extend(self.layers.iter().map(|l| l.outputs));
        w
    }
}

impl ValueModel for Mlp {
    fn kind(&self) -> &'static str {
        "mlp"
    }

    fn input_dim(&self) -> usize {
        self.layers[0].inputs
    }

    fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.bias.len())
            .sum()
    }

    fn value_and_gradient(&self, z: &[f64], grad: &mut [f64]) -> f64 {
        let (last, hidden) = match self.layers.split_last() {
            Some(split) => split,
            None => return 0.0,
        };

        // Forward, remembering each hidden pre-activation.
        let mut pre = Vec::with_capacity(hidden.len());
        let mut a = z.to_vec();
        for layer in hidden {
            let p = layer.forward(&a);
            a = p.iter().map(|x| self.activation.apply(*x)).collect();
            pre.push(p);
        }
        let value = last.forward(&a)[0];

        // Backward from the single output unit.
        let mut delta = last.backward(&[1.0]);
        for (layer, p) in hidden.iter().zip(&pre).rev() {
            for (d, x) in delta.iter_mut().zip(p) {
                *d *= self.activation.derivative(*x);
            }
            delta = layer.backward(&delta);
        }

        grad.copy_from_slice(&delta);
        value
    }
}
