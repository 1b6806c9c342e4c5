//! Loaded, queryable value functions.
//!
//! An [`Evaluator`] wraps one architecture-specific [`ValueModel`] with the
//! artifact metadata that surrounds it:
//!
//! ```text
//! x --(x - mean) / std--> z --model--> y --scale * y + offset--> V(x)
//!                                      dy/dz --chain rule--> dV/dx
//! ```
//!
//! Value and gradient always come out of the same pass over the same
//! intermediate activations. Evaluators are immutable after loading and are
//! shared between threads behind an `Arc`.

pub mod grid;
pub mod mlp;

use crate::artifact::{InputBounds, ModelId, Normalization, OutputScale, PlannerParams};
use crate::error::EvalError;

pub use grid::Grid;
pub use mlp::Mlp;

/// Capability interface implemented once per supported architecture.
///
/// Implementations work in model (normalized) coordinates and must be pure:
/// identical inputs give bit-identical outputs.
pub trait ValueModel: Send + Sync {
    /// Architecture name, as written in the artifact descriptor.
    fn kind(&self) -> &'static str;

    fn input_dim(&self) -> usize;

    fn parameter_count(&self) -> usize;

    /// Value at `z`; writes `d value / d z` into `grad` (length `input_dim`).
    fn value_and_gradient(&self, z: &[f64], grad: &mut [f64]) -> f64;
}

/// Answer to one state query.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult {
    pub value: f64,
    /// Gradient in original state-space units, one entry per input dimension.
    pub gradient: Vec<f64>,
    /// False when the state lies outside the artifact's validated bounds. The
    /// value is still the model's best-effort extrapolation.
    pub within_domain: bool,
    /// Model that produced this answer.
    pub model: ModelId,
}

/// Immutable evaluator built by the [`loader`](crate::loader).
pub struct Evaluator {
    id: ModelId,
    model: Box<dyn ValueModel>,
    bounds: InputBounds,
    normalization: Option<Normalization>,
    output: OutputScale,
    planner: Option<PlannerParams>,
    description: String,
}

impl Evaluator {
    pub(crate) fn new(
        id: ModelId,
        model: Box<dyn ValueModel>,
        bounds: InputBounds,
        normalization: Option<Normalization>,
        output: OutputScale,
        planner: Option<PlannerParams>,
        description: String,
    ) -> Self {
        Self {
            id,
            model,
            bounds,
            normalization,
            output,
            planner,
            description,
        }
    }

    /// Value and gradient at `state` from a single forward/backward pass.
    pub fn evaluate(&self, state: &[f64]) -> Result<QueryResult, EvalError> {
        let dim = self.input_dim();
        if state.len() != dim {
            return Err(EvalError::DimensionMismatch {
                expected: dim,
                found: state.len(),
            });
        }

        // Some activations (ReLU's `max`) swallow NaN, so reject it here.
        if let Some(index) = state.iter().position(|x| !x.is_finite()) {
            return Err(EvalError::NonFiniteState { index });
        }

        let within_domain = self.contains(state);

        let z: Vec<f64> = match &self.normalization {
            Some(n) => state
                .iter()
                .zip(n.mean.iter().zip(&n.std))
                .map(|(x, (m, s))| (x - m) / s)
                .collect(),
            None => state.to_vec(),
        };

        let mut gradient = vec![0.0; dim];
        let y = self.model.value_and_gradient(&z, &mut gradient);

        let value = self.output.scale * y + self.output.offset;
        match &self.normalization {
            Some(n) => {
                for (g, s) in gradient.iter_mut().zip(&n.std) {
                    *g = self.output.scale * *g / s;
                }
            }
            None => {
                for g in gradient.iter_mut() {
                    *g *= self.output.scale;
                }
            }
        }

        if !value.is_finite() {
            return Err(EvalError::NonFiniteResult("value"));
        }
        if gradient.iter().any(|g| !g.is_finite()) {
            return Err(EvalError::NonFiniteResult("gradient"));
        }

        Ok(QueryResult {
            value,
            gradient,
            within_domain,
            model: self.id,
        })
    }

    pub fn value(&self, state: &[f64]) -> Result<f64, EvalError> {
        self.evaluate(state).map(|r| r.value)
    }

    pub fn gradient(&self, state: &[f64]) -> Result<Vec<f64>, EvalError> {
        self.evaluate(state).map(|r| r.gradient)
    }

    /// Whether `state` lies inside the validated input box (bounds inclusive).
    pub fn contains(&self, state: &[f64]) -> bool {
        state.len() == self.input_dim()
            && state
                .iter()
                .zip(self.bounds.min.iter().zip(&self.bounds.max))
                .all(|(x, (lo, hi))| *lo <= *x && *x <= *hi)
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn input_dim(&self) -> usize {
        self.model.input_dim()
    }

    pub fn kind(&self) -> &'static str {
        self.model.kind()
    }

    pub fn parameter_count(&self) -> usize {
        self.model.parameter_count()
    }

    pub fn bounds(&self) -> &InputBounds {
        &self.bounds
    }

    pub fn output_scale(&self) -> OutputScale {
        self.output
    }

    pub fn planner(&self) -> Option<&PlannerParams> {
        self.planner.as_ref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("input_dim", &self.input_dim())
            .field("parameters", &self.parameter_count())
            .finish()
    }
}
