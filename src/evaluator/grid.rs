//! Tabulated value function on a regular lattice.
//!
//! This is the representation the offline level-set toolchain exports: node
//! values on a uniform grid spanning `[lower, upper]`, row-major with the
//! last dimension fastest. Values between nodes are multilinearly
//! interpolated; outside the lattice the boundary cell is extended linearly.
//! The gradient is the exact derivative of that interpolant, so it is
//! piecewise constant along each axis and consistent with the value.

use super::ValueModel;
use crate::artifact::Tensor;
use crate::error::LoadError;

/// Corner enumeration is `2^dim`; beyond this the table itself is impractical.
pub const MAX_GRID_DIM: usize = 8;

#[derive(Clone, Debug)]
pub struct Grid {
    cells: Vec<usize>,
    lower: Vec<f64>,
    spacing: Vec<f64>,
    strides: Vec<usize>,
    data: Vec<f64>,
}

impl Grid {
    pub fn from_tensors(
        cells: &[usize],
        lower: &[f64],
        upper: &[f64],
        tensors: &[Tensor],
        input_dim: usize,
    ) -> Result<Self, LoadError> {
        let dim = cells.len();
        if dim != input_dim {
            return Err(LoadError::ShapeMismatch(format!(
                "grid has {} axes but input_dim is {}",
                dim, input_dim
            )));
        }
        if dim == 0 || dim > MAX_GRID_DIM {
            return Err(LoadError::ShapeMismatch(format!(
                "grid must have 1..={} axes, has {}",
                MAX_GRID_DIM, dim
            )));
        }
        if lower.len() != dim || upper.len() != dim {
            return Err(LoadError::ShapeMismatch(format!(
                "grid extent has {}/{} entries for {} axes",
                lower.len(),
                upper.len(),
                dim
            )));
        }
        if let Some(axis) = cells.iter().position(|n| *n < 2) {
            return Err(LoadError::ShapeMismatch(format!(
                "grid axis {} needs at least 2 nodes",
                axis
            )));
        }
        for (axis, (lo, hi)) in lower.iter().zip(upper).enumerate() {
            if !lo.is_finite() || !hi.is_finite() {
                return Err(LoadError::NonFiniteParameters {
                    tensor: "grid extent".into(),
                    index: axis,
                });
            }
            if lo >= hi {
                return Err(LoadError::ShapeMismatch(format!(
                    "grid axis {} has empty extent [{}, {}]",
                    axis, lo, hi
                )));
            }
        }

        let table = match tensors {
            [t] => t,
            _ => {
                return Err(LoadError::ShapeMismatch(format!(
                    "grid expects exactly one value table, got {} tensors",
                    tensors.len()
                )))
            }
        };
        if table.shape != cells {
            return Err(LoadError::ShapeMismatch(format!(
                "value table shape {:?} does not match grid cells {:?}",
                table.shape, cells
            )));
        }
        if table.numel() != Some(table.data.len()) {
            return Err(LoadError::ShapeMismatch(
                "value table data length does not match its shape".into(),
            ));
        }

        let spacing = cells
            .iter()
            .zip(lower.iter().zip(upper))
            .map(|(n, (lo, hi))| (hi - lo) / (*n - 1) as f64)
            .collect();
        let mut strides = vec![1usize; dim];
        for d in (0..dim - 1).rev() {
            strides[d] = strides[d + 1].checked_mul(cells[d + 1]).ok_or_else(|| {
                LoadError::ShapeMismatch(format!("grid cells {:?} overflow the index space", cells))
            })?;
        }

        Ok(Self {
            cells: cells.to_vec(),
            lower: lower.to_vec(),
            spacing,
            strides,
            data: table.data.clone(),
        })
    }

    pub fn cells(&self) -> &[usize] {
        &self.cells
    }
}

impl ValueModel for Grid {
    fn kind(&self) -> &'static str {
        "grid"
    }

    fn input_dim(&self) -> usize {
        self.cells.len()
    }

    fn parameter_count(&self) -> usize {
        self.data.len()
    }

    fn value_and_gradient(&self, z: &[f64], grad: &mut [f64]) -> f64 {
        let dim = self.cells.len();

        // Base node index and local coordinate per axis. Outside the lattice
        // the frac leaves [0, 1], which extends the edge cell linearly.
        let mut base = 0usize;
        let mut frac = [0.0f64; MAX_GRID_DIM];
        for d in 0..dim {
            let t = (z[d] - self.lower[d]) / self.spacing[d];
            let max_cell = (self.cells[d] - 2) as f64;
            let cell = t.floor().clamp(0.0, max_cell);
            // NaN survives clamp; index 0 keeps the lookup in bounds.
            let idx = if cell.is_nan() { 0 } else { cell as usize };
            base += idx * self.strides[d];
            frac[d] = t - cell;
        }

        let mut value = 0.0;
        grad.fill(0.0);
        for corner in 0..(1usize << dim) {
            let mut offset = 0usize;
            let mut weight = 1.0;
            for d in 0..dim {
                if corner & (1 << d) != 0 {
                    offset += self.strides[d];
                    weight *= frac[d];
                } else {
                    weight *= 1.0 - frac[d];
                }
            }
            let node = self.data[base + offset];
            value += weight * node;

            for (d, g) in grad.iter_mut().enumerate() {
                let mut w = if corner & (1 << d) != 0 { 1.0 } else { -1.0 };
                for k in 0..dim {
                    if k == d {
                        continue;
                    }
                    w *= if corner & (1 << k) != 0 {
                        frac[k]
                    } else {
                        1.0 - frac[k]
                    };
                }
                *g += w * node / self.spacing[d];
            }
        }
        value
    }
}
