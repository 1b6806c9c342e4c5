//! Artifact validation and Evaluator construction.
//!
//! `load` either returns a complete, immutable [`Evaluator`] or a typed
//! [`LoadError`]; nothing half-built ever escapes. Checks run in a fixed
//! order so the reported error is stable for a given artifact:
//!
//! 1. format version
//! 2. presence and consistency of input bounds, normalization, output scale
//! 3. finiteness of every parameter
//! 4. tensor shapes (data length, declared `input_dim` vs first layer)
//! 5. the optional diagnostic `input_dim_override`
//!
//! Loading touches no engine state; the engine performs its own lifecycle
//! transition after a successful load.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::artifact::{self, Architecture, ModelArtifact, OutputScale, PlannerParams, FORMAT_VERSION};
use crate::error::LoadError;
use crate::evaluator::{Evaluator, Grid, Mlp, ValueModel};

/// Where an artifact comes from.
#[derive(Clone, Debug)]
pub enum ArtifactSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl ArtifactSource {
    pub fn describe(&self) -> String {
        match self {
            ArtifactSource::Path(p) => p.display().to_string(),
            ArtifactSource::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl From<PathBuf> for ArtifactSource {
    fn from(path: PathBuf) -> Self {
        ArtifactSource::Path(path)
    }
}

impl From<&Path> for ArtifactSource {
    fn from(path: &Path) -> Self {
        ArtifactSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ArtifactSource {
    fn from(bytes: Vec<u8>) -> Self {
        ArtifactSource::Bytes(bytes)
    }
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Reject artifacts whose `input_dim` differs. Diagnostic only.
    pub input_dim_override: Option<usize>,
}

pub fn load(source: &ArtifactSource) -> Result<Evaluator, LoadError> {
    load_with(source, &LoadOptions::default())
}

pub fn load_with(source: &ArtifactSource, options: &LoadOptions) -> Result<Evaluator, LoadError> {
    let artifact = match source {
        ArtifactSource::Path(path) => artifact::read(path)?,
        ArtifactSource::Bytes(bytes) => artifact::decode(bytes)?,
    };
    debug!(source = %source.describe(), kind = artifact.architecture.kind(), "decoded artifact");
    build(artifact, options)
}

/// Validate an in-memory artifact.
pub fn load_artifact(artifact: ModelArtifact) -> Result<Evaluator, LoadError> {
    build(artifact, &LoadOptions::default())
}

fn build(artifact: ModelArtifact, options: &LoadOptions) -> Result<Evaluator, LoadError> {
    if artifact.format_version != FORMAT_VERSION {
        return Err(LoadError::VersionMismatch {
            found: artifact.format_version,
            supported: FORMAT_VERSION,
        });
    }

    let dim = artifact.input_dim;
    if dim == 0 {
        return Err(LoadError::MalformedArtifact("input_dim must be positive".into()));
    }

    let bounds = artifact
        .input_bounds
        .clone()
        .ok_or_else(|| LoadError::MalformedArtifact("missing input_bounds".into()))?;
    check_len("input_bounds.min", &bounds.min, dim)?;
    check_len("input_bounds.max", &bounds.max, dim)?;
    check_finite("input_bounds.min", &bounds.min)?;
    check_finite("input_bounds.max", &bounds.max)?;
    if let Some(i) = (0..dim).find(|i| bounds.min[*i] > bounds.max[*i]) {
        return Err(LoadError::MalformedArtifact(format!(
            "input_bounds axis {} has min {} > max {}",
            i, bounds.min[i], bounds.max[i]
        )));
    }

    let output: OutputScale = artifact
        .output_scale
        .ok_or_else(|| LoadError::MalformedArtifact("missing output_scale".into()))?;
    check_finite("output_scale", &[output.scale, output.offset])?;

    if let Some(n) = &artifact.input_normalization {
        check_len("input_normalization.mean", &n.mean, dim)?;
        check_len("input_normalization.std", &n.std, dim)?;
        check_finite("input_normalization.mean", &n.mean)?;
        check_finite("input_normalization.std", &n.std)?;
        if let Some(i) = n.std.iter().position(|s| *s <= 0.0) {
            return Err(LoadError::MalformedArtifact(format!(
                "input_normalization.std[{}] must be positive",
                i
            )));
        }
    }

    if let Some(p) = &artifact.planner {
        check_planner(p)?;
    }

    for (t, tensor) in artifact.parameters.iter().enumerate() {
        check_finite(&format!("parameters[{}]", t), &tensor.data)?;
    }
    for (t, tensor) in artifact.parameters.iter().enumerate() {
        if tensor.numel() != Some(tensor.data.len()) {
            return Err(LoadError::ShapeMismatch(format!(
                "parameters[{}] has {} values for shape {:?}",
                t,
                tensor.data.len(),
                tensor.shape
            )));
        }
    }

    let model: Box<dyn ValueModel> = match &artifact.architecture {
        Architecture::Mlp { activation } => {
            Box::new(Mlp::from_tensors(*activation, &artifact.parameters, dim)?)
        }
        Architecture::Grid {
            cells,
            lower,
            upper,
        } => Box::new(Grid::from_tensors(
            cells,
            lower,
            upper,
            &artifact.parameters,
            dim,
        )?),
    };

    if let Some(expected) = options.input_dim_override {
        if expected != dim {
            return Err(LoadError::ShapeMismatch(format!(
                "artifact input_dim {} differs from configured override {}",
                dim, expected
            )));
        }
    }

    let id = artifact.id();
    debug!(
        model = %id,
        kind = model.kind(),
        input_dim = dim,
        parameters = model.parameter_count(),
        "artifact validated"
    );

    Ok(Evaluator::new(
        id,
        model,
        bounds,
        artifact.input_normalization,
        output,
        artifact.planner,
        artifact.description,
    ))
}

fn check_len(what: &str, xs: &[f64], dim: usize) -> Result<(), LoadError> {
    if xs.len() != dim {
        return Err(LoadError::ShapeMismatch(format!(
            "{} has {} entries, input_dim is {}",
            what,
            xs.len(),
            dim
        )));
    }
    Ok(())
}

fn check_finite(what: &str, xs: &[f64]) -> Result<(), LoadError> {
    match xs.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(LoadError::NonFiniteParameters {
            tensor: what.to_string(),
            index,
        }),
        None => Ok(()),
    }
}

fn check_planner(p: &PlannerParams) -> Result<(), LoadError> {
    let fields = [
        ("planner.control_lower", &p.control_lower),
        ("planner.control_upper", &p.control_upper),
        ("planner.tracking_bound", &p.tracking_bound),
        ("planner.max_planner_speed", &p.max_planner_speed),
    ];
    for (what, xs) in fields {
        if let Some(xs) = xs {
            check_finite(what, xs)?;
        }
    }
    check_finite(
        "planner.priority",
        &[p.priority_lower, p.priority_upper]
            .iter()
            .flatten()
            .copied()
            .collect::<Vec<_>>(),
    )?;

    if let (Some(lo), Some(hi)) = (&p.control_lower, &p.control_upper) {
        if lo.len() != hi.len() {
            return Err(LoadError::MalformedArtifact(format!(
                "control bounds have {} and {} entries",
                lo.len(),
                hi.len()
            )));
        }
        if lo.iter().zip(hi).any(|(l, h)| l > h) {
            return Err(LoadError::MalformedArtifact(
                "control_lower exceeds control_upper".into(),
            ));
        }
    }
    if let Some(speed) = &p.max_planner_speed {
        if speed.iter().any(|s| *s <= 0.0) {
            return Err(LoadError::MalformedArtifact(
                "max_planner_speed must be positive".into(),
            ));
        }
    }
    if let (Some(lo), Some(hi)) = (p.priority_lower, p.priority_upper) {
        if lo >= hi {
            return Err(LoadError::MalformedArtifact(format!(
                "priority_lower {} must be below priority_upper {}",
                lo, hi
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::fixtures;
    use crate::artifact::{InputBounds, Normalization, Tensor};

    #[test]
    fn loads_both_fixtures() {
        let mlp = load_artifact(fixtures::tiny_mlp()).unwrap();
        assert_eq!(mlp.kind(), "mlp");
        assert_eq!(mlp.input_dim(), 2);
        assert_eq!(mlp.parameter_count(), 6 + 3 + 3 + 1);
        let grid = load_artifact(fixtures::tiny_grid()).unwrap();
        assert_eq!(grid.kind(), "grid");
        assert_eq!(grid.parameter_count(), 9);
    }

    #[test]
    fn loads_from_path_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.json");
        artifact::write_json(&fixtures::tiny_mlp(), &path).unwrap();
        let from_path = load(&ArtifactSource::from(path.as_path())).unwrap();
        let bytes = artifact::encode_binary(&fixtures::tiny_mlp()).unwrap();
        let from_bytes = load(&ArtifactSource::from(bytes)).unwrap();
        assert_eq!(from_path.id(), from_bytes.id());
    }

    #[test]
    fn version_mismatch() {
        let mut a = fixtures::tiny_mlp();
        a.format_version = 2;
        assert!(matches!(
            load_artifact(a),
            Err(LoadError::VersionMismatch {
                found: 2,
                supported: 1
            })
        ));
    }

    #[test]
    fn missing_bounds_or_scale_is_malformed() {
        let mut a = fixtures::tiny_mlp();
        a.input_bounds = None;
        assert!(matches!(load_artifact(a), Err(LoadError::MalformedArtifact(_))));

        let mut b = fixtures::tiny_mlp();
        b.output_scale = None;
        assert!(matches!(load_artifact(b), Err(LoadError::MalformedArtifact(_))));
    }

    #[test]
    fn inverted_bounds_are_malformed() {
        let mut a = fixtures::tiny_mlp();
        a.input_bounds = Some(InputBounds {
            min: vec![1.0, -1.0],
            max: vec![-1.0, 1.0],
        });
        assert!(matches!(load_artifact(a), Err(LoadError::MalformedArtifact(_))));
    }

    #[test]
    fn bounds_length_is_shape_checked() {
        let mut a = fixtures::tiny_mlp();
        a.input_bounds = Some(InputBounds {
            min: vec![-1.0],
            max: vec![1.0],
        });
        assert!(matches!(load_artifact(a), Err(LoadError::ShapeMismatch(_))));
    }

    #[test]
    fn nan_and_inf_parameters_are_located() {
        let mut a = fixtures::tiny_mlp();
        a.parameters[2].data[1] = f64::NAN;
        match load_artifact(a) {
            Err(LoadError::NonFiniteParameters { tensor, index }) => {
                assert_eq!(tensor, "parameters[2]");
                assert_eq!(index, 1);
            }
            other => panic!("expected NonFiniteParameters, got {:?}", other),
        }

        let mut b = fixtures::tiny_grid();
        b.parameters[0].data[4] = f64::INFINITY;
        assert!(matches!(
            load_artifact(b),
            Err(LoadError::NonFiniteParameters { .. })
        ));
    }

    #[test]
    fn declared_dim_must_match_first_layer() {
        let mut a = fixtures::tiny_mlp();
        a.input_dim = 3;
        a.input_bounds = Some(InputBounds {
            min: vec![-1.0; 3],
            max: vec![1.0; 3],
        });
        assert!(matches!(load_artifact(a), Err(LoadError::ShapeMismatch(_))));
    }

    #[test]
    fn data_length_must_match_shape() {
        let mut a = fixtures::tiny_mlp();
        a.parameters[0] = Tensor::new(vec![3, 2], vec![0.0; 5]);
        assert!(matches!(load_artifact(a), Err(LoadError::ShapeMismatch(_))));
    }

    #[test]
    fn overflowing_grid_shape_is_rejected() {
        let half = 1usize << (usize::BITS / 2);
        let mut a = fixtures::tiny_grid();
        a.architecture = Architecture::Grid {
            cells: vec![half, half],
            lower: vec![-1.0, -1.0],
            upper: vec![1.0, 1.0],
        };
        a.parameters = vec![Tensor::new(vec![half, half], vec![])];
        assert!(matches!(load_artifact(a.clone()), Err(LoadError::ShapeMismatch(_))));

        let source = ArtifactSource::Bytes(artifact::encode_json(&a).unwrap());
        assert!(matches!(load(&source), Err(LoadError::ShapeMismatch(_))));
    }

    #[test]
    fn overflowing_weight_shape_is_rejected() {
        let half = 1usize << (usize::BITS / 2);
        let mut a = fixtures::tiny_mlp();
        a.parameters[2] = Tensor::new(vec![half, half], vec![]);
        assert!(matches!(load_artifact(a), Err(LoadError::ShapeMismatch(_))));
    }

    #[test]
    fn bad_normalization_is_rejected() {
        let mut a = fixtures::tiny_mlp();
        a.input_normalization = Some(Normalization {
            mean: vec![0.0, 0.0],
            std: vec![1.0, 0.0],
        });
        assert!(matches!(load_artifact(a), Err(LoadError::MalformedArtifact(_))));
    }

    #[test]
    fn planner_consistency() {
        let mut a = fixtures::tiny_mlp();
        a.planner = Some(PlannerParams {
            control_lower: Some(vec![-1.0, -1.0]),
            control_upper: Some(vec![1.0]),
            ..Default::default()
        });
        assert!(matches!(load_artifact(a), Err(LoadError::MalformedArtifact(_))));

        let mut b = fixtures::tiny_mlp();
        b.planner = Some(PlannerParams {
            priority_lower: Some(0.5),
            priority_upper: Some(0.5),
            ..Default::default()
        });
        assert!(load_artifact(b).is_err());

        let mut c = fixtures::tiny_mlp();
        c.planner = Some(PlannerParams {
            max_planner_speed: Some(vec![1.0, f64::NAN, 1.0]),
            ..Default::default()
        });
        assert!(matches!(
            load_artifact(c),
            Err(LoadError::NonFiniteParameters { index: 1, .. })
        ));
    }

    #[test]
    fn dim_override_is_enforced() {
        let bytes = artifact::encode_json(&fixtures::tiny_mlp()).unwrap();
        let source = ArtifactSource::Bytes(bytes);
        let ok = LoadOptions {
            input_dim_override: Some(2),
        };
        assert!(load_with(&source, &ok).is_ok());
        let wrong = LoadOptions {
            input_dim_override: Some(4),
        };
        assert!(matches!(
            load_with(&source, &wrong),
            Err(LoadError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn garbage_bytes_are_malformed() {
        let source = ArtifactSource::Bytes(b"not an artifact".to_vec());
        assert!(matches!(load(&source), Err(LoadError::MalformedArtifact(_))));
    }
}
