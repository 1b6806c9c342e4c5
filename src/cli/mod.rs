pub mod convert;
pub mod inspect;
pub mod query;
pub mod time;

use std::path::{Path, PathBuf};
use std::process;

use hjvalue::{ArtifactSource, EngineConfig, ValueQueryEngine};

/// Parse `"0.1,-2,3e-4"` into a state vector.
pub fn parse_vector(what: &str, raw: &str) -> Vec<f64> {
    let mut out = Vec::new();
    for (i, part) in raw.split(',').enumerate() {
        match part.trim().parse::<f64>() {
            Ok(x) => out.push(x),
            Err(_) => {
                eprintln!("error: {} component {} is not a number: '{}'", what, i, part);
                process::exit(1);
            }
        }
    }
    out
}

/// Config from `--config` (or defaults) with environment overrides applied.
pub fn resolve_config(config: Option<&Path>) -> EngineConfig {
    let base = match config {
        Some(path) => match EngineConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };
    match base.with_env_overrides() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

/// Build a ready engine for `artifact`, falling back to the configured path.
pub fn ready_engine(artifact: Option<PathBuf>, config: EngineConfig) -> ValueQueryEngine {
    let path = match artifact.or_else(|| config.artifact_path.clone()) {
        Some(p) => p,
        None => {
            eprintln!("error: no artifact given and none configured");
            process::exit(1);
        }
    };
    let engine = ValueQueryEngine::new(config);
    if let Err(e) = engine.try_initialize(&ArtifactSource::Path(path.clone())) {
        eprintln!("error: cannot load '{}': {}", path.display(), e);
        process::exit(1);
    }
    engine
}

pub fn format_vector(xs: &[f64]) -> String {
    let parts: Vec<String> = xs.iter().map(|x| format!("{}", x)).collect();
    format!("[{}]", parts.join(", "))
}
