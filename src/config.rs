//! Engine configuration.
//!
//! Read from TOML, e.g. `hjvalue.toml`:
//!
//! ```toml
//! artifact_path = "models/quadrotor_tracking.json"
//! cache_capacity = 4096            # 0 disables caching
//! cache_quantization_step = 1e-6
//! cache_shards = 16
//! # input_dim_override = 6         # diagnostic: reject other dimensions
//! ```
//!
//! Environment overrides: `HJVALUE_ARTIFACT`, `HJVALUE_CACHE_CAPACITY`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::loader::LoadOptions;

pub const ENV_ARTIFACT: &str = "HJVALUE_ARTIFACT";
pub const ENV_CACHE_CAPACITY: &str = "HJVALUE_CACHE_CAPACITY";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub artifact_path: Option<PathBuf>,
    pub cache_capacity: usize,
    /// Width of a cache slot per state component. States within one step
    /// share a slot, which bounds memory under jittery query streams; a hit
    /// still needs the exact same state, so the step does not raise the hit
    /// rate.
    pub cache_quantization_step: f64,
    pub cache_shards: usize,
    pub input_dim_override: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            artifact_path: None,
            cache_capacity: 4096,
            cache_quantization_step: 1e-6,
            cache_shards: 16,
            input_dim_override: None,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        // Relative artifact paths are relative to the config file.
        if let (Some(artifact), Some(dir)) = (&config.artifact_path, path.parent()) {
            if artifact.is_relative() {
                config.artifact_path = Some(dir.join(artifact));
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cache_quantization_step.is_finite() && self.cache_quantization_step > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "cache_quantization_step must be a positive number, got {}",
                self.cache_quantization_step
            )));
        }
        if self.cache_shards == 0 {
            return Err(ConfigError::Invalid("cache_shards must be at least 1".into()));
        }
        if self.input_dim_override == Some(0) {
            return Err(ConfigError::Invalid("input_dim_override must be positive".into()));
        }
        Ok(())
    }

    /// Apply `HJVALUE_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = lookup(ENV_ARTIFACT) {
            self.artifact_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup(ENV_CACHE_CAPACITY) {
            self.cache_capacity = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} is not a count: '{}'", ENV_CACHE_CAPACITY, raw))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            input_dim_override: self.input_dim_override,
        }
    }
}

/// One engine per model id, as in a multi-network value server.
///
/// ```toml
/// [[models]]
/// id = 0
/// artifact_path = "models/near.json"
///
/// [[models]]
/// id = 1
/// artifact_path = "models/far.hjvb"
/// cache_capacity = 0
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ModelEntry {
    pub id: u32,
    #[serde(flatten)]
    pub engine: EngineConfig,
}

impl RegistryConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(dir) = path.parent() {
            for entry in &mut config.models {
                if let Some(artifact) = &entry.engine.artifact_path {
                    if artifact.is_relative() {
                        entry.engine.artifact_path = Some(dir.join(artifact));
                    }
                }
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        for entry in &config.models {
            entry.engine.validate()?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.cache_capacity, 4096);
        assert_eq!(c.cache_shards, 16);
        assert!(c.artifact_path.is_none());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = EngineConfig::from_toml_str("cache_capacity = 0\n").unwrap();
        assert_eq!(c.cache_capacity, 0);
        assert_eq!(c.cache_quantization_step, 1e-6);
    }

    #[test]
    fn full_toml() {
        let c = EngineConfig::from_toml_str(
            r#"
artifact_path = "/models/v.json"
cache_capacity = 128
cache_quantization_step = 0.001
cache_shards = 4
input_dim_override = 6
"#,
        )
        .unwrap();
        assert_eq!(c.artifact_path, Some(PathBuf::from("/models/v.json")));
        assert_eq!(c.cache_shards, 4);
        assert_eq!(c.load_options().input_dim_override, Some(6));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("cache_quantization_step = -1.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("cache_shards = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("cache_capacity = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_overrides() {
        let c = EngineConfig::default()
            .with_overrides(|key| match key {
                ENV_ARTIFACT => Some("/tmp/a.json".into()),
                ENV_CACHE_CAPACITY => Some(" 12 ".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(c.artifact_path, Some(PathBuf::from("/tmp/a.json")));
        assert_eq!(c.cache_capacity, 12);

        let bad = EngineConfig::default().with_overrides(|key| {
            (key == ENV_CACHE_CAPACITY).then(|| "many".to_string())
        });
        assert!(bad.is_err());
    }

    #[test]
    fn relative_artifact_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hjvalue.toml");
        fs::write(&path, "artifact_path = \"models/v.json\"\n").unwrap();
        let c = EngineConfig::load(&path).unwrap();
        assert_eq!(c.artifact_path, Some(dir.path().join("models/v.json")));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            EngineConfig::load(&dir.path().join("none.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn registry_toml() {
        let r = RegistryConfig::from_toml_str(
            r#"
[[models]]
id = 0
artifact_path = "near.json"

[[models]]
id = 3
artifact_path = "far.hjvb"
cache_capacity = 0
"#,
        )
        .unwrap();
        assert_eq!(r.models.len(), 2);
        assert_eq!(r.models[1].id, 3);
        assert_eq!(r.models[1].engine.cache_capacity, 0);
        assert_eq!(r.models[0].engine.cache_capacity, 4096);
    }
}
