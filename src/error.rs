//! Typed failures for every stage of the query pipeline.
//!
//! Nothing in the engine logs-and-continues: each failure path ends in one
//! of these values, returned to the immediate caller. An out-of-domain
//! state is not an error; it is reported through `QueryResult::within_domain`.

use thiserror::Error;

/// Why an artifact could not become an [`Evaluator`](crate::evaluator::Evaluator).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("malformed artifact: {0}")]
    MalformedArtifact(String),

    #[error("artifact format version {found} is not supported (expected {supported})")]
    VersionMismatch { found: u32, supported: u32 },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("non-finite value in {tensor} at index {index}")]
    NonFiniteParameters { tensor: String, index: usize },

    #[error("cannot read artifact: {0}")]
    IOFailure(#[from] std::io::Error),
}

/// Per-evaluation failures raised by the Evaluator itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("state has {found} components, model expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("state component {index} is not finite")]
    NonFiniteState { index: usize },

    #[error("model produced a non-finite {0}")]
    NonFiniteResult(&'static str),
}

/// Per-query failures returned by the engine. All are recoverable by the
/// caller: wait for `Ready`, or fix the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine is not ready")]
    NotReady,

    #[error("engine is shutting down")]
    ShuttingDown,

    #[error("state has {found} components, model expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error(transparent)]
    Eval(EvalError),
}

impl From<EvalError> for EngineError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::DimensionMismatch { expected, found } => {
                EngineError::DimensionMismatch { expected, found }
            }
            other => EngineError::Eval(other),
        }
    }
}

/// Failure of the one-shot `initialize` transition.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("engine is already initialized")]
    AlreadyInitialized,

    #[error("engine is shutting down")]
    ShuttingDown,

    #[error("no artifact path configured")]
    NoArtifact,

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Failure of a hot reload. The previously published model stays in place.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("engine is not ready")]
    NotReady,

    #[error("engine is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Planner-facing queries that need metadata the artifact may not carry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    #[error("artifact does not provide {0}")]
    Unavailable(&'static str),

    #[error("{what} has {found} components, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Lookup failures in a multi-model registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no model registered under id {0}")]
    UnknownModel(u32),

    #[error("duplicate model id {0}")]
    DuplicateId(u32),

    #[error("model {id}: {source}")]
    Init {
        id: u32,
        #[source]
        source: InitError,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RegistryError {
    /// The load failure behind an `Init` error, if any.
    pub fn init_error(&self) -> Option<&InitError> {
        match self {
            RegistryError::Init { source, .. } => Some(source),
            _ => None,
        }
    }
}
