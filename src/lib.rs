//! Query engine for precomputed Hamilton–Jacobi safety value functions.
//!
//! Load an artifact (a trained network or a tabulated grid) once, then ask
//! for `V(x)` and `∇V(x)` at arbitrary states from many threads:
//!
//! ```no_run
//! use hjvalue::{ArtifactSource, EngineConfig, ValueQueryEngine};
//!
//! let engine = ValueQueryEngine::new(EngineConfig::default());
//! if !engine.initialize(&ArtifactSource::Path("model.json".into())) {
//!     return;
//! }
//! let r = engine.query(&[0.3, -0.1]).unwrap();
//! println!("V = {} grad = {:?} in domain: {}", r.value, r.gradient, r.within_domain);
//! ```

pub mod artifact;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod planner;
pub mod registry;

pub use artifact::{ModelArtifact, ModelId};
pub use config::{EngineConfig, RegistryConfig};
pub use engine::{EngineState, ModelInfo, ValueQueryEngine};
pub use error::{EngineError, EvalError, InitError, LoadError, PlannerError, ReloadError};
pub use evaluator::{Evaluator, QueryResult};
pub use loader::{load, ArtifactSource};
pub use registry::EngineRegistry;
