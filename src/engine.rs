//! The Value Query Engine: lifecycle, readiness gating and hot reload.
//!
//! ```text
//!   Uninitialized --initialize ok--> Ready --shutdown--> ShuttingDown
//!        |   ^                         |  \                  ^
//!        |   +--initialize failed      |   +--reload (swap)  |
//!        +-------------------- shutdown -----------------------+
//! ```
//!
//! The current model is published as one immutable [`Snapshot`] (evaluator,
//! its cache, a generation number) behind an `ArcSwapOption`. Queries load
//! the lifecycle byte and the snapshot pointer without locking, then run to
//! completion on the `Arc` they captured. A reload builds the next snapshot
//! off to the side and publishes it with a single store, so every query sees
//! either the old model or the new one, never a mix, and a stale cache can
//! never answer for a new model.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::artifact::{InputBounds, ModelId};
use crate::cache::{CacheStats, QueryCache};
use crate::config::EngineConfig;
use crate::error::{EngineError, InitError, PlannerError, ReloadError};
use crate::evaluator::{Evaluator, QueryResult};
use crate::loader::{self, ArtifactSource};
use crate::planner;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Uninitialized = 0,
    Ready = 1,
    ShuttingDown = 2,
}

impl EngineState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => EngineState::Uninitialized,
            1 => EngineState::Ready,
            _ => EngineState::ShuttingDown,
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Ready => "ready",
            EngineState::ShuttingDown => "shutting down",
        };
        f.write_str(s)
    }
}

struct Snapshot {
    evaluator: Evaluator,
    cache: Option<QueryCache>,
    generation: u64,
}

impl Snapshot {
    fn query(&self, state: &[f64]) -> Result<QueryResult, EngineError> {
        let expected = self.evaluator.input_dim();
        if state.len() != expected {
            return Err(EngineError::DimensionMismatch {
                expected,
                found: state.len(),
            });
        }
        match &self.cache {
            Some(cache) => cache.get_or_compute(state, || {
                self.evaluator.evaluate(state).map_err(EngineError::from)
            }),
            None => self.evaluator.evaluate(state).map_err(EngineError::from),
        }
    }
}

/// Summary of the published model.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelInfo {
    pub id: ModelId,
    pub kind: &'static str,
    pub description: String,
    pub input_dim: usize,
    pub bounds: InputBounds,
    pub parameter_count: usize,
    /// 1 for the initial model, incremented by every successful reload.
    pub generation: u64,
    /// `None` when caching is disabled.
    pub cache: Option<CacheStats>,
}

pub struct ValueQueryEngine {
    config: EngineConfig,
    state: AtomicU8,
    snapshot: ArcSwapOption<Snapshot>,
    generation: AtomicU64,
    /// Serializes initialize/reload so generations are published in order.
    /// Never taken on the query path or by `shutdown`.
    transition: Mutex<()>,
}

impl ValueQueryEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(EngineState::Uninitialized as u8),
            snapshot: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
            transition: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Load `source` and become `Ready`. Returns `false` on any failure; the
    /// reason is logged. See [`try_initialize`](Self::try_initialize).
    pub fn initialize(&self, source: &ArtifactSource) -> bool {
        match self.try_initialize(source) {
            Ok(_) => true,
            Err(e) => {
                warn!(source = %source.describe(), error = %e, "initialize failed");
                false
            }
        }
    }

    /// Allowed only from `Uninitialized`. A failed load leaves the engine
    /// `Uninitialized`, so the caller may retry.
    pub fn try_initialize(&self, source: &ArtifactSource) -> Result<ModelId, InitError> {
        let _transition = self.transition.lock();
        match self.state() {
            EngineState::Uninitialized => {}
            EngineState::Ready => return Err(InitError::AlreadyInitialized),
            EngineState::ShuttingDown => return Err(InitError::ShuttingDown),
        }

        let evaluator = loader::load_with(source, &self.config.load_options())?;
        let id = evaluator.id();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.snapshot.store(Some(Arc::new(self.snapshot_for(evaluator, generation))));

        if self
            .state
            .compare_exchange(
                EngineState::Uninitialized as u8,
                EngineState::Ready as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            // shutdown() won the race; it never reverts.
            self.snapshot.store(None);
            warn!(model = %id, "shutdown during initialize; model discarded");
            return Err(InitError::ShuttingDown);
        }

        info!(model = %id, generation, source = %source.describe(), "engine ready");
        Ok(id)
    }

    /// Initialize from `config.artifact_path`.
    pub fn initialize_from_config(&self) -> Result<ModelId, InitError> {
        let path = self.config.artifact_path.clone().ok_or(InitError::NoArtifact)?;
        self.try_initialize(&ArtifactSource::Path(path))
    }

    /// Value and gradient at `state`.
    pub fn query(&self, state: &[f64]) -> Result<QueryResult, EngineError> {
        self.current()?.query(state)
    }

    /// Evaluate many states in parallel. Every element is answered by the
    /// same model, even if a reload lands mid-batch.
    pub fn query_batch(&self, states: &[Vec<f64>]) -> Vec<Result<QueryResult, EngineError>> {
        match self.current() {
            Ok(snapshot) => states.par_iter().map(|s| snapshot.query(s)).collect(),
            Err(e) => vec![Err(e); states.len()],
        }
    }

    /// Replace the published model. On failure the previous model keeps
    /// serving and the error is returned.
    pub fn reload(&self, source: &ArtifactSource) -> Result<ModelId, ReloadError> {
        let _transition = self.transition.lock();
        match self.state() {
            EngineState::Ready => {}
            EngineState::Uninitialized => return Err(ReloadError::NotReady),
            EngineState::ShuttingDown => return Err(ReloadError::ShuttingDown),
        }

        let evaluator = match loader::load_with(source, &self.config.load_options()) {
            Ok(e) => e,
            Err(e) => {
                warn!(source = %source.describe(), error = %e, "reload rejected; keeping current model");
                return Err(e.into());
            }
        };
        let id = evaluator.id();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let previous = self
            .snapshot
            .swap(Some(Arc::new(self.snapshot_for(evaluator, generation))));

        if self.state() == EngineState::ShuttingDown {
            self.snapshot.store(None);
            return Err(ReloadError::ShuttingDown);
        }

        info!(
            model = %id,
            previous = %previous.map(|s| s.evaluator.id().to_short()).unwrap_or_default(),
            generation,
            "model reloaded"
        );
        Ok(id)
    }

    /// Stop accepting queries. Idempotent; queries already running finish on
    /// the model they captured.
    pub fn shutdown(&self) {
        let before = self.state.swap(EngineState::ShuttingDown as u8, Ordering::AcqRel);
        self.snapshot.store(None);
        if before != EngineState::ShuttingDown as u8 {
            info!(from = %EngineState::from_u8(before), "engine shutting down");
        }
    }

    pub fn model_info(&self) -> Option<ModelInfo> {
        let snapshot = self.current().ok()?;
        let ev = &snapshot.evaluator;
        Some(ModelInfo {
            id: ev.id(),
            kind: ev.kind(),
            description: ev.description().to_string(),
            input_dim: ev.input_dim(),
            bounds: ev.bounds().clone(),
            parameter_count: ev.parameter_count(),
            generation: snapshot.generation,
            cache: snapshot.cache.as_ref().map(QueryCache::stats),
        })
    }

    /// Planner blend weight for the value at `state`.
    pub fn priority(&self, state: &[f64]) -> Result<f64, PlannerError> {
        let snapshot = self.current()?;
        let params = planner_params(&snapshot)?;
        let result = snapshot.query(state)?;
        planner::priority(params, result.value)
    }

    /// Bang-bang tracking control at `state`.
    pub fn optimal_control(&self, state: &[f64]) -> Result<Vec<f64>, PlannerError> {
        let snapshot = self.current()?;
        let params = planner_params(&snapshot)?;
        let result = snapshot.query(state)?;
        planner::optimal_control(params, &result.gradient)
    }

    pub fn tracking_bound(&self) -> Result<Vec<f64>, PlannerError> {
        let snapshot = self.current()?;
        planner::tracking_bound(planner_params(&snapshot)?).map(<[f64]>::to_vec)
    }

    pub fn max_planner_speed(&self) -> Result<Vec<f64>, PlannerError> {
        let snapshot = self.current()?;
        planner::max_planner_speed(planner_params(&snapshot)?).map(<[f64]>::to_vec)
    }

    pub fn best_possible_time(&self, start: &[f64], stop: &[f64]) -> Result<f64, PlannerError> {
        let snapshot = self.current()?;
        planner::best_possible_time(planner_params(&snapshot)?, start, stop)
    }

    fn current(&self) -> Result<Arc<Snapshot>, EngineError> {
        match self.state() {
            EngineState::Uninitialized => Err(EngineError::NotReady),
            EngineState::ShuttingDown => Err(EngineError::ShuttingDown),
            // Only reachable between a concurrent shutdown's two stores.
            EngineState::Ready => self.snapshot.load_full().ok_or(EngineError::ShuttingDown),
        }
    }

    fn snapshot_for(&self, evaluator: Evaluator, generation: u64) -> Snapshot {
        let cache = QueryCache::new(
            self.config.cache_capacity,
            self.config.cache_quantization_step,
            self.config.cache_shards,
        );
        Snapshot {
            evaluator,
            cache,
            generation,
        }
    }
}

impl Drop for ValueQueryEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn planner_params(snapshot: &Snapshot) -> Result<&crate::artifact::PlannerParams, PlannerError> {
    snapshot
        .evaluator
        .planner()
        .ok_or(PlannerError::Unavailable("planner parameters"))
}
