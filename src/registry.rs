//! Several independently loaded value functions addressed by numeric id.
//!
//! A planner that blends models (e.g. a near-field and a far-field tracking
//! function) picks one per request by id. Each entry is a full
//! [`ValueQueryEngine`] with its own cache and lifecycle.

use std::collections::BTreeMap;

use tracing::info;

use crate::config::RegistryConfig;
use crate::engine::ValueQueryEngine;
use crate::error::RegistryError;
use crate::evaluator::QueryResult;

#[derive(Default)]
pub struct EngineRegistry {
    engines: BTreeMap<u32, ValueQueryEngine>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and initialize one engine per configured model. Fails on the
    /// first duplicate id or model that does not load.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for entry in &config.models {
            let engine = ValueQueryEngine::new(entry.engine.clone());
            engine
                .initialize_from_config()
                .map_err(|source| RegistryError::Init { id: entry.id, source })?;
            registry.insert(entry.id, engine)?;
        }
        info!(models = registry.len(), "registry ready");
        Ok(registry)
    }

    /// Add an engine. It does not need to be initialized yet.
    pub fn insert(&mut self, id: u32, engine: ValueQueryEngine) -> Result<(), RegistryError> {
        if self.engines.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        self.engines.insert(id, engine);
        Ok(())
    }

    pub fn get(&self, id: u32) -> Result<&ValueQueryEngine, RegistryError> {
        self.engines.get(&id).ok_or(RegistryError::UnknownModel(id))
    }

    pub fn query(&self, id: u32, state: &[f64]) -> Result<QueryResult, RegistryError> {
        Ok(self.get(id)?.query(state)?)
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.engines.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn shutdown(&self) {
        for engine in self.engines.values() {
            engine.shutdown();
        }
    }
}
