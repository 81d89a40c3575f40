// Registry of scrobbling services known to this process
// Populated once by the composition root, read on every dispatch

use super::traits::Scrobbler;
use crate::library::Library;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Builds a fresh scrobbler bound to the library handle of the current call
pub type ScrobblerFactory = Arc<dyn Fn(Arc<dyn Library>) -> Box<dyn Scrobbler> + Send + Sync>;

/// Name -> factory map, iterated in name order
#[derive(Default)]
pub struct ScrobblerRegistry {
    factories: RwLock<BTreeMap<String, ScrobblerFactory>>,
}

impl ScrobblerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous one
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(Arc<dyn Library>) -> Box<dyn Scrobbler> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        if factories.insert(name.clone(), Arc::new(factory)).is_some() {
            log::warn!("Scrobbler '{}' registered twice, keeping the latest", name);
        } else {
            log::debug!("Registered scrobbler '{}'", name);
        }
    }

    /// Snapshot of every registration, sorted by name
    pub fn all(&self) -> Vec<(String, ScrobblerFactory)> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, factory)| (name.clone(), Arc::clone(factory)))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
