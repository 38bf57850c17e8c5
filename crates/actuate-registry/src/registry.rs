//! Plugin-type keyed executor registry

use crate::executor::{PluginExecutor, PluginMetadata};
use actuate_core::PluginKind;
use std::collections::HashMap;
use std::sync::Arc;

/// Executors keyed by plugin type, populated at startup.
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<PluginKind, Arc<dyn PluginExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under its plugin kind, replacing any previous one.
    pub fn register(&mut self, executor: Arc<dyn PluginExecutor>) {
        let kind = executor.plugin_kind();
        if self.executors.insert(kind.clone(), executor).is_some() {
            tracing::warn!(plugin = %kind, "Replaced previously registered executor");
        } else {
            tracing::debug!(plugin = %kind, "Registered executor");
        }
    }

    /// Run a registrar function exposed by a plugin crate.
    pub fn with_registrar(mut self, registrar: PluginRegistrar) -> Self {
        registrar(&mut self);
        self
    }

    pub fn get(&self, kind: &PluginKind) -> Option<Arc<dyn PluginExecutor>> {
        self.executors.get(kind).cloned()
    }

    pub fn contains(&self, kind: &PluginKind) -> bool {
        self.executors.contains_key(kind)
    }

    /// Registered plugin kinds, sorted
    pub fn registered_plugins(&self) -> Vec<PluginKind> {
        let mut kinds: Vec<PluginKind> = self.executors.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn plugin_metadata(&self) -> Vec<PluginMetadata> {
        self.registered_plugins()
            .iter()
            .filter_map(|kind| self.executors.get(kind).map(|e| e.metadata()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry").field("plugins", &self.registered_plugins()).finish()
    }
}

/// A function a plugin crate exposes to register its executors
pub type PluginRegistrar = fn(&mut ExecutorRegistry);
