//! Tier-ordered plugin registry.
//!
//! Registration happens once, before a sweep starts. The runner and pipeline
//! only ever hold an `Arc<PluginRegistry>`, which exposes no mutation, so
//! registering while a sweep is running is rejected at compile time.
//!
//! Plugins on the same tier are ordered fallbacks: the first one that
//! succeeds provides that tier's result.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::result::Tier;
use crate::plugins::EvaluatorPlugin;

/// Mapping from tier to the plugins registered for it, in insertion order.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    tiers: BTreeMap<Tier, Vec<Arc<dyn EvaluatorPlugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin to its declared tier.
    pub fn register<P>(&mut self, plugin: P) -> &mut Self
    where
        P: EvaluatorPlugin + 'static,
    {
        self.register_arc(Arc::new(plugin))
    }

    /// Append an already shared plugin to its declared tier.
    pub fn register_arc(&mut self, plugin: Arc<dyn EvaluatorPlugin>) -> &mut Self {
        debug!(plugin = plugin.name(), tier = %plugin.tier(), "registering evaluator plugin");
        self.tiers.entry(plugin.tier()).or_default().push(plugin);
        self
    }

    /// Plugins for `tier`, in registration order. Empty when none.
    pub fn get_tier(&self, tier: Tier) -> &[Arc<dyn EvaluatorPlugin>] {
        self.tiers.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tiers with at least one plugin, in execution order.
    pub fn registered_tiers(&self) -> Vec<Tier> {
        Tier::ALL
            .into_iter()
            .filter(|t| !self.get_tier(*t).is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.values().all(Vec::is_empty)
    }

    /// Total number of registered plugins.
    pub fn len(&self) -> usize {
        self.tiers.values().map(Vec::len).sum()
    }

    /// `tier:name` labels for every plugin, in execution order.
    pub fn describe(&self) -> Vec<String> {
        Tier::ALL
            .into_iter()
            .flat_map(|t| {
                self.get_tier(t)
                    .iter()
                    .map(move |p| format!("{}:{}", t.number(), p.name()))
            })
            .collect()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.describe())
            .finish()
    }
}
