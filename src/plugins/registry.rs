//! Plugin registry and startup registration
//!
//! The registry maps plugin names and directive types to shared plugin
//! instances. It is populated once at startup from the built-in plugin set,
//! filtered and ordered through the configured `plugin_sequence`, and is
//! read-only thereafter.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::plugins::{file, query_path, recall, synopsis, table, toc, Plugin};
use crate::status::Status;

/// Registry of loaded plugins.
///
/// Registration order defines dispatch order: the compiler derives its
/// pass sequence from [`PluginRegistry::directive_sequence`].
#[derive(Default)]
pub struct PluginRegistry {
    by_name: BTreeMap<String, Arc<dyn Plugin>>,
    by_type: BTreeMap<String, Arc<dyn Plugin>>,
    /// Directive types in registration order.
    order: Vec<String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin for its declared directive type.
    ///
    /// A second plugin for the same directive type is rejected.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), Status> {
        let directive_type = plugin.directive_type().to_string();
        if self.by_type.contains_key(&directive_type) {
            return Err(Status::error(format!(
                "plugin '{}' conflicts with an existing plugin for directive type '{}'",
                plugin.name(),
                directive_type
            )));
        }
        debug!(name = plugin.name(), directive_type, "registered plugin");
        self.by_name.insert(plugin.name().to_string(), Arc::clone(&plugin));
        self.order.push(directive_type.clone());
        self.by_type.insert(directive_type, plugin);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.by_name.get(name).cloned()
    }

    /// Find the plugin that handles the given directive type.
    pub fn find_by_directive_type(&self, directive_type: &str) -> Option<Arc<dyn Plugin>> {
        self.by_type.get(directive_type).cloned()
    }

    pub fn count(&self) -> usize {
        self.by_name.len()
    }

    /// Directive types in dispatch order.
    pub fn directive_sequence(&self) -> Vec<String> {
        self.order.clone()
    }

    /// All loaded plugins in dispatch order.
    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.order
            .iter()
            .filter_map(|t| self.by_type.get(t).cloned())
            .collect()
    }
}

/// The built-in plugin set, in default load order.
fn builtin_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(file::FilePlugin),
        Arc::new(table::TablePlugin),
        Arc::new(query_path::QueryPathPlugin),
        Arc::new(synopsis::SynopsisPlugin),
        Arc::new(recall::RecallPlugin),
        Arc::new(toc::TocPlugin),
    ]
}

/// Build the registry from the built-in plugin set, filtered through
/// `plugin_sequence`.
///
/// Sequence entries name plugins (by plugin name or directive type) to
/// register in order. Entries matching nothing produce WARNINGs.
/// Discovered plugins not named in the sequence are appended at the end of
/// the dispatch order.
pub fn build_registry(plugin_sequence: &[String]) -> (PluginRegistry, Vec<Status>) {
    let mut registry = PluginRegistry::new();
    let mut issues = Vec::new();
    let discovered = builtin_plugins();
    let mut registered: Vec<&str> = Vec::new();

    for entry in plugin_sequence {
        let matched = discovered
            .iter()
            .find(|p| p.name() == entry || p.directive_type() == entry);
        match matched {
            Some(plugin) if registered.contains(&plugin.directive_type()) => {}
            Some(plugin) => {
                registered.push(plugin.directive_type());
                if let Err(status) = registry.register(Arc::clone(plugin)) {
                    issues.push(status);
                }
            }
            None => {
                issues.push(Status::warning(format!(
                    "plugin_sequence entry '{entry}' has no matching plugin — entry ignored"
                )));
            }
        }
    }

    for plugin in &discovered {
        if !registered.contains(&plugin.directive_type()) {
            registered.push(plugin.directive_type());
            if let Err(status) = registry.register(Arc::clone(plugin)) {
                issues.push(status);
            }
        }
    }

    // settings validation happens separately, once the config is known
    (registry, issues)
}

/// Validate per-plugin settings maps against each loaded plugin.
pub fn validate_plugin_settings(
    registry: &PluginRegistry,
    plugin_settings: &BTreeMap<String, BTreeMap<String, String>>,
) -> Vec<Status> {
    let mut issues = Vec::new();
    for plugin in registry.plugins() {
        if let Some(settings) = plugin_settings.get(plugin.name()) {
            issues.extend(plugin.validate_settings(settings));
        }
    }
    for name in plugin_settings.keys() {
        if registry.get(name).is_none() {
            issues.push(Status::warning(format!(
                "settings for unknown plugin '{name}' ignored"
            )));
        }
    }
    issues
}
