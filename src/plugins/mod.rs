//! Plugin contract and execution context
//!
//! A plugin handles one directive type and participates in three steps:
//! directive validation during planning, optional input normalisation
//! (producing an opaque artifact), and transformation during compilation.
//! Plugins are registered once at startup and dispatched by directive type.

pub mod file;
pub mod query_path;
pub mod recall;
pub mod registry;
pub mod stopwords;
pub mod synopsis;
pub mod table;
pub mod toc;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::document::Directive;
use crate::events::{EmbedmEvent, EventSink};
use crate::file_cache::FileCache;
use crate::planner::PlanNode;
use crate::status::Status;
use registry::PluginRegistry;

/// Configuration properties available to plugins during validation and
/// transformation.
#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    /// Per-directive output cap in bytes; 0 disables the cap.
    pub max_embed_size: usize,
    pub max_recursion: usize,
    /// Directory the compiled output will be written to; empty for stdout.
    pub compiled_dir: PathBuf,
    /// Directive types in pass order for the compiler.
    pub directive_sequence: Vec<String>,
    /// Per-plugin settings maps from the configuration file, keyed by
    /// plugin name.
    pub plugin_settings: BTreeMap<String, BTreeMap<String, String>>,
}

impl PluginConfig {
    /// Settings map for the named plugin (empty map when absent).
    pub fn settings_for(&self, plugin_name: &str) -> BTreeMap<String, String> {
        self.plugin_settings
            .get(plugin_name)
            .cloned()
            .unwrap_or_default()
    }
}

/// Result of a plugin's input-normalisation step.
///
/// A populated `artifact` is attached to the plan node and handed back to
/// the same plugin's transform, letting it parse a source file only once
/// per compilation. Errors turn the child into a leaf error node.
#[derive(Debug, Clone, Default)]
pub struct InputValidation {
    pub artifact: Option<serde_json::Value>,
    pub errors: Vec<Status>,
}

impl InputValidation {
    pub fn with_artifact(artifact: serde_json::Value) -> Self {
        Self {
            artifact: Some(artifact),
            errors: Vec::new(),
        }
    }

    pub fn with_errors(errors: Vec<Status>) -> Self {
        Self {
            artifact: None,
            errors,
        }
    }
}

/// A partially-resolved fragment during compilation: literal text, or a
/// directive still waiting for its pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Text(String),
    Pending {
        /// Position of the directive in the parent document's fragment
        /// list. This is the directive's identity for child lookup.
        fragment_index: usize,
        directive: Directive,
    },
}

impl Piece {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Piece::Text(text) => Some(text),
            Piece::Pending { .. } => None,
        }
    }
}

/// Execution context handed to plugin transforms.
///
/// Carries the file cache, the registry, the plugin configuration, and an
/// optional event sink, plus per-file compile progress for NodeCompiled
/// events.
pub struct PluginContext<'a> {
    pub file_cache: &'a mut FileCache,
    pub registry: &'a PluginRegistry,
    pub config: &'a PluginConfig,
    pub events: Option<&'a dyn EventSink>,
    /// The root file currently being compiled, for progress events.
    pub file_path: PathBuf,
    pub nodes_done: usize,
    pub node_total: usize,
}

impl<'a> PluginContext<'a> {
    pub fn new(
        file_cache: &'a mut FileCache,
        registry: &'a PluginRegistry,
        config: &'a PluginConfig,
        events: Option<&'a dyn EventSink>,
        file_path: PathBuf,
        node_total: usize,
    ) -> Self {
        Self {
            file_cache,
            registry,
            config,
            events,
            file_path,
            nodes_done: 0,
            node_total,
        }
    }

    /// Record one compiled node and emit a progress event.
    pub fn node_compiled(&mut self) {
        self.nodes_done += 1;
        if let Some(events) = self.events {
            events.emit(&EmbedmEvent::NodeCompiled {
                file_path: self.file_path.clone(),
                node_index: self.nodes_done,
                node_count: self.node_total,
            });
        }
    }
}

/// The plugin contract.
///
/// An implementation handles exactly one directive type. `transform`
/// returns the replacement text for the directive; error conditions are
/// rendered as caution notes, never panics.
pub trait Plugin: Send + Sync {
    /// Unique plugin identifier (e.g. `file plugin`).
    fn name(&self) -> &'static str;

    fn api_version(&self) -> u32 {
        1
    }

    /// The directive `type` value this plugin handles.
    fn directive_type(&self) -> &'static str;

    /// Validate a directive during planning. Returned statuses attach to
    /// the enclosing document's plan node.
    fn validate_directive(&self, directive: &Directive, config: &PluginConfig) -> Vec<Status>;

    /// Validate per-plugin settings from the configuration file.
    fn validate_settings(&self, _settings: &BTreeMap<String, String>) -> Vec<Status> {
        Vec::new()
    }

    /// Optionally normalise source content into an artifact during
    /// planning. The default does nothing.
    fn validate_input(
        &self,
        _directive: &Directive,
        _content: &str,
        _config: &PluginConfig,
    ) -> Option<InputValidation> {
        None
    }

    /// Produce the replacement text for a planned directive.
    fn transform(&self, node: &PlanNode, parent: &[Piece], ctx: &mut PluginContext) -> String;
}

/// Render a caution note from error descriptions:
/// `> [!CAUTION]` followed by one `> **embedm:** <description>` line each.
pub fn render_caution_note<S: AsRef<str>>(messages: &[S]) -> String {
    let mut lines = vec!["> [!CAUTION]".to_string()];
    for message in messages {
        lines.push(format!("> **embedm:** {}", message.as_ref()));
    }
    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_caution_note_single() {
        let note = render_caution_note(&["circular dependency detected: /a.md"]);
        assert_eq!(
            note,
            "> [!CAUTION]\n> **embedm:** circular dependency detected: /a.md\n"
        );
    }

    #[test]
    fn test_render_caution_note_multiple() {
        let note = render_caution_note(&["first", "second"]);
        let lines: Vec<&str> = note.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "> [!CAUTION]");
        assert_eq!(lines[2], "> **embedm:** second");
    }

    #[test]
    fn test_piece_as_text() {
        assert_eq!(Piece::Text("x".into()).as_text(), Some("x"));
        let pending = Piece::Pending {
            fragment_index: 0,
            directive: Directive::new("toc", ""),
        };
        assert_eq!(pending.as_text(), None);
    }

    #[test]
    fn test_plugin_config_settings_for_missing_plugin() {
        let config = PluginConfig::default();
        assert!(config.settings_for("file plugin").is_empty());
    }
}
