//! Query-path plugin: embeds a value from a JSON, YAML, or TOML document
//!
//! The source is parsed once during input validation; a dot-notation
//! `path` (numeric segments index arrays) selects a subtree. Scalars
//! render inline (optionally through a `format` template), composites and
//! whole documents render as fenced code blocks tagged with the source
//! language.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::document::Directive;
use crate::planner::PlanNode;
use crate::plugins::{InputValidation, Piece, Plugin, PluginConfig, PluginContext};
use crate::status::Status;

const PATH_KEY: &str = "path";
const FORMAT_KEY: &str = "format";

const SUPPORTED_EXTENSIONS: [&str; 4] = ["json", "yaml", "yml", "toml"];

/// Artifact carried from input validation to the transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueryPathArtifact {
    value: serde_json::Value,
    lang_tag: String,
    is_full_document: bool,
    format: Option<String>,
}

pub struct QueryPathPlugin;

impl Plugin for QueryPathPlugin {
    fn name(&self) -> &'static str {
        "query path plugin"
    }

    fn directive_type(&self) -> &'static str {
        "query-path"
    }

    fn validate_directive(&self, directive: &Directive, _config: &PluginConfig) -> Vec<Status> {
        if !directive.has_source() {
            return vec![Status::error("'query-path' directive requires a source")];
        }

        let ext = extension_of(&directive.source);
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return vec![Status::error(format!(
                "unsupported query-path format '{ext}' (expected json, yaml, or toml)"
            ))];
        }

        let format = directive.option(FORMAT_KEY).unwrap_or("");
        if !format.is_empty() {
            if directive.option(PATH_KEY).map_or(true, str::is_empty) {
                return vec![Status::error("'format' requires a 'path' option")];
            }
            if !format.contains("{value}") {
                return vec![Status::error("'format' must contain the '{value}' placeholder")];
            }
        }

        Vec::new()
    }

    fn validate_input(
        &self,
        directive: &Directive,
        content: &str,
        _config: &PluginConfig,
    ) -> Option<InputValidation> {
        let ext = extension_of(&directive.source);
        let lang_tag = match ext.as_str() {
            "yml" => "yaml".to_string(),
            other => other.to_string(),
        };

        let tree = match parse_document(content, &ext) {
            Ok(tree) => tree,
            Err(message) => {
                return Some(InputValidation::with_errors(vec![Status::error(message)]));
            }
        };

        let path = directive.option(PATH_KEY).unwrap_or("");
        let format = directive.option(FORMAT_KEY).map(str::to_string).filter(|f| !f.is_empty());

        if path.is_empty() {
            let artifact = QueryPathArtifact {
                value: serde_json::Value::Null,
                lang_tag,
                is_full_document: true,
                format: None,
            };
            return Some(artifact_validation(artifact));
        }

        let value = match resolve_path(&tree, path) {
            Some(value) => value.clone(),
            None => {
                return Some(InputValidation::with_errors(vec![Status::error(format!(
                    "path '{path}' not found in '{}'",
                    directive.source
                ))]));
            }
        };

        if format.is_some() && (value.is_object() || value.is_array()) {
            return Some(InputValidation::with_errors(vec![Status::error(
                "'format' applies to scalar values only",
            )]));
        }

        let artifact = QueryPathArtifact {
            value,
            lang_tag,
            is_full_document: false,
            format,
        };
        Some(artifact_validation(artifact))
    }

    fn transform(&self, node: &PlanNode, _parent: &[Piece], ctx: &mut PluginContext) -> String {
        if node.document.is_none() {
            return String::new();
        }

        let artifact: QueryPathArtifact = match &node.artifact {
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(artifact) => artifact,
                Err(_) => return String::new(),
            },
            None => return String::new(),
        };

        if artifact.is_full_document {
            let (content, _) = ctx
                .file_cache
                .get_file(Path::new(&node.directive.source));
            let raw = content.map(|c| c.to_string()).unwrap_or_default();
            return format!("```{}\n{}\n```", artifact.lang_tag, raw.trim_end());
        }

        match &artifact.value {
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                let rendered = render_composite(&artifact.value, &artifact.lang_tag);
                format!("```{}\n{}\n```", artifact.lang_tag, rendered.trim_end())
            }
            scalar => {
                let text = scalar_to_text(scalar);
                match &artifact.format {
                    Some(template) => template.replace("{value}", &text),
                    None => text,
                }
            }
        }
    }
}

fn extension_of(source: &str) -> String {
    Path::new(source)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn artifact_validation(artifact: QueryPathArtifact) -> InputValidation {
    match serde_json::to_value(&artifact) {
        Ok(value) => InputValidation::with_artifact(value),
        Err(exc) => InputValidation::with_errors(vec![Status::error(format!(
            "failed to serialise query result: {exc}"
        ))]),
    }
}

/// Parse the source document into a JSON value tree.
fn parse_document(content: &str, ext: &str) -> Result<serde_json::Value, String> {
    match ext {
        "json" => serde_json::from_str(content).map_err(|exc| format!("invalid JSON source: {exc}")),
        "yaml" | "yml" => {
            let value: serde_yaml::Value = serde_yaml::from_str(content)
                .map_err(|exc| format!("invalid YAML source: {exc}"))?;
            serde_json::to_value(value).map_err(|exc| format!("invalid YAML source: {exc}"))
        }
        "toml" => {
            let value: toml::Value =
                toml::from_str(content).map_err(|exc| format!("invalid TOML source: {exc}"))?;
            serde_json::to_value(value).map_err(|exc| format!("invalid TOML source: {exc}"))
        }
        other => Err(format!("unsupported query-path format '{other}'")),
    }
}

/// Resolve a dot-notation path against the tree. Numeric segments index
/// arrays; everything else looks up object keys.
fn resolve_path<'a>(tree: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = tree;
    for segment in path.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment)?,
            serde_json::Value::Array(array) => {
                let index: usize = segment.parse().ok()?;
                array.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

fn scalar_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Serialise a composite value back into the source language where
/// possible, falling back to pretty JSON.
fn render_composite(value: &serde_json::Value, lang_tag: &str) -> String {
    match lang_tag {
        "yaml" => serde_yaml::to_string(value).unwrap_or_else(|_| value.to_string()),
        "toml" => toml::to_string(value)
            .unwrap_or_else(|_| serde_json::to_string_pretty(value).unwrap_or_default()),
        _ => serde_json::to_string_pretty(value).unwrap_or_default(),
    }
}
