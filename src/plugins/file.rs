//! File plugin: embeds a file region as fenced code or inlined Markdown
//!
//! Markdown sources are compiled recursively and merged inline; any other
//! source is wrapped in a fenced code block tagged with its extension.
//! Exactly one of `region`, `lines`, or `symbol` may narrow the embedded
//! content, and `title`, `link`, and `line_numbers_range` render into an
//! optional header line above the block.

use std::collections::BTreeMap;
use std::path::Path;

use crate::compiler;
use crate::document::Directive;
use crate::extract::comments::filter_comments;
use crate::extract::symbols::{extract_symbol, language_config_for};
use crate::extract::{
    extract_lines, extract_region, is_valid_line_range, DEFAULT_REGION_END, DEFAULT_REGION_START,
};
use crate::paths;
use crate::planner::PlanNode;
use crate::plugins::{render_caution_note, Piece, Plugin, PluginConfig, PluginContext};
use crate::status::Status;

const EXTRACTION_OPTIONS: [&str; 3] = ["region", "lines", "symbol"];
const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "markdown"];

const REGION_START_KEY: &str = "region_start";
const REGION_END_KEY: &str = "region_end";

pub struct FilePlugin;

impl Plugin for FilePlugin {
    fn name(&self) -> &'static str {
        "file plugin"
    }

    fn directive_type(&self) -> &'static str {
        "file"
    }

    fn validate_directive(&self, directive: &Directive, _config: &PluginConfig) -> Vec<Status> {
        if !directive.has_source() {
            return vec![Status::error("'file' directive requires a source")];
        }

        let mut errors = Vec::new();

        let active: Vec<&str> = EXTRACTION_OPTIONS
            .iter()
            .filter(|key| directive.option(key).is_some_and(|v| !v.is_empty()))
            .copied()
            .collect();
        if active.len() > 1 {
            errors.push(Status::error(
                "only one of 'region', 'lines', or 'symbol' may be set",
            ));
        }

        if let Some(range) = directive.option("lines") {
            if !is_valid_line_range(range) {
                errors.push(Status::error(format!(
                    "invalid line range '{range}' — use N, M..N, N.., or ..N"
                )));
            }
        }

        if directive.option("symbol").is_some_and(|s| !s.is_empty())
            && language_config_for(Path::new(&directive.source)).is_none()
        {
            let ext = Path::new(&directive.source)
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            errors.push(Status::error(format!(
                "symbol extraction is not supported for '{ext}' files"
            )));
        }

        for key in ["link", "line_numbers_range", "strip_comments"] {
            if let Err(status) = directive.bool_option(key, false) {
                errors.push(status);
            }
        }

        errors
    }

    fn validate_settings(&self, settings: &BTreeMap<String, String>) -> Vec<Status> {
        let mut errors = Vec::new();
        for key in [REGION_START_KEY, REGION_END_KEY] {
            if let Some(template) = settings.get(key) {
                if !template.contains("{tag}") {
                    errors.push(Status::error(format!(
                        "file plugin setting '{key}' must contain '{{tag}}'"
                    )));
                }
            }
        }
        errors
    }

    fn transform(&self, node: &PlanNode, _parent: &[Piece], ctx: &mut PluginContext) -> String {
        if node.document.is_none() {
            return String::new();
        }

        let compiled = compiler::compile_document(node, ctx);

        let source_path = node.directive.source.clone();
        let settings = ctx.config.settings_for(self.name());
        let region_start = settings
            .get(REGION_START_KEY)
            .map(String::as_str)
            .unwrap_or(DEFAULT_REGION_START)
            .to_string();
        let region_end = settings
            .get(REGION_END_KEY)
            .map(String::as_str)
            .unwrap_or(DEFAULT_REGION_END)
            .to_string();

        let content =
            match apply_extraction(&compiled, &node.directive, &region_start, &region_end) {
                Ok(content) => content,
                Err(status) => return render_caution_note(&[status.description]),
            };

        let content = if node.directive.bool_option("strip_comments", false).unwrap_or(false) {
            match language_config_for(Path::new(&source_path)) {
                Some(config) => filter_comments(&content, &config.comment_style),
                None => content,
            }
        } else {
            content
        };

        let header = build_header(&node.directive, &source_path, ctx);

        let extension = Path::new(&source_path)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let is_markdown = MARKDOWN_EXTENSIONS.contains(&extension.as_str());

        if is_markdown {
            format!("{header}{content}")
        } else {
            let tag = if extension.is_empty() {
                "text".to_string()
            } else {
                extension
            };
            format!("{header}```{tag}\n{}\n```", content.trim_end())
        }
    }
}

/// Apply the configured extraction selector, if any.
fn apply_extraction(
    compiled: &str,
    directive: &Directive,
    region_start: &str,
    region_end: &str,
) -> Result<String, Status> {
    if let Some(region) = directive.option("region").filter(|v| !v.is_empty()) {
        let style = language_config_for(Path::new(&directive.source)).map(|c| &c.comment_style);
        return extract_region(compiled, region, region_start, region_end, style).ok_or_else(
            || {
                Status::error(format!(
                    "region '{region}' not found in '{}'",
                    directive.source
                ))
            },
        );
    }

    if let Some(range) = directive.option("lines").filter(|v| !v.is_empty()) {
        return extract_lines(compiled, range)
            .ok_or_else(|| Status::error(format!("invalid line range '{range}'")));
    }

    if let Some(symbol) = directive.option("symbol").filter(|v| !v.is_empty()) {
        let config = language_config_for(Path::new(&directive.source)).ok_or_else(|| {
            Status::error(format!(
                "symbol extraction is not supported for '{}'",
                directive.source
            ))
        })?;
        return extract_symbol(compiled, symbol, config).ok_or_else(|| {
            Status::error(format!(
                "symbol '{symbol}' not found in '{}'",
                directive.source
            ))
        });
    }

    Ok(compiled.to_string())
}

/// Build the optional `> `-prefixed header line.
///
/// Elements are emitted in order: title, line range, link. Returns an
/// empty string when no element is active.
fn build_header(directive: &Directive, source_path: &str, ctx: &PluginContext) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(title) = directive.option("title").filter(|t| !t.is_empty()) {
        parts.push(format!("**\"{title}\"**"));
    }

    let show_range = directive.bool_option("line_numbers_range", false).unwrap_or(false);
    if show_range {
        if let Some(range) = directive.option("lines").filter(|r| !r.is_empty()) {
            parts.push(format!("(lines {range})"));
        }
    }

    if directive.bool_option("link", false).unwrap_or(false) {
        let source = Path::new(source_path);
        let filename = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_path.to_string());
        let target = if ctx.config.compiled_dir.as_os_str().is_empty() {
            filename.clone()
        } else {
            paths::relative_link(source, &ctx.config.compiled_dir)
        };
        parts.push(format!("[link {filename}]({target})"));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("> {}\n", parts.join(" "))
    }
}
