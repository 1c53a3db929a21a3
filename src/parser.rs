//! Directive parser for `yaml embedm` fenced blocks
//!
//! Scans a Markdown string and emits an ordered fragment list: literal text
//! spans (byte offsets into the original source) interleaved with parsed
//! directives. Only the exact opening fence ```` ```yaml embedm ```` starts
//! a directive block — plain ```` ```yaml ```` fences are ordinary code and
//! stay inside literal spans.

use regex::Regex;
use serde_yaml::Value;
use std::path::Path;
use std::sync::OnceLock;

use crate::document::{Directive, Fragment, Span};
use crate::paths;
use crate::status::Status;

const DIRECTIVE_TYPE_KEY: &str = "type";
const DIRECTIVE_SOURCE_KEY: &str = "source";

fn opening_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^```yaml embedm[ \t\r]*$").expect("valid fence regex"))
}

fn closing_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^```[ \t\r]*$").expect("valid fence regex"))
}

/// A raw embedm block located in markdown content.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawBlock {
    /// YAML text between the fences.
    raw_content: String,
    /// Byte offset of the opening fence.
    start: usize,
    /// Byte offset one past the closing fence line (including its newline).
    end: usize,
}

/// Parse all embedm blocks in markdown content into fragments and errors.
///
/// Output is strictly ordered to mirror the input: text before the first
/// fence, then the directive, then text between fences, and so on. Spans
/// always index into the original source string.
///
/// Relative `source` values are resolved against `base_dir`; absolute
/// values pass through. Both forms are lexically normalised.
///
/// # Errors
///
/// Parse failures never abort: each produces an ERROR status and parsing
/// continues past the block. An unclosed fence ends the fragment list
/// before the fence.
pub fn parse_directives(content: &str, base_dir: &Path) -> (Vec<Fragment>, Vec<Status>) {
    if content.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let (blocks, mut errors, content_end) = find_raw_blocks(content);
    let mut fragments: Vec<Fragment> = Vec::new();
    let mut position = 0usize;

    for block in blocks {
        if block.start > position {
            fragments.push(Fragment::Span(Span::new(position, block.start - position)));
        }

        let (directive, block_errors) = parse_block(&block.raw_content, base_dir);
        if let Some(directive) = directive {
            fragments.push(Fragment::Directive(directive));
        }
        errors.extend(block_errors);

        position = block.end;
    }

    if content_end > position {
        fragments.push(Fragment::Span(Span::new(position, content_end - position)));
    }

    (fragments, errors)
}

/// Find all raw embedm blocks. Returns the blocks, any fence errors, and
/// the effective content end (truncated at an unclosed fence).
fn find_raw_blocks(content: &str) -> (Vec<RawBlock>, Vec<Status>, usize) {
    let mut blocks = Vec::new();
    let mut errors = Vec::new();
    let mut position = 0usize;

    while position < content.len() {
        let opening = match opening_fence().find_at(content, position) {
            Some(m) => m,
            None => break,
        };

        // skip the newline terminating the opening fence line
        let content_start = (opening.end() + 1).min(content.len());
        let closing = closing_fence().find_at(content, content_start);

        let closing = match closing {
            Some(m) => m,
            None => {
                errors.push(Status::error("unclosed embedm block"));
                return (blocks, errors, opening.start());
            }
        };

        let raw_content = content[content_start..closing.start()].to_string();
        let block_end = if closing.end() < content.len() {
            closing.end() + 1
        } else {
            closing.end()
        };
        blocks.push(RawBlock {
            raw_content,
            start: opening.start(),
            end: block_end,
        });
        position = block_end;
    }

    (blocks, errors, content.len())
}

/// Parse the YAML text of one block into a directive.
fn parse_block(raw: &str, base_dir: &Path) -> (Option<Directive>, Vec<Status>) {
    if raw.trim().is_empty() {
        return (None, vec![Status::error("empty embedm block")]);
    }

    let parsed: Value = match serde_yaml::from_str(raw) {
        Ok(value) => value,
        Err(exc) => {
            return (
                None,
                vec![Status::error(format!("invalid YAML in embedm block: {exc}"))],
            );
        }
    };

    let mapping = match parsed {
        Value::Mapping(mapping) => mapping,
        _ => {
            return (
                None,
                vec![Status::error("embedm block must contain YAML key-value pairs")],
            );
        }
    };

    let mut type_name: Option<String> = None;
    let mut source = String::new();
    let mut directive = Directive::new("", "");

    for (key, value) in &mapping {
        let key = scalar_to_string(key);
        match key.as_str() {
            DIRECTIVE_TYPE_KEY => type_name = Some(scalar_to_string(value)),
            DIRECTIVE_SOURCE_KEY => source = scalar_to_string(value),
            _ => {
                directive.options.insert(key, scalar_to_string(value));
            }
        }
    }

    let type_name = match type_name {
        Some(t) => t,
        None => {
            return (
                None,
                vec![Status::error(
                    "embedm block is missing required 'type' field",
                )],
            );
        }
    };

    directive.type_name = type_name;
    if !source.is_empty() {
        directive.source = paths::normalize_against(Path::new(&source), base_dir)
            .display()
            .to_string();
    }

    (Some(directive), Vec::new())
}

/// Coerce a YAML scalar to its textual form.
///
/// Booleans become `True`/`False`, numbers their decimal text, null the
/// empty string. Composite values serialise back to YAML.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
    }
}
