//! Table-of-contents plugin
//!
//! Scans the compiled parent fragments for ATX headings and renders a
//! bulleted list. Runs after the content-producing passes so that headings
//! from embedded files appear in the table. Headings inside fenced code
//! blocks are ignored via a fence state machine.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::document::Directive;
use crate::planner::PlanNode;
use crate::plugins::{Piece, Plugin, PluginConfig, PluginContext};
use crate::status::Status;

const MAX_DEPTH_KEY: &str = "max_depth";
const ADD_SLUGS_KEY: &str = "add_slugs";
const START_FRAGMENT_KEY: &str = "start_fragment";

const DEFAULT_MAX_DEPTH: i64 = 5;

const NO_HEADINGS_NOTE: &str = "> [!NOTE]\n> no headings";

fn heading_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap())
}

pub struct TocPlugin;

impl Plugin for TocPlugin {
    fn name(&self) -> &'static str {
        "toc plugin"
    }

    fn directive_type(&self) -> &'static str {
        "toc"
    }

    fn validate_directive(&self, directive: &Directive, _config: &PluginConfig) -> Vec<Status> {
        let mut errors = Vec::new();
        for key in [MAX_DEPTH_KEY, START_FRAGMENT_KEY] {
            if let Err(status) = directive.int_option(key, 0) {
                errors.push(status);
            }
        }
        if let Err(status) = directive.bool_option(ADD_SLUGS_KEY, false) {
            errors.push(status);
        }
        errors
    }

    fn transform(&self, node: &PlanNode, parent: &[Piece], _ctx: &mut PluginContext) -> String {
        if parent.is_empty() {
            return String::new();
        }

        let max_depth = node
            .directive
            .int_option(MAX_DEPTH_KEY, DEFAULT_MAX_DEPTH)
            .unwrap_or(DEFAULT_MAX_DEPTH);
        let add_slugs = node
            .directive
            .bool_option(ADD_SLUGS_KEY, false)
            .unwrap_or(false);
        let start_fragment = node
            .directive
            .int_option(START_FRAGMENT_KEY, 0)
            .unwrap_or(0)
            .max(0) as usize;

        let mut toc_lines: Vec<String> = Vec::new();
        let mut heading_counts: HashMap<String, usize> = HashMap::new();

        for piece in parent.iter().skip(start_fragment) {
            if let Some(text) = piece.as_text() {
                collect_headings(text, max_depth, add_slugs, &mut heading_counts, &mut toc_lines);
            }
        }

        if toc_lines.is_empty() {
            NO_HEADINGS_NOTE.to_string()
        } else {
            toc_lines.join("\n") + "\n"
        }
    }
}

/// Scan one text fragment for headings outside fenced code blocks.
fn collect_headings(
    content: &str,
    max_depth: i64,
    add_slugs: bool,
    heading_counts: &mut HashMap<String, usize>,
    toc_lines: &mut Vec<String>,
) {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut in_fence = false;
    let mut fence_marker = String::new();

    for line in normalized.split('\n') {
        let (is_fence_line, now_in_fence, marker) = track_fence(line, in_fence, &fence_marker);
        in_fence = now_in_fence;
        fence_marker = marker;
        if is_fence_line || in_fence {
            continue;
        }

        let captures = match heading_pattern().captures(line) {
            Some(captures) => captures,
            None => continue,
        };
        let level = captures.get(1).map(|m| m.as_str().len()).unwrap_or(1) as i64;
        if level > max_depth {
            continue;
        }
        let text = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");

        let indent = "  ".repeat((level - 1) as usize);
        if add_slugs {
            let slug = unique_slug(text, heading_counts);
            toc_lines.push(format!("{indent}- [{text}](#{slug})"));
        } else {
            // still register the heading so later slugged TOCs stay stable
            unique_slug(text, heading_counts);
            toc_lines.push(format!("{indent}- {text}"));
        }
    }
}

/// Code-fence state machine: a line starting with three or more backticks
/// opens a fence; a matching-length line of backticks with nothing else
/// closes it.
fn track_fence(line: &str, in_fence: bool, fence_marker: &str) -> (bool, bool, String) {
    let stripped = line.trim();

    if stripped.starts_with("```") {
        if !in_fence {
            let ticks = stripped.chars().take_while(|c| *c == '`').count();
            return (true, true, "`".repeat(ticks));
        }
        if stripped.starts_with(fence_marker) && stripped.trim_matches('`').trim().is_empty() {
            return (true, false, fence_marker.to_string());
        }
    }

    (false, in_fence, fence_marker.to_string())
}

/// GitHub-style anchor slug: lowercase, strip special characters, collapse
/// whitespace and underscore runs to single hyphens, trim hyphens.
fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut cleaned = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch.is_whitespace() || ch == '-' {
            cleaned.push(ch);
        }
    }

    let mut slug = String::with_capacity(cleaned.len());
    let mut pending_hyphen = false;
    for ch in cleaned.chars() {
        if ch.is_whitespace() || ch == '_' {
            pending_hyphen = true;
        } else {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        }
    }

    slug.trim_matches('-').to_string()
}

/// Disambiguate repeated headings with `-1`, `-2`, … suffixes.
fn unique_slug(text: &str, heading_counts: &mut HashMap<String, usize>) -> String {
    let slug = slugify(text);
    match heading_counts.get_mut(&slug) {
        Some(count) => {
            *count += 1;
            format!("{slug}-{count}")
        }
        None => {
            heading_counts.insert(slug.clone(), 0);
            slug
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform_with(parent_text: &str, directive: Directive) -> String {
        let node = PlanNode {
            directive,
            status: Vec::new(),
            document: None,
            children: None,
            artifact: None,
        };
        let parent = vec![Piece::Text(parent_text.to_string())];

        let mut cache = crate::file_cache::FileCache::new(
            1024,
            1024 * 1024,
            vec![std::path::PathBuf::from("/")],
            crate::file_cache::WriteMode::Overwrite,
            0,
        )
        .unwrap();
        let (registry, _) = crate::plugins::registry::build_registry(&[]);
        let config = PluginConfig::default();
        let mut ctx = PluginContext::new(
            &mut cache,
            &registry,
            &config,
            None,
            std::path::PathBuf::new(),
            0,
        );
        TocPlugin.transform(&node, &parent, &mut ctx)
    }

    #[test]
    fn test_basic_levels_and_indent() {
        let output = transform_with("# A\n\n## B\n\n### C\n", Directive::new("toc", ""));
        assert_eq!(output, "- A\n  - B\n    - C\n");
    }

    #[test]
    fn test_max_depth_filters_headings() {
        let directive = Directive::new("toc", "").with_option("max_depth", "2");
        let output = transform_with("# A\n## B\n### C\n", directive);
        assert_eq!(output, "- A\n  - B\n");
    }

    #[test]
    fn test_headings_inside_fences_ignored() {
        let content = "# Real\n```\n# Not a heading\n```\n## Also real\n";
        let output = transform_with(content, Directive::new("toc", ""));
        assert_eq!(output, "- Real\n  - Also real\n");
    }

    #[test]
    fn test_longer_fence_needs_matching_close() {
        let content = "````\n```\n# still fenced\n````\n# free\n";
        let output = transform_with(content, Directive::new("toc", ""));
        assert_eq!(output, "- free\n");
    }

    #[test]
    fn test_add_slugs_renders_links() {
        let directive = Directive::new("toc", "").with_option("add_slugs", "True");
        let output = transform_with("# My Heading!\n", directive);
        assert_eq!(output, "- [My Heading!](#my-heading)\n");
    }

    #[test]
    fn test_duplicate_headings_disambiguated() {
        let directive = Directive::new("toc", "").with_option("add_slugs", "True");
        let output = transform_with("# Setup\n# Setup\n# Setup\n", directive);
        assert_eq!(
            output,
            "- [Setup](#setup)\n- [Setup](#setup-1)\n- [Setup](#setup-2)\n"
        );
    }

    #[test]
    fn test_no_headings_note() {
        let output = transform_with("plain text only\n", Directive::new("toc", ""));
        assert_eq!(output, "> [!NOTE]\n> no headings");
    }

    #[test]
    fn test_slugify_rules() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("C++ & Rust!"), "c-rust");
        assert_eq!(slugify("snake_case name"), "snake-case-name");
        assert_eq!(slugify("  spaced  "), "spaced");
    }

    #[test]
    fn test_validate_rejects_bad_option_types() {
        let directive = Directive::new("toc", "").with_option("max_depth", "deep");
        let errors = TocPlugin.validate_directive(&directive, &PluginConfig::default());
        assert_eq!(errors.len(), 1);

        let directive = Directive::new("toc", "").with_option("add_slugs", "yes");
        let errors = TocPlugin.validate_directive(&directive, &PluginConfig::default());
        assert_eq!(errors.len(), 1);
    }
}
