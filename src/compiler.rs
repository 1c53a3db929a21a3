//! Compiler: walks a plan tree and assembles the output string
//!
//! Spans resolve against a freshly cached copy of the source; directives
//! are replaced by their plugin's transform output in configured pass
//! order. The child lookup is keyed on directive identity — the fragment
//! position in the parent document — never on source path, so two
//! directives sharing a source each find their own child.

use std::collections::HashMap;
use std::path::Path;
use tracing::trace;

use crate::document::{Directive, Fragment};
use crate::planner::PlanNode;
use crate::plugins::{render_caution_note, Piece, PluginContext};
use crate::status::Status;

/// Compile a planned root node into the output string.
///
/// The root's statuses are expected to be gated by the orchestrator
/// (FATAL skips the file; ERROR requires accept-all or an interactive
/// continue). A root with no document renders as a caution note.
pub fn compile_plan(root: &PlanNode, ctx: &mut PluginContext) -> String {
    if root.document.is_none() {
        return render_caution_note(&blocking_descriptions(&root.status));
    }

    let plugin = match ctx.registry.find_by_directive_type(&root.directive.type_name) {
        Some(plugin) => plugin,
        None => {
            return render_caution_note(&[format!(
                "no plugin registered for root directive type '{}'",
                root.directive.type_name
            )]);
        }
    };

    plugin.transform(root, &[], ctx)
}

/// Compile a node's document: resolve spans, then run one pass per
/// configured directive type (or a single pass over everything when the
/// sequence is empty), replacing directives with their transform output.
///
/// This is the assembly core shared by the file plugin (which wraps it
/// with extraction and fencing) and the root compile.
pub fn compile_document(node: &PlanNode, ctx: &mut PluginContext) -> String {
    let document = match &node.document {
        Some(document) => document,
        None => return String::new(),
    };

    // step 1: load source for span resolution (planner already validated
    // and cached it)
    let (source, errors) = ctx.file_cache.get_file(Path::new(&node.directive.source));
    let source = match source {
        Some(source) => source,
        None => return render_caution_note(&blocking_descriptions(&errors)),
    };

    // step 2: resolve spans into text, keep directives pending
    let mut pieces: Vec<Piece> = document
        .fragments
        .iter()
        .enumerate()
        .map(|(index, fragment)| match fragment {
            Fragment::Span(span) => Piece::Text(span.resolve(&source).to_string()),
            Fragment::Directive(directive) => Piece::Pending {
                fragment_index: index,
                directive: directive.clone(),
            },
        })
        .collect();

    // step 3: identity-keyed child lookup — k-th source-bearing directive
    // pairs with the k-th child
    let child_lookup = build_child_lookup(node);

    // step 4: passes in plugin_sequence order; an empty sequence is a
    // single pass over every directive in source order
    let sequence = ctx.config.directive_sequence.clone();
    if sequence.is_empty() {
        pieces = run_pass(pieces, None, &child_lookup, ctx);
    } else {
        for directive_type in &sequence {
            pieces = run_pass(pieces, Some(directive_type.as_str()), &child_lookup, ctx);
        }
        // directives whose type has no pass (unknown plugins) still render
        // a caution instead of silently vanishing
        pieces = run_pass(pieces, None, &child_lookup, ctx);
    }

    pieces
        .iter()
        .filter_map(Piece::as_text)
        .collect::<String>()
}

/// Map fragment index → child plan node for source-bearing directives.
fn build_child_lookup(node: &PlanNode) -> HashMap<usize, &PlanNode> {
    let mut lookup = HashMap::new();
    let document = match &node.document {
        Some(document) => document,
        None => return lookup,
    };
    let mut children = node.children.iter().flatten();

    for (index, fragment) in document.fragments.iter().enumerate() {
        if let Fragment::Directive(directive) = fragment {
            if directive.has_source() {
                if let Some(child) = children.next() {
                    lookup.insert(index, child);
                }
            }
        }
    }
    lookup
}

/// One traversal of the piece list, transforming directives of a single
/// type (or all remaining directives when `type_filter` is `None`).
fn run_pass(
    pieces: Vec<Piece>,
    type_filter: Option<&str>,
    child_lookup: &HashMap<usize, &PlanNode>,
    ctx: &mut PluginContext,
) -> Vec<Piece> {
    // transforms observe the piece list as it stood at the start of the pass
    let snapshot = pieces.clone();
    let mut result = Vec::with_capacity(pieces.len());

    for piece in pieces {
        match piece {
            Piece::Pending {
                fragment_index,
                directive,
            } if type_filter.map_or(true, |t| directive.type_name == t) => {
                let text =
                    transform_directive(&directive, fragment_index, child_lookup, &snapshot, ctx);
                result.push(Piece::Text(text));
            }
            other => result.push(other),
        }
    }

    result
}

/// Find the plugin for a directive and execute its transform, enforcing
/// the per-embed output cap.
fn transform_directive(
    directive: &Directive,
    fragment_index: usize,
    child_lookup: &HashMap<usize, &PlanNode>,
    snapshot: &[Piece],
    ctx: &mut PluginContext,
) -> String {
    let plugin = match ctx.registry.find_by_directive_type(&directive.type_name) {
        Some(plugin) => plugin,
        None => {
            return render_caution_note(&[format!(
                "no plugin registered for directive type '{}'",
                directive.type_name
            )]);
        }
    };

    let fallback: PlanNode;
    let node: &PlanNode = match child_lookup.get(&fragment_index) {
        Some(child) => *child,
        None if directive.has_source() => {
            fallback = PlanNode::error_node(
                directive.clone(),
                vec![Status::error(format!(
                    "source '{}' could not be processed",
                    directive.source
                ))],
            );
            &fallback
        }
        None => {
            // source-less directive (toc, synopsis over the parent): a
            // plain leaf with no plan of its own
            fallback = PlanNode {
                directive: directive.clone(),
                status: Vec::new(),
                document: None,
                children: None,
                artifact: None,
            };
            &fallback
        }
    };

    if node.document.is_none() && node.has_blocking_status() {
        return render_caution_note(&blocking_descriptions(&node.status));
    }

    trace!(
        directive_type = %directive.type_name,
        fragment_index,
        "transforming directive"
    );
    let result = plugin.transform(node, snapshot, ctx);
    ctx.node_compiled();

    let cap = ctx.config.max_embed_size;
    if cap > 0 && result.len() > cap {
        return render_caution_note(&[format!(
            "embed output exceeds the max embed size ({cap} bytes)"
        )]);
    }
    result
}

fn blocking_descriptions(statuses: &[Status]) -> Vec<String> {
    let blocking: Vec<String> = statuses
        .iter()
        .filter(|s| s.is_blocking())
        .map(|s| s.description.clone())
        .collect();
    if blocking.is_empty() {
        statuses.iter().map(|s| s.description.clone()).collect()
    } else {
        blocking
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_cache::{FileCache, WriteMode};
    use crate::planner::{count_nodes, Planner};
    use crate::plugins::registry::build_registry;
    use crate::plugins::PluginConfig;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn compile_file(temp: &TempDir, root_name: &str, sequence: &[String]) -> String {
        let root = crate::paths::normalize(&temp.path().join(root_name));
        let mut cache = FileCache::new(
            1024 * 1024,
            8 * 1024 * 1024,
            vec![temp.path().to_path_buf()],
            WriteMode::Overwrite,
            0,
        )
        .unwrap();
        let (registry, _) = build_registry(sequence);
        let mut config = PluginConfig {
            max_recursion: 8,
            ..PluginConfig::default()
        };
        config.directive_sequence = registry.directive_sequence();

        let plan = {
            let mut planner =
                Planner::new(&mut cache, &registry, &config, 1024 * 1024, "file", false);
            planner.plan_file(&root)
        };
        let node_total = count_nodes(&plan);
        let mut ctx = PluginContext::new(
            &mut cache,
            &registry,
            &config,
            None,
            PathBuf::from(root_name),
            node_total,
        );
        compile_plan(&plan, &mut ctx)
    }

    fn write(temp: &TempDir, name: &str, content: &str) {
        fs::write(temp.path().join(name), content).unwrap();
    }

    #[test]
    fn test_empty_file_compiles_to_empty_output() {
        let temp = TempDir::new().unwrap();
        write(&temp, "empty.md", "");
        assert_eq!(compile_file(&temp, "empty.md", &[]), "");
    }

    #[test]
    fn test_plain_passthrough() {
        let temp = TempDir::new().unwrap();
        write(&temp, "plain.md", "# Hello\n\nWorld.\n");
        assert_eq!(compile_file(&temp, "plain.md", &[]), "# Hello\n\nWorld.\n");
    }

    #[test]
    fn test_non_embedm_fences_are_preserved() {
        let temp = TempDir::new().unwrap();
        let content = "a\n```yaml\nkey: value\n```\nb\n";
        write(&temp, "fences.md", content);
        assert_eq!(compile_file(&temp, "fences.md", &[]), content);
    }

    #[test]
    fn test_file_embed_inlines_markdown_child() {
        let temp = TempDir::new().unwrap();
        write(
            &temp,
            "root.md",
            "Before\n```yaml embedm\ntype: file\nsource: ./child.md\n```\nAfter\n",
        );
        write(&temp, "child.md", "Child\n");
        assert_eq!(compile_file(&temp, "root.md", &[]), "Before\nChild\nAfter\n");
    }

    #[test]
    fn test_nested_embed_two_levels() {
        let temp = TempDir::new().unwrap();
        write(
            &temp,
            "root.md",
            "R\n```yaml embedm\ntype: file\nsource: ./mid.md\n```\n",
        );
        write(
            &temp,
            "mid.md",
            "M\n```yaml embedm\ntype: file\nsource: ./leaf.md\n```\n",
        );
        write(&temp, "leaf.md", "L\n");
        assert_eq!(compile_file(&temp, "root.md", &[]), "R\nM\nL\n");
    }

    #[test]
    fn test_cycle_renders_caution_where_embed_was() {
        let temp = TempDir::new().unwrap();
        write(
            &temp,
            "a.md",
            "```yaml embedm\ntype: file\nsource: ./b.md\n```\n",
        );
        write(
            &temp,
            "b.md",
            "```yaml embedm\ntype: file\nsource: ./a.md\n```\n",
        );
        let output = compile_file(&temp, "a.md", &[]);
        assert!(output.contains("> [!CAUTION]"));
        assert!(output.contains("> **embedm:** circular dependency detected: "));
        assert!(output.contains("a.md"));
    }

    #[test]
    fn test_two_directives_same_source_each_resolve() {
        let temp = TempDir::new().unwrap();
        write(
            &temp,
            "root.md",
            "```yaml embedm\ntype: file\nsource: ./c.md\n```\nmid\n```yaml embedm\ntype: file\nsource: ./c.md\n```\n",
        );
        write(&temp, "c.md", "shared\n");
        assert_eq!(compile_file(&temp, "root.md", &[]), "shared\nmid\nshared\n");
    }

    #[test]
    fn test_missing_source_renders_caution_and_parent_compiles() {
        let temp = TempDir::new().unwrap();
        write(
            &temp,
            "root.md",
            "keep\n```yaml embedm\ntype: file\nsource: ./gone.md\n```\nrest\n",
        );
        let output = compile_file(&temp, "root.md", &[]);
        assert!(output.starts_with("keep\n"));
        assert!(output.contains("> [!CAUTION]"));
        assert!(output.ends_with("rest\n"));
    }

    #[test]
    fn test_output_contains_no_unresolved_directive_fence() {
        let temp = TempDir::new().unwrap();
        write(
            &temp,
            "root.md",
            "x\n```yaml embedm\ntype: toc\n```\ny\n```yaml embedm\ntype: file\nsource: ./c.md\n```\n",
        );
        write(&temp, "c.md", "z\n");
        let output = compile_file(&temp, "root.md", &[]);
        assert!(!output.contains("```yaml embedm"));
    }

    #[test]
    fn test_max_embed_size_replaces_with_caution() {
        let temp = TempDir::new().unwrap();
        write(
            &temp,
            "root.md",
            "```yaml embedm\ntype: file\nsource: ./big.md\n```\n",
        );
        write(&temp, "big.md", &"x".repeat(256));

        let root = crate::paths::normalize(&temp.path().join("root.md"));
        let mut cache = FileCache::new(
            1024 * 1024,
            8 * 1024 * 1024,
            vec![temp.path().to_path_buf()],
            WriteMode::Overwrite,
            64,
        )
        .unwrap();
        let (registry, _) = build_registry(&[]);
        let mut config = PluginConfig {
            max_recursion: 8,
            max_embed_size: 64,
            ..PluginConfig::default()
        };
        config.directive_sequence = registry.directive_sequence();

        let plan = {
            let mut planner =
                Planner::new(&mut cache, &registry, &config, 1024 * 1024, "file", false);
            planner.plan_file(&root)
        };
        let mut ctx = PluginContext::new(
            &mut cache,
            &registry,
            &config,
            None,
            PathBuf::from("root.md"),
            count_nodes(&plan),
        );
        let output = compile_plan(&plan, &mut ctx);
        assert!(output.contains("max embed size (64 bytes)"));
        assert!(!output.contains("xxxxxxxx"));
    }

    #[test]
    fn test_unknown_type_renders_caution_even_with_sequence() {
        let temp = TempDir::new().unwrap();
        write(&temp, "root.md", "a\n```yaml embedm\ntype: mystery\n```\nb\n");
        let sequence: Vec<String> = vec!["file".into(), "toc".into()];
        let output = compile_file(&temp, "root.md", &sequence);
        assert!(output.contains("no plugin registered for directive type 'mystery'"));
        assert!(output.starts_with("a\n"));
        assert!(output.ends_with("b\n"));
    }
}
