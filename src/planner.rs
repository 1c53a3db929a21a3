//! Planner: builds a validated plan tree from parsed documents
//!
//! Planning never raises. Every failure path produces a plan node carrying
//! error statuses, and planning descends into all siblings even when one
//! fails, so a single invocation reports every problem found in a document
//! tree. Cycles are prevented by an ancestor set of absolute source paths.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::document::{Directive, Document};
use crate::file_cache::FileCache;
use crate::parser::parse_directives;
use crate::paths;
use crate::plugins::registry::PluginRegistry;
use crate::plugins::PluginConfig;
use crate::status::{Status, StatusLevel};

/// A node in the plan tree: a directive, accumulated statuses, the parsed
/// document (present iff planning succeeded for this node), one child per
/// source-bearing directive in document order, and an optional opaque
/// artifact from the owning plugin's input validation.
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub directive: Directive,
    pub status: Vec<Status>,
    pub document: Option<Document>,
    pub children: Option<Vec<PlanNode>>,
    pub artifact: Option<serde_json::Value>,
}

impl PlanNode {
    /// Leaf node representing a failed plan step.
    pub fn error_node(directive: Directive, errors: Vec<Status>) -> Self {
        Self {
            directive,
            status: errors,
            document: None,
            children: None,
            artifact: None,
        }
    }

    pub fn has_blocking_status(&self) -> bool {
        crate::status::has_blocking(&self.status)
    }
}

/// Builds plan trees for files, stdin content, and nested sources.
pub struct Planner<'a> {
    file_cache: &'a mut FileCache,
    registry: &'a PluginRegistry,
    plugin_config: &'a PluginConfig,
    max_file_size: u64,
    root_directive_type: String,
    verbose: bool,
}

impl<'a> Planner<'a> {
    pub fn new(
        file_cache: &'a mut FileCache,
        registry: &'a PluginRegistry,
        plugin_config: &'a PluginConfig,
        max_file_size: u64,
        root_directive_type: impl Into<String>,
        verbose: bool,
    ) -> Self {
        Self {
            file_cache,
            registry,
            plugin_config,
            max_file_size,
            root_directive_type: root_directive_type.into(),
            verbose,
        }
    }

    /// Create a plan for a file, using the configured root directive type.
    pub fn plan_file(&mut self, file_name: &Path) -> PlanNode {
        let resolved = paths::normalize(file_name);
        let root_directive =
            Directive::new(self.root_directive_type.clone(), resolved.display().to_string());

        let (content, errors) = self.file_cache.get_file(&resolved);
        let content = match content {
            Some(content) => content,
            None => {
                let errors = if errors.is_empty() {
                    vec![Status::error(format!(
                        "failed to load file '{}'",
                        resolved.display()
                    ))]
                } else {
                    errors
                };
                return PlanNode::error_node(root_directive, errors);
            }
        };

        debug!(file = %resolved.display(), "planning file");
        let mut ancestors = HashSet::new();
        ancestors.insert(resolved);
        self.create_plan(root_directive, &content, 0, &ancestors)
    }

    /// Create a plan for raw content (stdin), using the current working
    /// directory as the base for relative sources.
    ///
    /// The synthetic source path carries a `.md` extension so the root
    /// transform treats stdin as Markdown.
    pub fn plan_content(&mut self, content: &str) -> PlanNode {
        let source = paths::normalize(Path::new("<stdin>.md"));
        self.file_cache.prime(source.clone(), content);
        let root_directive =
            Directive::new(self.root_directive_type.clone(), source.display().to_string());
        let mut ancestors = HashSet::new();
        ancestors.insert(source);
        self.create_plan(root_directive, content, 0, &ancestors)
    }

    /// Build a validated plan tree from content, collecting all errors
    /// without short-circuiting.
    pub fn create_plan(
        &mut self,
        directive: Directive,
        content: &str,
        depth: usize,
        ancestors: &HashSet<PathBuf>,
    ) -> PlanNode {
        let base_dir = Path::new(&directive.source)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        // step 1: parse content into fragments, resolving relative sources
        // against the directive's own directory
        let (fragments, parse_errors) = parse_directives(content, &base_dir);
        let mut all_errors = parse_errors;

        // step 2: build the document even with parse errors — fragments may
        // be partial but spans are still compilable
        let document = Document::new(directive.source.clone(), fragments);

        // step 3: validate every directive against the plugin registry
        for child_directive in document.directives() {
            match self
                .registry
                .find_by_directive_type(&child_directive.type_name)
            {
                None => {
                    let message = if self.verbose {
                        let available = self.registry.directive_sequence().join(", ");
                        format!(
                            "no plugin registered for directive type '{}'. Available: {available}",
                            child_directive.type_name
                        )
                    } else {
                        format!(
                            "no plugin registered for directive type '{}'",
                            child_directive.type_name
                        )
                    };
                    all_errors.push(Status::error(message));
                }
                Some(plugin) => {
                    trace!(
                        plugin = plugin.name(),
                        directive_type = %child_directive.type_name,
                        "validate_directive"
                    );
                    all_errors
                        .extend(plugin.validate_directive(child_directive, self.plugin_config));
                }
            }
        }

        // step 4: one child per source-bearing directive, in document order;
        // failed source checks become leaf error children
        let mut children = Vec::new();
        let source_directives: Vec<Directive> = document
            .directives()
            .filter(|d| d.has_source())
            .cloned()
            .collect();
        for child_directive in source_directives {
            if depth + 1 == self.plugin_config.max_recursion {
                all_errors.push(Status::warning(format!(
                    "'{}' is approaching the max recursion depth ({})",
                    child_directive.source, self.plugin_config.max_recursion
                )));
            }
            if let Some(warning) = self.size_warning(&child_directive) {
                all_errors.push(warning);
            }

            match self.validate_source(&child_directive, depth, ancestors) {
                Some(error) => {
                    children.push(PlanNode::error_node(child_directive, vec![error]));
                }
                None => children.push(self.build_child(child_directive, depth, ancestors)),
            }
        }

        if all_errors.is_empty() {
            all_errors.push(Status::ok("plan created successfully"));
        }

        PlanNode {
            directive,
            status: all_errors,
            document: Some(document),
            children: Some(children),
            artifact: None,
        }
    }

    /// Check a single source directive for cycles, depth, and file access.
    /// Checks apply in order and short-circuit on the first error.
    fn validate_source(
        &self,
        directive: &Directive,
        depth: usize,
        ancestors: &HashSet<PathBuf>,
    ) -> Option<Status> {
        let source = PathBuf::from(&directive.source);
        if ancestors.contains(&source) {
            return Some(Status::error(format!(
                "circular dependency detected: {}",
                directive.source
            )));
        }
        if depth >= self.plugin_config.max_recursion {
            return Some(Status::error(format!(
                "max recursion depth ({}) reached",
                self.plugin_config.max_recursion
            )));
        }
        let cache_errors = self.file_cache.validate(&source);
        cache_errors.into_iter().next()
    }

    /// Warn when a source file is within ten percent of the size cap.
    fn size_warning(&self, directive: &Directive) -> Option<Status> {
        let metadata = std::fs::metadata(&directive.source).ok()?;
        let size = metadata.len();
        if size <= self.max_file_size && size * 10 >= self.max_file_size * 9 {
            return Some(Status::warning(format!(
                "source file size approaching limit ({size} of {} bytes): '{}'",
                self.max_file_size, directive.source
            )));
        }
        None
    }

    /// Build a single child plan node, running the plugin's input
    /// validation when one is registered.
    fn build_child(
        &mut self,
        directive: Directive,
        depth: usize,
        ancestors: &HashSet<PathBuf>,
    ) -> PlanNode {
        let source = PathBuf::from(&directive.source);
        let (content, load_errors) = self.file_cache.get_file(&source);
        let content = match content {
            Some(content) => content,
            None => {
                let errors = if load_errors.is_empty() {
                    vec![Status::error(format!(
                        "failed to load '{}'",
                        directive.source
                    ))]
                } else {
                    load_errors
                };
                return PlanNode::error_node(directive, errors);
            }
        };

        let mut artifact = None;
        if let Some(plugin) = self.registry.find_by_directive_type(&directive.type_name) {
            if let Some(validation) =
                plugin.validate_input(&directive, &content, self.plugin_config)
            {
                if !validation.errors.is_empty() {
                    return PlanNode::error_node(directive, validation.errors);
                }
                artifact = validation.artifact;
            }
        }

        let mut child_ancestors = ancestors.clone();
        child_ancestors.insert(source);
        let mut child = self.create_plan(directive, &content, depth + 1, &child_ancestors);
        child.artifact = artifact;
        child
    }
}

// ---------------------------------------------------------------------------
// Plan tree helpers
// ---------------------------------------------------------------------------

/// Visit every node in the plan tree in pre-order (depth-first).
pub fn walk_nodes<'a>(node: &'a PlanNode, visit: &mut dyn FnMut(&'a PlanNode)) {
    visit(node);
    for child in node.children.iter().flatten() {
        walk_nodes(child, visit);
    }
}

/// All ERROR/FATAL statuses from every node in the plan tree.
pub fn collect_tree_errors(root: &PlanNode) -> Vec<Status> {
    let mut errors = Vec::new();
    walk_nodes(root, &mut |node| {
        errors.extend(node.status.iter().filter(|s| s.is_blocking()).cloned());
    });
    errors
}

/// All WARNING statuses from every node in the plan tree.
pub fn collect_tree_warnings(root: &PlanNode) -> Vec<Status> {
    let mut warnings = Vec::new();
    walk_nodes(root, &mut |node| {
        warnings.extend(
            node.status
                .iter()
                .filter(|s| s.level == StatusLevel::Warning)
                .cloned(),
        );
    });
    warnings
}

/// True when any node in the tree carries a status at the given level.
pub fn tree_has_level(root: &PlanNode, level: StatusLevel) -> bool {
    let mut found = false;
    walk_nodes(root, &mut |node| {
        if node.status.iter().any(|s| s.level == level) {
            found = true;
        }
    });
    found
}

/// Count all nodes in the plan tree (root plus descendants).
pub fn count_nodes(root: &PlanNode) -> usize {
    let mut count = 0;
    walk_nodes(root, &mut |_| count += 1);
    count
}

/// Resolved source paths of directives that merge content inline.
///
/// Only sources from directives of `embed_type` are collected. Other
/// directive types (recall, synopsis, query-path, table) read their source
/// but do not merge it into the compiled output, so they must not be
/// excluded from standalone compilation.
pub fn collect_embedded_sources(root: &PlanNode, embed_type: &str) -> HashSet<PathBuf> {
    let mut sources = HashSet::new();
    walk_nodes(root, &mut |node| {
        for child in node.children.iter().flatten() {
            if child.directive.has_source() && child.directive.type_name == embed_type {
                sources.insert(paths::normalize(Path::new(&child.directive.source)));
            }
        }
    });
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_cache::WriteMode;
    use crate::plugins::registry::build_registry;
    use std::fs;
    use tempfile::TempDir;

    fn plugin_config() -> PluginConfig {
        PluginConfig {
            max_embed_size: 0,
            max_recursion: 8,
            ..PluginConfig::default()
        }
    }

    fn cache_for(temp: &TempDir) -> FileCache {
        FileCache::new(
            1024 * 1024,
            8 * 1024 * 1024,
            vec![temp.path().to_path_buf()],
            WriteMode::Overwrite,
            0,
        )
        .unwrap()
    }

    fn write(temp: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = temp.path().join(name);
        fs::write(&path, content).unwrap();
        crate::paths::normalize(&path)
    }

    #[test]
    fn test_plan_file_without_directives() {
        let temp = TempDir::new().unwrap();
        let root = write(&temp, "plain.md", "# Hello\n\nWorld.\n");
        let mut cache = cache_for(&temp);
        let (registry, _) = build_registry(&[]);
        let config = plugin_config();
        let mut planner = Planner::new(&mut cache, &registry, &config, 1024 * 1024, "file", false);

        let plan = planner.plan_file(&root);
        assert!(plan.document.is_some());
        assert_eq!(plan.children.as_ref().unwrap().len(), 0);
        assert!(!plan.has_blocking_status());
        assert_eq!(plan.status[0].level, StatusLevel::Ok);
    }

    #[test]
    fn test_plan_file_with_child_embed() {
        let temp = TempDir::new().unwrap();
        let root = write(
            &temp,
            "root.md",
            "Before\n```yaml embedm\ntype: file\nsource: ./child.md\n```\nAfter\n",
        );
        write(&temp, "child.md", "Child\n");
        let mut cache = cache_for(&temp);
        let (registry, _) = build_registry(&[]);
        let config = plugin_config();
        let mut planner = Planner::new(&mut cache, &registry, &config, 1024 * 1024, "file", false);

        let plan = planner.plan_file(&root);
        assert!(!plan.has_blocking_status());
        let children = plan.children.as_ref().unwrap();
        assert_eq!(children.len(), 1);
        assert!(children[0].document.is_some());
        assert!(children[0].directive.source.ends_with("child.md"));
    }

    #[test]
    fn test_missing_source_becomes_error_child() {
        let temp = TempDir::new().unwrap();
        let root = write(
            &temp,
            "root.md",
            "```yaml embedm\ntype: file\nsource: ./gone.md\n```\n",
        );
        let mut cache = cache_for(&temp);
        let (registry, _) = build_registry(&[]);
        let config = plugin_config();
        let mut planner = Planner::new(&mut cache, &registry, &config, 1024 * 1024, "file", false);

        let plan = planner.plan_file(&root);
        // the parent still plans; the failure is localised to the child
        assert!(plan.document.is_some());
        let children = plan.children.as_ref().unwrap();
        assert_eq!(children.len(), 1);
        assert!(children[0].document.is_none());
        assert!(children[0].children.is_none());
        assert!(children[0].status[0].description.contains("does not exist"));
    }

    #[test]
    fn test_self_embed_is_circular_dependency() {
        let temp = TempDir::new().unwrap();
        let root = write(
            &temp,
            "self.md",
            "```yaml embedm\ntype: file\nsource: ./self.md\n```\n",
        );
        let mut cache = cache_for(&temp);
        let (registry, _) = build_registry(&[]);
        let config = plugin_config();
        let mut planner = Planner::new(&mut cache, &registry, &config, 1024 * 1024, "file", false);

        let plan = planner.plan_file(&root);
        let children = plan.children.as_ref().unwrap();
        assert_eq!(children.len(), 1);
        assert!(children[0].status[0]
            .description
            .contains("circular dependency detected"));
    }

    #[test]
    fn test_two_file_cycle_detected_at_inner_level() {
        let temp = TempDir::new().unwrap();
        let a = write(
            &temp,
            "a.md",
            "```yaml embedm\ntype: file\nsource: ./b.md\n```\n",
        );
        write(
            &temp,
            "b.md",
            "```yaml embedm\ntype: file\nsource: ./a.md\n```\n",
        );
        let mut cache = cache_for(&temp);
        let (registry, _) = build_registry(&[]);
        let config = plugin_config();
        let mut planner = Planner::new(&mut cache, &registry, &config, 1024 * 1024, "file", false);

        let plan = planner.plan_file(&a);
        // outer level planned fine
        assert!(plan.document.is_some());
        let b_node = &plan.children.as_ref().unwrap()[0];
        assert!(b_node.document.is_some());
        let a_again = &b_node.children.as_ref().unwrap()[0];
        assert!(a_again.document.is_none());
        assert!(a_again.status[0]
            .description
            .contains("circular dependency detected"));
    }

    #[test]
    fn test_max_recursion_fails_at_depth_and_sibling_continues() {
        let temp = TempDir::new().unwrap();
        let root = write(
            &temp,
            "r.md",
            "```yaml embedm\ntype: file\nsource: ./mid.md\n```\n```yaml embedm\ntype: file\nsource: ./leaf.md\n```\n",
        );
        write(
            &temp,
            "mid.md",
            "```yaml embedm\ntype: file\nsource: ./leaf.md\n```\n",
        );
        write(&temp, "leaf.md", "leaf\n");
        let mut cache = cache_for(&temp);
        let (registry, _) = build_registry(&[]);
        let config = PluginConfig {
            max_recursion: 1,
            ..plugin_config()
        };
        let mut planner = Planner::new(&mut cache, &registry, &config, 1024 * 1024, "file", false);

        let plan = planner.plan_file(&root);
        let children = plan.children.as_ref().unwrap();
        assert_eq!(children.len(), 2);
        // mid.md plans at depth 0→1, but its own child hits the limit
        let mid = &children[0];
        let blocked = &mid.children.as_ref().unwrap()[0];
        assert!(blocked.status[0].description.contains("max recursion depth"));
        // the sibling leaf at depth 1 is unaffected
        assert!(children[1].document.is_some());
    }

    #[test]
    fn test_unknown_directive_type_is_error_on_parent() {
        let temp = TempDir::new().unwrap();
        let root = write(&temp, "r.md", "```yaml embedm\ntype: mystery\n```\n");
        let mut cache = cache_for(&temp);
        let (registry, _) = build_registry(&[]);
        let config = plugin_config();
        let mut planner = Planner::new(&mut cache, &registry, &config, 1024 * 1024, "file", false);

        let plan = planner.plan_file(&root);
        assert!(plan.has_blocking_status());
        assert!(plan.status.iter().any(|s| s
            .description
            .contains("no plugin registered for directive type 'mystery'")));
    }

    #[test]
    fn test_verbose_unknown_type_lists_available() {
        let temp = TempDir::new().unwrap();
        let root = write(&temp, "r.md", "```yaml embedm\ntype: mystery\n```\n");
        let mut cache = cache_for(&temp);
        let (registry, _) = build_registry(&[]);
        let config = plugin_config();
        let mut planner = Planner::new(&mut cache, &registry, &config, 1024 * 1024, "file", true);

        let plan = planner.plan_file(&root);
        assert!(plan
            .status
            .iter()
            .any(|s| s.description.contains("Available:")));
    }

    #[test]
    fn test_plan_content_from_stdin() {
        let temp = TempDir::new().unwrap();
        let mut cache = FileCache::new(
            1024 * 1024,
            8 * 1024 * 1024,
            vec![temp.path().to_path_buf(), std::env::current_dir().unwrap()],
            WriteMode::Overwrite,
            0,
        )
        .unwrap();
        let (registry, _) = build_registry(&[]);
        let config = plugin_config();
        let mut planner = Planner::new(&mut cache, &registry, &config, 1024 * 1024, "file", false);

        let plan = planner.plan_content("# Title\n");
        assert!(plan.document.is_some());
        assert!(!plan.has_blocking_status());
    }

    #[test]
    fn test_tree_helpers() {
        let temp = TempDir::new().unwrap();
        let root = write(
            &temp,
            "r.md",
            "```yaml embedm\ntype: file\nsource: ./c.md\n```\n",
        );
        write(&temp, "c.md", "inner\n");
        let mut cache = cache_for(&temp);
        let (registry, _) = build_registry(&[]);
        let config = plugin_config();
        let mut planner = Planner::new(&mut cache, &registry, &config, 1024 * 1024, "file", false);

        let plan = planner.plan_file(&root);
        assert_eq!(count_nodes(&plan), 2);
        assert!(collect_tree_errors(&plan).is_empty());
        assert!(tree_has_level(&plan, StatusLevel::Ok));

        let sources = collect_embedded_sources(&plan, "file");
        assert_eq!(sources.len(), 1);
        assert!(sources.iter().next().unwrap().ends_with("c.md"));
    }

    #[test]
    fn test_ancestor_sources_never_contain_own_source() {
        let temp = TempDir::new().unwrap();
        let root = write(
            &temp,
            "r.md",
            "```yaml embedm\ntype: file\nsource: ./c.md\n```\n",
        );
        write(&temp, "c.md", "inner\n");
        let mut cache = cache_for(&temp);
        let (registry, _) = build_registry(&[]);
        let config = plugin_config();
        let mut planner = Planner::new(&mut cache, &registry, &config, 1024 * 1024, "file", false);

        let plan = planner.plan_file(&root);
        // document == None ⟺ children == None across the tree
        walk_nodes(&plan, &mut |node| {
            assert_eq!(node.document.is_none(), node.children.is_none());
        });
    }
}
