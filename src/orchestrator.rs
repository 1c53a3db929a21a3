//! Session orchestration: input expansion, planning, gating, compilation,
//! and output
//!
//! Expands the positional input into a Markdown file list, deduplicates
//! files already embedded by sibling inputs, plans everything up front,
//! then compiles file by file with interactive error gating. Output goes
//! to stdout, a single file, or a mirrored directory tree; `--verify`
//! compares instead of writing and `--dry-run` writes nothing.

use std::collections::HashSet;
use std::io::{BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cli::Cli;
use crate::compiler;
use crate::config::{discover_config, Config};
use crate::error::EmbedmError;
use crate::events::{EmbedmEvent, EventSink};
use crate::file_cache::{apply_line_endings, CacheEventKind, FileCache, WriteMode};
use crate::paths;
use crate::planner::{
    collect_embedded_sources, collect_tree_errors, collect_tree_warnings, count_nodes, PlanNode,
    Planner,
};
use crate::plugins::registry::{build_registry, validate_plugin_settings, PluginRegistry};
use crate::plugins::{PluginConfig, PluginContext};
use crate::sandbox::Sandbox;
use crate::status::{has_fatal, Status, StatusLevel};

/// How the positional input was interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
enum InputKind {
    Stdin,
    File(PathBuf),
    Directory(PathBuf),
    Glob(String),
}

/// User's answer at an error prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueChoice {
    Yes,
    No,
    Always,
    Exit,
}

/// Aggregated result of a session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub ok_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
    pub files_written: usize,
    pub up_to_date_count: usize,
    pub stale_count: usize,
    pub missing_count: usize,
}

impl SessionStats {
    /// Process exit code for this session.
    pub fn exit_code(&self) -> i32 {
        if self.error_count > 0 || self.stale_count > 0 || self.missing_count > 0 {
            1
        } else {
            0
        }
    }
}

/// Run a full compile session for the given CLI arguments.
pub fn run_session(cli: &Cli, events: Arc<dyn EventSink>) -> crate::error::Result<SessionStats> {
    let started = Instant::now();
    let mut stats = SessionStats::default();

    // configuration: explicit flag, else discovery beside the input
    let explicit_config = cli.config.clone();
    let discovered_config = match (&explicit_config, &cli.input) {
        (None, Some(input)) => discover_config(Path::new(input)),
        _ => None,
    };
    let config_path = explicit_config.or(discovered_config);
    let (config, config_statuses) = match &config_path {
        Some(path) => Config::load(path),
        None => (Config::default(), Vec::new()),
    };
    for status in &config_statuses {
        if status.level == StatusLevel::Error {
            return Err(EmbedmError::Config(status.description.clone()).into());
        }
    }
    stats.warning_count += config_statuses.len();

    let input_kind = resolve_input(cli)?;

    events.emit(&EmbedmEvent::SessionStarted {
        version: env!("CARGO_PKG_VERSION").to_string(),
        config_source: config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults".to_string()),
        input_kind: describe_input(&input_kind),
        output_kind: describe_output(cli),
    });
    for status in &config_statuses {
        eprintln!("warning: {}", status.description);
    }

    // sandbox and file cache
    let sandbox_anchor = match &input_kind {
        InputKind::Stdin => std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        InputKind::File(path) | InputKind::Directory(path) => path.clone(),
        InputKind::Glob(pattern) => glob_anchor(pattern),
    };
    let sandbox = Sandbox::build(
        &sandbox_anchor,
        config_path.as_deref().and_then(Path::parent),
        &cli.allow_path,
        cli.no_sandbox,
    );
    debug!(sandbox = %sandbox.describe(), "sandbox resolved");

    let mut allow_list = sandbox.allow_list();
    if let Some(output_file) = &cli.output_file {
        if let Some(parent) = paths::normalize(output_file).parent() {
            allow_list.push(parent.to_path_buf());
        }
    }
    if let Some(output_dir) = &cli.output_dir {
        allow_list.push(paths::normalize(output_dir));
    }
    if matches!(input_kind, InputKind::Stdin) {
        // the synthetic stdin path lives under the cwd
        allow_list.push(std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")));
    }

    let mut cache = FileCache::new(
        config.max_file_size,
        config.max_memory,
        allow_list,
        WriteMode::Overwrite,
        config.max_embed_size,
    )
    .map_err(anyhow::Error::from)?;
    {
        let sink = Arc::clone(&events);
        cache.set_event_callback(Box::new(move |path, kind| {
            let kind = match kind {
                CacheEventKind::Hit => "hit",
                CacheEventKind::Miss => "miss",
                CacheEventKind::Eviction => "eviction",
            };
            sink.emit(&EmbedmEvent::Cache {
                kind: kind.to_string(),
                key: path.to_path_buf(),
            });
        }));
    }

    // plugin registry
    let (registry, mut plugin_issues) = build_registry(&config.plugin_sequence);
    plugin_issues.extend(validate_plugin_settings(&registry, &config.plugins));
    if plugin_issues.iter().any(Status::is_blocking) {
        let details: Vec<String> = plugin_issues
            .iter()
            .filter(|s| s.is_blocking())
            .map(|s| s.description.clone())
            .collect();
        return Err(EmbedmError::Plugin(details.join("; ")).into());
    }
    stats.warning_count += plugin_issues.len();
    events.emit(&EmbedmEvent::PluginsLoaded {
        discovered: registry.count(),
        loaded: registry.count(),
        warnings: plugin_issues.iter().map(|s| s.description.clone()).collect(),
    });

    let plugin_config = PluginConfig {
        max_embed_size: config.max_embed_size,
        max_recursion: config.max_recursion,
        compiled_dir: PathBuf::new(),
        directive_sequence: registry.directive_sequence(),
        plugin_settings: config.plugins.clone(),
    };

    // stdin is its own short path: plan, gate, compile, print
    if matches!(input_kind, InputKind::Stdin) {
        return run_stdin(
            cli,
            &config,
            &mut cache,
            &registry,
            &plugin_config,
            events.as_ref(),
            stats,
            started,
        );
    }

    // expand the input into a markdown file list
    let files = expand_input(&input_kind, &cache)?;
    if files.is_empty() {
        return Err(EmbedmError::Usage(format!(
            "no markdown files found: {}",
            cli.input.as_deref().unwrap_or("")
        ))
        .into());
    }

    // plan everything up front
    events.emit(&EmbedmEvent::PlanningStarted {
        file_count: files.len(),
    });
    let mut plans: Vec<(PathBuf, PlanNode)> = Vec::with_capacity(files.len());
    let mut plan_errors = 0usize;
    {
        let mut planner = Planner::new(
            &mut cache,
            &registry,
            &plugin_config,
            config.max_file_size,
            config.root_directive_type.clone(),
            cli.verbosity >= 3,
        );
        for (index, file) in files.iter().enumerate() {
            let plan = planner.plan_file(file);
            let errors = collect_tree_errors(&plan);
            if errors.is_empty() {
                events.emit(&EmbedmEvent::FilePlanned {
                    file_path: file.clone(),
                    index,
                    total: files.len(),
                });
            } else {
                plan_errors += 1;
                events.emit(&EmbedmEvent::FilePlanError {
                    file_path: file.clone(),
                    index,
                    total: files.len(),
                    message: errors[0].description.clone(),
                });
            }
            plans.push((file.clone(), plan));
        }
    }
    events.emit(&EmbedmEvent::PlanningComplete {
        file_count: files.len(),
        error_count: plan_errors,
    });

    // deduplicate inputs already embedded by a sibling input
    let multi_file = plans.len() > 1;
    let plans: Vec<(PathBuf, PlanNode)> = if multi_file {
        let mut embedded: HashSet<PathBuf> = HashSet::new();
        for (_, plan) in &plans {
            embedded.extend(collect_embedded_sources(plan, &config.root_directive_type));
        }
        plans
            .into_iter()
            .filter(|(file, _)| {
                let keep = !embedded.contains(file);
                if !keep {
                    debug!(file = %file.display(), "skipping input already embedded by a sibling");
                }
                keep
            })
            .collect()
    } else {
        plans
    };

    // compile with gating
    events.emit(&EmbedmEvent::CompilationStarted {
        file_count: plans.len(),
    });
    let mut accept_all = cli.accept_all;
    let input_base = match &input_kind {
        InputKind::Directory(dir) => Some(dir.clone()),
        _ => None,
    };
    let total = plans.len();

    for (index, (file, plan)) in plans.iter().enumerate() {
        let file_started = Instant::now();
        stats.warning_count += collect_tree_warnings(plan).len();

        let tree_errors = collect_tree_errors(plan);
        if has_fatal(&tree_errors) {
            present_errors(&tree_errors);
            stats.error_count += 1;
            events.emit(&EmbedmEvent::FileError {
                file_path: file.clone(),
                message: tree_errors[0].description.clone(),
                index,
                total,
            });
            continue;
        }
        if !tree_errors.is_empty() && !accept_all {
            present_errors(&tree_errors);
            match prompt_continue() {
                ContinueChoice::Yes => {}
                ContinueChoice::Always => accept_all = true,
                ContinueChoice::No => {
                    stats.error_count += 1;
                    events.emit(&EmbedmEvent::FileError {
                        file_path: file.clone(),
                        message: "skipped at error prompt".to_string(),
                        index,
                        total,
                    });
                    continue;
                }
                ContinueChoice::Exit => return Err(EmbedmError::Aborted.into()),
            }
        }

        let output_path = output_path_for(cli, file, input_base.as_deref());
        let mut file_config = plugin_config.clone();
        file_config.compiled_dir = output_path
            .as_ref()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default();

        events.emit(&EmbedmEvent::FileStarted {
            file_path: file.clone(),
            node_count: count_nodes(plan),
            index,
            total,
        });

        let output = {
            let mut ctx = PluginContext::new(
                &mut cache,
                &registry,
                &file_config,
                Some(events.as_ref()),
                file.clone(),
                count_nodes(plan),
            );
            compiler::compile_plan(plan, &mut ctx)
        };
        let output = apply_line_endings(&output, config.line_endings);

        if cli.verify {
            let output_path = output_path.expect("--verify requires an output target");
            let verdict = verify_output(&output, &output_path);
            match verdict {
                "up-to-date" => stats.up_to_date_count += 1,
                "stale" => stats.stale_count += 1,
                _ => stats.missing_count += 1,
            }
            events.emit(&EmbedmEvent::FileVerified {
                file_path: output_path,
                status: verdict.to_string(),
            });
            stats.ok_count += 1;
            continue;
        }

        match &output_path {
            None => {
                // single-file input without an output target: stdout
                let mut stdout = std::io::stdout();
                stdout.write_all(output.as_bytes())?;
                stdout.flush()?;
                stats.ok_count += 1;
                if !tree_errors.is_empty() {
                    stats.error_count += 1;
                }
                events.emit(&EmbedmEvent::FileCompleted {
                    file_path: file.clone(),
                    output_path: PathBuf::from("-"),
                    elapsed: file_started.elapsed(),
                    index,
                    total,
                });
            }
            Some(output_path) if cli.dry_run => {
                stats.ok_count += 1;
                events.emit(&EmbedmEvent::FileCompleted {
                    file_path: file.clone(),
                    output_path: output_path.clone(),
                    elapsed: file_started.elapsed(),
                    index,
                    total,
                });
            }
            Some(output_path) => {
                if let Some(parent) = output_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let (written, write_errors) = cache.write(&output, output_path);
                match written {
                    Some(written) => {
                        stats.ok_count += 1;
                        stats.files_written += 1;
                        if !tree_errors.is_empty() {
                            stats.error_count += 1;
                        }
                        events.emit(&EmbedmEvent::FileCompleted {
                            file_path: file.clone(),
                            output_path: written,
                            elapsed: file_started.elapsed(),
                            index,
                            total,
                        });
                    }
                    None => {
                        present_errors(&write_errors);
                        stats.error_count += 1;
                        events.emit(&EmbedmEvent::FileError {
                            file_path: file.clone(),
                            message: write_errors
                                .first()
                                .map(|s| s.description.clone())
                                .unwrap_or_else(|| "write failed".to_string()),
                            index,
                            total,
                        });
                    }
                }
            }
        }
    }

    events.emit(&EmbedmEvent::CompilationComplete {
        ok_count: stats.ok_count,
        error_count: stats.error_count,
    });
    events.emit(&EmbedmEvent::SessionComplete {
        ok_count: stats.ok_count,
        warning_count: stats.warning_count,
        error_count: stats.error_count,
        elapsed: started.elapsed(),
    });

    Ok(stats)
}

#[allow(clippy::too_many_arguments)]
fn run_stdin(
    cli: &Cli,
    config: &Config,
    cache: &mut FileCache,
    registry: &PluginRegistry,
    plugin_config: &PluginConfig,
    events: &dyn EventSink,
    mut stats: SessionStats,
    started: Instant,
) -> crate::error::Result<SessionStats> {
    let mut content = String::new();
    std::io::stdin().read_to_string(&mut content)?;

    let plan = {
        let mut planner = Planner::new(
            cache,
            registry,
            plugin_config,
            config.max_file_size,
            config.root_directive_type.clone(),
            cli.verbosity >= 3,
        );
        planner.plan_content(&content)
    };

    let tree_errors = collect_tree_errors(&plan);
    stats.warning_count += collect_tree_warnings(&plan).len();
    if has_fatal(&tree_errors) || (!tree_errors.is_empty() && !cli.accept_all) {
        present_errors(&tree_errors);
        stats.error_count += 1;
        events.emit(&EmbedmEvent::SessionComplete {
            ok_count: 0,
            warning_count: stats.warning_count,
            error_count: stats.error_count,
            elapsed: started.elapsed(),
        });
        return Ok(stats);
    }
    if !tree_errors.is_empty() {
        stats.error_count += 1;
    }

    let output = {
        let mut file_config = plugin_config.clone();
        file_config.compiled_dir = cli
            .output_file
            .as_ref()
            .and_then(|p| paths::normalize(p).parent().map(Path::to_path_buf))
            .unwrap_or_default();
        let mut ctx = PluginContext::new(
            cache,
            registry,
            &file_config,
            Some(events),
            PathBuf::from("<stdin>"),
            count_nodes(&plan),
        );
        compiler::compile_plan(&plan, &mut ctx)
    };
    let output = apply_line_endings(&output, config.line_endings);

    match &cli.output_file {
        Some(output_file) if !cli.dry_run => {
            let (written, write_errors) = cache.write(&output, output_file);
            if written.is_none() {
                present_errors(&write_errors);
                stats.error_count += 1;
            } else {
                stats.ok_count += 1;
                stats.files_written += 1;
            }
        }
        _ => {
            let mut stdout = std::io::stdout();
            stdout.write_all(output.as_bytes())?;
            stdout.flush()?;
            stats.ok_count += 1;
        }
    }

    events.emit(&EmbedmEvent::SessionComplete {
        ok_count: stats.ok_count,
        warning_count: stats.warning_count,
        error_count: stats.error_count,
        elapsed: started.elapsed(),
    });
    Ok(stats)
}

/// Interpret the positional input.
fn resolve_input(cli: &Cli) -> Result<InputKind, EmbedmError> {
    let input = match &cli.input {
        None => return Ok(InputKind::Stdin),
        Some(input) => input,
    };

    if input.contains('*') {
        return Ok(InputKind::Glob(input.clone()));
    }
    let path = paths::normalize(Path::new(input));
    if path.is_dir() {
        return Ok(InputKind::Directory(path));
    }
    Ok(InputKind::File(path))
}

/// Expand the input into a list of markdown files.
fn expand_input(input: &InputKind, cache: &FileCache) -> Result<Vec<PathBuf>, EmbedmError> {
    match input {
        InputKind::Stdin => Ok(Vec::new()),
        InputKind::File(path) => Ok(vec![path.clone()]),
        InputKind::Directory(dir) => {
            let mut files: Vec<PathBuf> = WalkDir::new(dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| paths::normalize(entry.path()))
                .filter(|path| {
                    path.extension()
                        .map(|ext| ext == "md" || ext == "markdown")
                        .unwrap_or(false)
                })
                .collect();
            files.sort();
            Ok(files)
        }
        InputKind::Glob(pattern) => {
            let (files, errors) = cache.get_files(pattern);
            for error in &errors {
                warn!("{}", error.description);
            }
            let mut files = files;
            files.sort();
            Ok(files)
        }
    }
}

fn describe_input(input: &InputKind) -> String {
    match input {
        InputKind::Stdin => "stdin".to_string(),
        InputKind::File(path) => format!("file {}", paths::to_relative(path)),
        InputKind::Directory(dir) => format!("directory {}", paths::to_relative(dir)),
        InputKind::Glob(pattern) => format!("glob {pattern}"),
    }
}

fn describe_output(cli: &Cli) -> String {
    if cli.verify {
        return "verify (no writes)".to_string();
    }
    if cli.dry_run {
        return "dry-run (no writes)".to_string();
    }
    match (&cli.output_file, &cli.output_dir) {
        (Some(file), _) => format!("file {}", file.display()),
        (None, Some(dir)) => format!("directory {}", dir.display()),
        (None, None) => "stdout".to_string(),
    }
}

/// The directory a glob pattern is rooted in, for sandbox detection.
fn glob_anchor(pattern: &str) -> PathBuf {
    let literal: PathBuf = Path::new(pattern)
        .components()
        .take_while(|c| !c.as_os_str().to_string_lossy().contains('*'))
        .collect();
    if literal.as_os_str().is_empty() {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
    } else {
        paths::normalize(&literal)
    }
}

/// Compute the output path for a compiled file, or `None` for stdout.
fn output_path_for(cli: &Cli, file: &Path, input_base: Option<&Path>) -> Option<PathBuf> {
    if let Some(output_file) = &cli.output_file {
        return Some(paths::normalize(output_file));
    }
    let output_dir = cli.output_dir.as_ref()?;
    let output_dir = paths::normalize(output_dir);
    let relative = input_base
        .and_then(|base| file.strip_prefix(base).ok())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(file.file_name().unwrap_or_default()));
    Some(output_dir.join(relative))
}

/// Compare compiled content against the file on disk without writing.
fn verify_output(compiled: &str, output_path: &Path) -> &'static str {
    match std::fs::read(output_path) {
        Err(_) => "missing",
        Ok(existing) => {
            if existing == compiled.as_bytes() {
                "up-to-date"
            } else {
                "stale"
            }
        }
    }
}

/// Print errors to stderr.
fn present_errors(errors: &[Status]) {
    for error in errors {
        eprintln!("error: {}", error.description);
    }
}

/// Ask whether to continue after errors. Non-interactive stdin skips.
fn prompt_continue() -> ContinueChoice {
    if !std::io::stdin().is_terminal() {
        return ContinueChoice::No;
    }
    eprint!("Continue with compilation (yes/no/always/exit)? [y/N/a/x] ");
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return ContinueChoice::No;
    }
    parse_continue_choice(&answer)
}

fn parse_continue_choice(answer: &str) -> ContinueChoice {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => ContinueChoice::Yes,
        "a" | "always" => ContinueChoice::Always,
        "x" | "exit" => ContinueChoice::Exit,
        _ => ContinueChoice::No,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_continue_choice() {
        assert_eq!(parse_continue_choice("y\n"), ContinueChoice::Yes);
        assert_eq!(parse_continue_choice("YES\n"), ContinueChoice::Yes);
        assert_eq!(parse_continue_choice("a\n"), ContinueChoice::Always);
        assert_eq!(parse_continue_choice("x\n"), ContinueChoice::Exit);
        assert_eq!(parse_continue_choice("\n"), ContinueChoice::No);
        assert_eq!(parse_continue_choice("whatever\n"), ContinueChoice::No);
    }

    #[test]
    fn test_glob_anchor_stops_at_wildcard() {
        assert_eq!(glob_anchor("/docs/guide/**/*.md"), PathBuf::from("/docs/guide"));
    }

    #[test]
    fn test_output_path_for_mirrors_directory_tree() {
        let cli = Cli::try_parse_from(["embedm", "docs", "-d", "/build"]).unwrap();
        let output = output_path_for(
            &cli,
            Path::new("/docs/sub/page.md"),
            Some(Path::new("/docs")),
        );
        assert_eq!(output, Some(PathBuf::from("/build/sub/page.md")));
    }

    #[test]
    fn test_output_path_none_means_stdout() {
        let cli = Cli::try_parse_from(["embedm", "doc.md"]).unwrap();
        assert_eq!(output_path_for(&cli, Path::new("/doc.md"), None), None);
    }

    #[test]
    fn test_verify_output_statuses() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("out.md");
        assert_eq!(verify_output("content", &path), "missing");

        std::fs::write(&path, "content").unwrap();
        assert_eq!(verify_output("content", &path), "up-to-date");
        assert_eq!(verify_output("changed", &path), "stale");
    }

    #[test]
    fn test_session_stats_exit_code() {
        let stats = SessionStats::default();
        assert_eq!(stats.exit_code(), 0);

        let stats = SessionStats {
            error_count: 1,
            ..SessionStats::default()
        };
        assert_eq!(stats.exit_code(), 1);

        let stats = SessionStats {
            stale_count: 1,
            ..SessionStats::default()
        };
        assert_eq!(stats.exit_code(), 1);
    }
}
