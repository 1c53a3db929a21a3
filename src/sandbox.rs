//! File access sandbox for restricting source file paths
//!
//! The sandbox seeds the file cache's allow-list. Its root is detected, in
//! order: the enclosing git repository of the input, the config file's
//! directory, the current working directory. The git lookup is the only
//! external subprocess in the pipeline and is bounded at five seconds,
//! failing closed (no git root) without aborting the run.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::paths;

const GIT_TIMEOUT: Duration = Duration::from_secs(5);

/// How the sandbox root was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootSource {
    Git,
    ConfigDir,
    Cwd,
    Disabled,
}

/// Resolved sandbox configuration.
#[derive(Debug, Clone)]
pub struct Sandbox {
    pub enabled: bool,
    pub root: PathBuf,
    pub root_source: RootSource,
    pub extra_paths: Vec<PathBuf>,
}

impl Sandbox {
    /// Build a sandbox for the given input path.
    ///
    /// # Arguments
    ///
    /// * `input` - The file or directory being processed
    /// * `config_dir` - Directory containing the config file, if any
    /// * `allow_paths` - Additional roots granted via `--allow-path`
    /// * `disabled` - `--no-sandbox`: allow the whole filesystem
    pub fn build(
        input: &Path,
        config_dir: Option<&Path>,
        allow_paths: &[PathBuf],
        disabled: bool,
    ) -> Self {
        if disabled {
            return Self {
                enabled: false,
                root: PathBuf::from("/"),
                root_source: RootSource::Disabled,
                extra_paths: Vec::new(),
            };
        }

        let (root, root_source) = detect_root(input, config_dir);
        let extra_paths = allow_paths.iter().map(|p| paths::normalize(p)).collect();
        Self {
            enabled: true,
            root,
            root_source,
            extra_paths,
        }
    }

    /// The allow-list entries to hand to the file cache.
    pub fn allow_list(&self) -> Vec<PathBuf> {
        let mut list = vec![self.root.clone()];
        list.extend(self.extra_paths.iter().cloned());
        list
    }

    /// Human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        if !self.enabled {
            return "disabled (--no-sandbox)".to_string();
        }
        let label = match self.root_source {
            RootSource::Git => "git repository root",
            RootSource::ConfigDir => "config file directory",
            RootSource::Cwd => "current working directory",
            RootSource::Disabled => "disabled",
        };
        let mut info = format!("{} ({label})", self.root.display());
        if !self.extra_paths.is_empty() {
            let extras: Vec<String> = self
                .extra_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            info.push_str(&format!(" + {}", extras.join(", ")));
        }
        info
    }
}

/// Detect the sandbox root: git toplevel, config directory, or cwd.
fn detect_root(input: &Path, config_dir: Option<&Path>) -> (PathBuf, RootSource) {
    let start_dir = if input.is_dir() {
        paths::normalize(input)
    } else {
        paths::normalize(input)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"))
    };

    if let Some(root) = git_toplevel(&start_dir) {
        return (root, RootSource::Git);
    }

    if let Some(dir) = config_dir {
        let dir = paths::normalize(dir);
        if dir.is_dir() {
            return (dir, RootSource::ConfigDir);
        }
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    (paths::normalize(&cwd), RootSource::Cwd)
}

/// Run `git rev-parse --show-toplevel`, bounded at five seconds.
///
/// Any failure — git missing, not a repository, timeout — yields `None`.
fn git_toplevel(start_dir: &Path) -> Option<PathBuf> {
    let mut child = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(start_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .spawn()
        .ok()?;

    let status = match child.wait_timeout(GIT_TIMEOUT) {
        Ok(Some(status)) => status,
        Ok(None) => {
            warn!("git rev-parse timed out after {:?}; sandbox falls back", GIT_TIMEOUT);
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }
        Err(_) => return None,
    };

    if !status.success() {
        return None;
    }

    let mut output = String::new();
    child.stdout.take()?.read_to_string(&mut output).ok()?;
    let root = output.trim();
    if root.is_empty() {
        return None;
    }
    debug!(root, "detected git sandbox root");
    Some(paths::normalize(Path::new(root)))
}
