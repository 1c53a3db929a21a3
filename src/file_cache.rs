//! LRU-bounded file cache mediating every pipeline read and write
//!
//! The cache is an ordered map from canonical path to either the file's
//! UTF-8 text or a tombstone meaning "was loaded, evicted". Tombstones hold
//! no memory but remain in the map to short-circuit the allow-list check on
//! re-access. Every filesystem touch goes through the allow-list and the
//! per-file size cap first.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::EmbedmError;
use crate::paths;
use crate::status::Status;

/// Behaviour when a write target already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Replace the existing file.
    #[default]
    Overwrite,
    /// Write to `stem.N.extension` for the lowest free N.
    CreateNew,
}

/// Load state of a path in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    NotInCache,
    Loaded,
    Unloaded,
}

/// Cache activity reported through the optional event callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    Hit,
    Miss,
    Eviction,
}

type EventCallback = Box<dyn Fn(&Path, CacheEventKind)>;

/// LRU file cache with memory management and path access control.
///
/// Allow-list entries may be plain directory roots or glob patterns
/// (`*` and `**`).
pub struct FileCache {
    max_file_size: u64,
    memory_limit: usize,
    allowed_paths: Vec<PathBuf>,
    write_mode: WriteMode,
    max_embed_size: usize,
    on_event: Option<EventCallback>,
    entries: HashMap<PathBuf, Option<Arc<str>>>,
    /// Access order, most recently used first.
    order: Vec<PathBuf>,
    memory_in_use: usize,
}

impl FileCache {
    /// Create a cache.
    ///
    /// # Errors
    ///
    /// Returns an error when `memory_limit` does not exceed `max_file_size`
    /// or the allow-list is empty.
    pub fn new(
        max_file_size: u64,
        memory_limit: usize,
        allowed_paths: Vec<PathBuf>,
        write_mode: WriteMode,
        max_embed_size: usize,
    ) -> Result<Self, EmbedmError> {
        if memory_limit as u64 <= max_file_size {
            return Err(EmbedmError::Cache(format!(
                "memory limit ({memory_limit}) must be greater than max file size ({max_file_size})"
            )));
        }
        if allowed_paths.is_empty() {
            return Err(EmbedmError::Cache(
                "allow-list must contain at least one path".to_string(),
            ));
        }
        Ok(Self {
            max_file_size,
            memory_limit,
            allowed_paths: allowed_paths.iter().map(|p| paths::normalize(p)).collect(),
            write_mode,
            max_embed_size,
            on_event: None,
            entries: HashMap::new(),
            order: Vec::new(),
            memory_in_use: 0,
        })
    }

    /// Attach a callback invoked on cache hits, misses, and evictions.
    pub fn set_event_callback(&mut self, callback: EventCallback) {
        self.on_event = Some(callback);
    }

    pub fn max_embed_size(&self) -> usize {
        self.max_embed_size
    }

    pub fn memory_in_use(&self) -> usize {
        self.memory_in_use
    }

    /// Check that the file at `path` exists, fits the size cap, and matches
    /// the allow-list. Pure check with no side effects; skips the
    /// filesystem when the path is already cached.
    pub fn validate(&self, path: &Path) -> Vec<Status> {
        if self.entries.contains_key(path) {
            return Vec::new();
        }

        if !self.is_allowed(path) {
            return vec![Status::fatal(format!(
                "path is not in allowed paths: '{}'",
                path.display()
            ))];
        }

        if !path.is_file() {
            return vec![Status::error(format!(
                "file does not exist: '{}'",
                path.display()
            ))];
        }

        let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if file_size > self.max_file_size {
            return vec![Status::error(format!(
                "file exceeds max size ({} > {}): '{}'",
                file_size,
                self.max_file_size,
                path.display()
            ))];
        }

        Vec::new()
    }

    /// Return cached file content, or validate and load from disk.
    ///
    /// Moves the entry to the front of the cache on access. A tombstoned
    /// entry skips re-validation but re-reads from disk. Loading evicts
    /// least-recently-used entries until the memory budget holds.
    pub fn get_file(&mut self, path: &Path) -> (Option<Arc<str>>, Vec<Status>) {
        if let Some(Some(content)) = self.entries.get(path) {
            let content = Arc::clone(content);
            self.touch(path);
            self.emit(path, CacheEventKind::Hit);
            return (Some(content), Vec::new());
        }

        if !self.entries.contains_key(path) {
            let errors = self.validate(path);
            if !errors.is_empty() {
                return (None, errors);
            }
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(exc) => {
                return (
                    None,
                    vec![Status::error(format!(
                        "failed to read '{}': {exc}",
                        path.display()
                    ))],
                );
            }
        };

        let content: Arc<str> = Arc::from(content.as_str());
        self.insert(path.to_path_buf(), content.clone());
        self.emit(path, CacheEventKind::Miss);
        (Some(content), Vec::new())
    }

    /// Write content to a file, honouring the allow-list and write mode.
    ///
    /// In `CreateNew` mode an existing target is preserved and the content
    /// goes to `stem.N.extension` for the lowest free N. The written
    /// content is inserted into the cache. Returns the actual path written.
    pub fn write(&mut self, content: &str, path: &Path) -> (Option<PathBuf>, Vec<Status>) {
        let normalized = paths::normalize(path);
        if !self.is_allowed(&normalized) {
            return (
                None,
                vec![Status::fatal(format!(
                    "path is not in allowed paths: '{}'",
                    normalized.display()
                ))],
            );
        }

        let actual = if normalized.is_file() && self.write_mode == WriteMode::CreateNew {
            next_available_path(&normalized)
        } else {
            normalized
        };

        if let Err(exc) = fs::write(&actual, content) {
            return (
                None,
                vec![Status::error(format!(
                    "failed to write '{}': {exc}",
                    actual.display()
                ))],
            );
        }
        debug!(path = %actual.display(), bytes = content.len(), "wrote output file");

        self.insert(actual.clone(), Arc::from(content));
        (Some(actual), Vec::new())
    }

    /// Insert content directly into the cache without touching the
    /// filesystem. Used for stdin input, which has a synthetic path.
    pub fn prime(&mut self, path: PathBuf, content: &str) {
        self.insert(path, Arc::from(content));
    }

    /// Whether the path is cached and in which load state.
    pub fn file_state(&self, path: &Path) -> FileState {
        match self.entries.get(path) {
            None => FileState::NotInCache,
            Some(Some(_)) => FileState::Loaded,
            Some(None) => FileState::Unloaded,
        }
    }

    /// Expand a glob pattern to the matched files permitted by the
    /// allow-list.
    ///
    /// Matched paths blocked by the allow-list surface as per-entry ERROR
    /// statuses, not a single failure.
    pub fn get_files(&self, pattern: &str) -> (Vec<PathBuf>, Vec<Status>) {
        let mut files = Vec::new();
        let mut errors = Vec::new();

        let walker = match glob::glob(pattern) {
            Ok(walker) => walker,
            Err(exc) => {
                errors.push(Status::error(format!("invalid glob pattern '{pattern}': {exc}")));
                return (files, errors);
            }
        };

        for entry in walker.flatten() {
            if !entry.is_file() {
                continue;
            }
            let resolved = paths::normalize(&entry);
            if self.is_allowed(&resolved) {
                files.push(resolved);
            } else {
                errors.push(Status::error(format!(
                    "matched file is not in allowed paths: '{}'",
                    resolved.display()
                )));
            }
        }

        (files, errors)
    }

    /// Check a path against the allow-list: descendant-of-or-equal to an
    /// entry, or a glob match against one.
    fn is_allowed(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.allowed_paths.iter().any(|allowed| {
            paths::is_under(path, allowed)
                || glob_match::glob_match(&allowed.to_string_lossy(), &path_str)
        })
    }

    fn insert(&mut self, path: PathBuf, content: Arc<str>) {
        self.make_room(content.len());
        if let Some(Some(old)) = self.entries.get(&path) {
            self.memory_in_use -= old.len();
        }
        self.memory_in_use += content.len();
        self.entries.insert(path.clone(), Some(content));
        self.touch(&path);
    }

    /// Move `path` to the front of the access order.
    fn touch(&mut self, path: &Path) {
        self.order.retain(|p| p != path);
        self.order.insert(0, path.to_path_buf());
    }

    /// Evict least-recently-used loaded entries until `needed` more bytes
    /// fit, or no loaded entries remain.
    fn make_room(&mut self, needed: usize) {
        while self.memory_in_use + needed > self.memory_limit {
            if !self.evict_lru() {
                break;
            }
        }
    }

    fn evict_lru(&mut self) -> bool {
        for path in self.order.iter().rev() {
            if let Some(slot) = self.entries.get_mut(path) {
                if let Some(content) = slot.take() {
                    self.memory_in_use -= content.len();
                    let evicted = path.clone();
                    self.emit(&evicted, CacheEventKind::Eviction);
                    return true;
                }
            }
        }
        false
    }

    fn emit(&self, path: &Path, kind: CacheEventKind) {
        if let Some(callback) = &self.on_event {
            callback(path, kind);
        }
    }
}

/// Find the next available numbered path: `file.N.ext`.
fn next_available_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let mut counter = 0u32;
    loop {
        let candidate = parent.join(format!("{stem}.{counter}{extension}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Line-ending mode for compiled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEndings {
    #[default]
    Lf,
    Crlf,
}

/// Normalise line endings in compiled output.
///
/// `lf` passes through; `crlf` converts every bare `\n` to `\r\n`.
pub fn apply_line_endings(text: &str, mode: LineEndings) -> String {
    match mode {
        LineEndings::Lf => text.to_string(),
        LineEndings::Crlf => {
            let mut result = String::with_capacity(text.len() + text.len() / 16);
            let mut previous = '\0';
            for ch in text.chars() {
                if ch == '\n' && previous != '\r' {
                    result.push('\r');
                }
                result.push(ch);
                previous = ch;
            }
            result
        }
    }
}
