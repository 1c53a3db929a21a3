//! Configuration management for EmbedM
//!
//! Loads `embedm-config.yaml`, validating keys individually: unknown keys
//! are warnings, type mismatches are errors, and a config with errors
//! falls back to the defaults. The loader also discovers a config file
//! beside the input and can generate a commented default file.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::file_cache::LineEndings;
use crate::status::{Status, StatusLevel};

pub const CONFIG_FILE_NAME: &str = "embedm-config.yaml";

pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_048_576;
pub const DEFAULT_MAX_RECURSION: usize = 8;
pub const DEFAULT_MAX_MEMORY: usize = 10_485_760;
pub const DEFAULT_MAX_EMBED_SIZE: usize = 0;
pub const DEFAULT_ROOT_DIRECTIVE_TYPE: &str = "file";

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_max_recursion() -> usize {
    DEFAULT_MAX_RECURSION
}

fn default_max_memory() -> usize {
    DEFAULT_MAX_MEMORY
}

fn default_max_embed_size() -> usize {
    DEFAULT_MAX_EMBED_SIZE
}

fn default_root_directive_type() -> String {
    DEFAULT_ROOT_DIRECTIVE_TYPE.to_string()
}

/// Default plugin execution order. `toc` runs last so that headings from
/// embedded content are visible when the table is generated.
pub fn default_plugin_sequence() -> Vec<String> {
    ["file", "table", "query-path", "synopsis", "recall", "toc"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Main configuration structure for EmbedM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum input file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Maximum recursion depth for nested embeds.
    #[serde(default = "default_max_recursion")]
    pub max_recursion: usize,

    /// File cache memory budget in bytes; must exceed `max_file_size`.
    #[serde(default = "default_max_memory")]
    pub max_memory: usize,

    /// Per-directive output cap in bytes; 0 disables the cap.
    #[serde(default = "default_max_embed_size")]
    pub max_embed_size: usize,

    /// Directive type used for root plan nodes.
    #[serde(default = "default_root_directive_type")]
    pub root_directive_type: String,

    /// Plugin load and dispatch order.
    #[serde(default = "default_plugin_sequence")]
    pub plugin_sequence: Vec<String>,

    /// Line-ending mode for compiled output.
    #[serde(default)]
    pub line_endings: LineEndings,

    /// Per-plugin settings maps, keyed by plugin name.
    #[serde(default)]
    pub plugins: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_recursion: DEFAULT_MAX_RECURSION,
            max_memory: DEFAULT_MAX_MEMORY,
            max_embed_size: DEFAULT_MAX_EMBED_SIZE,
            root_directive_type: default_root_directive_type(),
            plugin_sequence: default_plugin_sequence(),
            line_endings: LineEndings::default(),
            plugins: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load a config file and return the configuration plus any statuses.
    ///
    /// A missing or unusable file yields the defaults with an ERROR; a
    /// usable file with unknown keys yields WARNINGs.
    pub fn load(path: &Path) -> (Self, Vec<Status>) {
        if !path.is_file() {
            return (
                Self::default(),
                vec![Status::error(format!(
                    "config file '{}' not found",
                    path.display()
                ))],
            );
        }

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(exc) => {
                return (
                    Self::default(),
                    vec![Status::error(format!(
                        "failed to read '{}': {exc}",
                        path.display()
                    ))],
                );
            }
        };

        let value: Value = match serde_yaml::from_str(&raw) {
            Ok(value) => value,
            Err(exc) => {
                return (
                    Self::default(),
                    vec![Status::error(format!(
                        "failed to parse '{}': {exc}",
                        path.display()
                    ))],
                );
            }
        };

        debug!(path = %path.display(), "loaded config file");
        Self::from_yaml(value, path)
    }

    fn from_yaml(value: Value, path: &Path) -> (Self, Vec<Status>) {
        let mapping = match value {
            Value::Null => return (Self::default(), Vec::new()),
            Value::Mapping(mapping) => mapping,
            _ => {
                return (
                    Self::default(),
                    vec![Status::error(format!(
                        "config file '{}' must be a YAML mapping",
                        path.display()
                    ))],
                );
            }
        };

        let mut config = Self::default();
        let mut statuses = Vec::new();

        for (key, value) in mapping {
            let key = match key.as_str() {
                Some(key) => key.to_string(),
                None => {
                    statuses.push(Status::warning("ignoring non-string config key"));
                    continue;
                }
            };

            match key.as_str() {
                "max_file_size" => read_u64(&key, &value, &mut statuses, |v| {
                    config.max_file_size = v;
                }),
                "max_recursion" => read_u64(&key, &value, &mut statuses, |v| {
                    config.max_recursion = v as usize;
                }),
                "max_memory" => read_u64(&key, &value, &mut statuses, |v| {
                    config.max_memory = v as usize;
                }),
                "max_embed_size" => read_u64(&key, &value, &mut statuses, |v| {
                    config.max_embed_size = v as usize;
                }),
                "root_directive_type" => match value.as_str() {
                    Some(v) => config.root_directive_type = v.to_string(),
                    None => statuses.push(type_error(&key, "a string", &value)),
                },
                "plugin_sequence" => match value.as_sequence() {
                    Some(sequence) => {
                        let mut entries = Vec::with_capacity(sequence.len());
                        let mut ok = true;
                        for entry in sequence {
                            match entry.as_str() {
                                Some(entry) => entries.push(entry.to_string()),
                                None => {
                                    statuses.push(type_error(&key, "a list of strings", entry));
                                    ok = false;
                                }
                            }
                        }
                        if ok {
                            config.plugin_sequence = entries;
                        }
                    }
                    None => statuses.push(type_error(&key, "a list of strings", &value)),
                },
                "line_endings" => match value.as_str() {
                    Some("lf") => config.line_endings = LineEndings::Lf,
                    Some("crlf") => config.line_endings = LineEndings::Crlf,
                    _ => statuses.push(type_error(&key, "'lf' or 'crlf'", &value)),
                },
                "plugins" => match read_plugin_settings(&value) {
                    Ok(settings) => config.plugins = settings,
                    Err(status) => statuses.push(status),
                },
                _ => statuses.push(Status::warning(format!("unknown config key '{key}'"))),
            }
        }

        let has_errors = statuses.iter().any(|s| s.level == StatusLevel::Error);
        if has_errors {
            return (Self::default(), statuses);
        }

        statuses.extend(config.validate());
        if statuses.iter().any(|s| s.level == StatusLevel::Error) {
            return (Self::default(), statuses);
        }

        (config, statuses)
    }

    /// Cross-field validation of loaded values.
    pub fn validate(&self) -> Vec<Status> {
        let mut statuses = Vec::new();
        if self.max_file_size < 1 {
            statuses.push(Status::error(format!(
                "'max_file_size' must be >= 1, got {}",
                self.max_file_size
            )));
        }
        if self.max_recursion < 1 {
            statuses.push(Status::error(format!(
                "'max_recursion' must be >= 1, got {}",
                self.max_recursion
            )));
        }
        if self.max_memory as u64 <= self.max_file_size {
            statuses.push(Status::error(format!(
                "'max_memory' ({}) must be greater than 'max_file_size' ({})",
                self.max_memory, self.max_file_size
            )));
        }
        statuses
    }
}

fn type_error(key: &str, expected: &str, value: &Value) -> Status {
    Status::error(format!(
        "config key '{key}' must be {expected}, got {}",
        yaml_type_name(value)
    ))
}

fn yaml_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn read_u64(key: &str, value: &Value, statuses: &mut Vec<Status>, mut assign: impl FnMut(u64)) {
    match value.as_u64() {
        Some(v) => assign(v),
        None => statuses.push(type_error(key, "a non-negative integer", value)),
    }
}

fn read_plugin_settings(
    value: &Value,
) -> Result<BTreeMap<String, BTreeMap<String, String>>, Status> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| type_error("plugins", "a mapping of plugin settings", value))?;

    let mut settings = BTreeMap::new();
    for (plugin_name, plugin_value) in mapping {
        let plugin_name = plugin_name
            .as_str()
            .ok_or_else(|| type_error("plugins", "string plugin names", plugin_name))?;
        let plugin_mapping = plugin_value.as_mapping().ok_or_else(|| {
            type_error("plugins", "a mapping of settings per plugin", plugin_value)
        })?;

        let mut entries = BTreeMap::new();
        for (setting_key, setting_value) in plugin_mapping {
            let setting_key = setting_key
                .as_str()
                .ok_or_else(|| type_error("plugins", "string setting keys", setting_key))?;
            let text = match setting_value {
                Value::String(s) => s.clone(),
                Value::Bool(true) => "True".to_string(),
                Value::Bool(false) => "False".to_string(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(type_error("plugins", "scalar setting values", other));
                }
            };
            entries.insert(setting_key.to_string(), text);
        }
        settings.insert(plugin_name.to_string(), entries);
    }
    Ok(settings)
}

/// Look for `embedm-config.yaml` in the input file's directory.
pub fn discover_config(input: &Path) -> Option<PathBuf> {
    let resolved = crate::paths::normalize(input);
    let parent = if resolved.is_dir() {
        resolved
    } else {
        resolved.parent()?.to_path_buf()
    };
    let candidate = parent.join(CONFIG_FILE_NAME);
    candidate.is_file().then_some(candidate)
}

/// Generate a commented default `embedm-config.yaml` in `directory`.
pub fn generate_default_config(directory: &Path) -> Result<PathBuf, Status> {
    if !directory.is_dir() {
        return Err(Status::error(format!(
            "directory '{}' does not exist",
            directory.display()
        )));
    }

    let config_path = directory.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        return Err(Status::error(format!(
            "'{}' already exists",
            config_path.display()
        )));
    }

    let mut template = format!(
        "# embedm configuration file\n\
         \n\
         # max input file size in bytes\n\
         max_file_size: {DEFAULT_MAX_FILE_SIZE}\n\
         \n\
         # max recursion depth for nested embeds\n\
         max_recursion: {DEFAULT_MAX_RECURSION}\n\
         \n\
         # max memory for the file cache in bytes\n\
         max_memory: {DEFAULT_MAX_MEMORY}\n\
         \n\
         # max embed output size in bytes (0 disables)\n\
         max_embed_size: {DEFAULT_MAX_EMBED_SIZE}\n\
         \n\
         # directive type used for root plan nodes\n\
         root_directive_type: {DEFAULT_ROOT_DIRECTIVE_TYPE}\n\
         \n\
         # line endings for compiled output (lf or crlf)\n\
         line_endings: lf\n\
         \n\
         # plugin execution order\n\
         plugin_sequence:\n"
    );
    for plugin in default_plugin_sequence() {
        template.push_str(&format!("  - {plugin}\n"));
    }

    std::fs::write(&config_path, template)
        .map_err(|exc| Status::error(format!("failed to write config: {exc}")))?;
    Ok(config_path)
}
