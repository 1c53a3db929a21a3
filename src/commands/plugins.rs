//! Plugins command: print a loaded-plugin health report

use std::path::Path;

use crate::cli::Cli;
use crate::config::{discover_config, Config};
use crate::error::Result;
use crate::plugins::registry::{build_registry, validate_plugin_settings};
use crate::status::StatusLevel;

/// Print the plugin report: loaded plugins with their directive types,
/// plus any sequence or settings issues.
pub fn run(cli: &Cli) -> Result<i32> {
    let config_path = cli.config.clone().or_else(|| {
        cli.input
            .as_ref()
            .and_then(|input| discover_config(Path::new(input)))
    });
    let (config, _) = match &config_path {
        Some(path) => Config::load(path),
        None => (Config::default(), Vec::new()),
    };

    let (registry, mut issues) = build_registry(&config.plugin_sequence);
    issues.extend(validate_plugin_settings(&registry, &config.plugins));

    let loaded = registry.plugins();
    println!("plugins ({} loaded):", loaded.len());
    let type_width = loaded
        .iter()
        .map(|p| p.directive_type().len())
        .max()
        .unwrap_or(0);
    for plugin in &loaded {
        println!(
            "  {:<type_width$}  {}  (api v{})",
            plugin.directive_type(),
            plugin.name(),
            plugin.api_version()
        );
    }

    if !issues.is_empty() {
        println!("\nissues ({}):", issues.len());
        for issue in &issues {
            let prefix = match issue.level {
                StatusLevel::Error | StatusLevel::Fatal => "error",
                _ => "warning",
            };
            println!("  {prefix}: {}", issue.description);
        }
    }

    let has_errors = issues.iter().any(|s| s.is_blocking());
    Ok(if has_errors { 1 } else { 0 })
}
