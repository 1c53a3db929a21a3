//! Stream renderer: plain, line-by-line progress output
//!
//! Subscribes to session events and writes verbosity-gated lines to
//! stderr. No cursor movement, suitable for piped and CI runs. Colour is
//! limited to the `[OK]`/`[ERR]` tags and suppressed when stderr is not a
//! terminal or `NO_COLOR` is set.

use colored::Colorize;
use std::io::IsTerminal;
use std::path::Path;

use crate::events::{EmbedmEvent, EventSink};
use crate::paths::to_relative;

/// Verbosity levels: 0 silent, 1 summary, 2 per-file progress, 3 adds
/// cache activity.
pub struct StreamRenderer {
    verbosity: u8,
    use_color: bool,
}

impl StreamRenderer {
    pub fn new(verbosity: u8) -> Self {
        let use_color =
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self {
            verbosity,
            use_color,
        }
    }

    #[cfg(test)]
    fn plain(verbosity: u8) -> Self {
        Self {
            verbosity,
            use_color: false,
        }
    }

    fn ok_tag(&self) -> String {
        if self.use_color {
            "[OK]".green().to_string()
        } else {
            "[OK]".to_string()
        }
    }

    fn err_tag(&self) -> String {
        if self.use_color {
            "[ERR]".red().to_string()
        } else {
            "[ERR]".to_string()
        }
    }

    fn line(&self, text: &str) {
        eprintln!("{text}");
    }

    fn relative(path: &Path) -> String {
        to_relative(path)
    }
}

impl EventSink for StreamRenderer {
    fn emit(&self, event: &EmbedmEvent) {
        match event {
            EmbedmEvent::SessionStarted {
                version,
                config_source,
                input_kind,
                output_kind,
            } => {
                if self.verbosity >= 1 {
                    self.line(&format!("embedm v{version}"));
                }
                if self.verbosity >= 2 {
                    self.line(&format!("Config: {config_source}"));
                    self.line(&format!("Input:  {input_kind}"));
                    self.line(&format!("Output: {output_kind}"));
                }
            }
            EmbedmEvent::PluginsLoaded {
                discovered,
                loaded,
                warnings,
            } => {
                for warning in warnings {
                    self.line(&format!("warning: {warning}"));
                }
                if self.verbosity >= 2 {
                    self.line(&format!(
                        "{discovered} plugins discovered, {loaded} plugins loaded."
                    ));
                }
            }
            EmbedmEvent::PlanningStarted { file_count } => {
                if self.verbosity >= 2 {
                    self.line(&format!("Planning {file_count} file(s)"));
                }
            }
            EmbedmEvent::FilePlanned {
                file_path,
                index,
                total,
            } => {
                if self.verbosity >= 2 {
                    self.line(&format!(
                        "  [{}/{total}] {}",
                        index + 1,
                        Self::relative(file_path)
                    ));
                }
            }
            EmbedmEvent::FilePlanError {
                file_path,
                index,
                total,
                message,
            } => {
                if self.verbosity >= 2 {
                    self.line(&format!(
                        "  [{}/{total}] {}",
                        index + 1,
                        Self::relative(file_path)
                    ));
                    self.line(&format!("  {} {message}", self.err_tag()));
                }
            }
            EmbedmEvent::PlanningComplete { .. } | EmbedmEvent::CompilationStarted { .. } => {}
            EmbedmEvent::FileStarted {
                file_path,
                node_count,
                index,
                total,
            } => {
                if self.verbosity >= 3 {
                    self.line(&format!(
                        "  [{}/{total}] compiling {} ({node_count} nodes)",
                        index + 1,
                        Self::relative(file_path)
                    ));
                }
            }
            EmbedmEvent::NodeCompiled { .. } => {}
            EmbedmEvent::FileCompleted {
                file_path,
                output_path,
                elapsed,
                ..
            } => {
                if self.verbosity >= 2 {
                    self.line(&format!(
                        "{} {:.2}s  {} -> {}",
                        self.ok_tag(),
                        elapsed.as_secs_f64(),
                        Self::relative(file_path),
                        Self::relative(output_path)
                    ));
                }
            }
            EmbedmEvent::FileError {
                file_path, message, ..
            } => {
                if self.verbosity >= 1 {
                    self.line(&format!("{} {}", self.err_tag(), Self::relative(file_path)));
                    self.line(&format!("  {message}"));
                }
            }
            EmbedmEvent::FileVerified { file_path, status } => {
                // verify output is the point of the run: always printed
                self.line(&format!(
                    "[{}] {}",
                    status.to_uppercase(),
                    Self::relative(file_path)
                ));
            }
            EmbedmEvent::CompilationComplete { .. } => {}
            EmbedmEvent::SessionComplete {
                ok_count,
                warning_count,
                error_count,
                elapsed,
            } => {
                if self.verbosity >= 1 {
                    self.line(&format!(
                        "done: {ok_count} ok, {warning_count} warning(s), {error_count} error(s) in {:.2}s",
                        elapsed.as_secs_f64()
                    ));
                }
            }
            EmbedmEvent::Cache { kind, key } => {
                if self.verbosity >= 3 {
                    self.line(&format!("cache {kind}: {}", Self::relative(key)));
                }
            }
        }
    }
}
