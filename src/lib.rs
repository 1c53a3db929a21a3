//! EmbedM - Markdown preprocessor library
//!
//! EmbedM compiles Markdown documents containing typed directive blocks
//! (fenced by ```` ```yaml embedm ````) by resolving each directive through
//! a matching plugin and replacing the block with the computed content.
//!
//! # Architecture
//!
//! The pipeline runs in four stages per input file:
//!
//! - [`parser`]: scans a Markdown string into ordered fragments — literal
//!   spans and parsed directives
//! - [`planner`]: recursively builds a validated plan tree, enforcing
//!   cycle, depth, and file-access limits without short-circuiting on
//!   errors
//! - [`file_cache`]: LRU-bounded content store mediating every read and
//!   write behind a path allow-list
//! - [`compiler`]: walks the plan tree, invoking plugins in configured
//!   pass order to assemble the output string
//!
//! [`plugins`] defines the plugin contract and the built-in set (file,
//! toc, table, synopsis, recall, query-path); [`orchestrator`] drives
//! whole sessions for the CLI.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use embedm::cli::Cli;
//! use embedm::events::NullSink;
//! use embedm::orchestrator::run_session;
//!
//! fn main() -> anyhow::Result<()> {
//!     let cli = Cli::parse_args();
//!     let stats = run_session(&cli, Arc::new(NullSink))?;
//!     std::process::exit(stats.exit_code());
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod extract;
pub mod file_cache;
pub mod orchestrator;
pub mod parser;
pub mod paths;
pub mod planner;
pub mod plugins;
pub mod render;
pub mod sandbox;
pub mod status;

// Re-export commonly used types
pub use config::Config;
pub use document::{Directive, Document, Fragment, Span};
pub use error::{EmbedmError, Result};
pub use file_cache::{FileCache, WriteMode};
pub use planner::{PlanNode, Planner};
pub use plugins::{Plugin, PluginConfig, PluginContext};
pub use status::{Status, StatusLevel};
