//! Compile command: runs the full session pipeline

use std::sync::Arc;
use tracing::info;

use crate::cli::Cli;
use crate::error::Result;
use crate::orchestrator::{run_session, SessionStats};
use crate::render::StreamRenderer;

/// Validate arguments and run a compile session.
///
/// # Returns
///
/// The process exit code: 0 on success, 1 when any file failed or was
/// found stale/missing in verify mode, 2 on argument errors.
pub fn run(cli: &Cli) -> Result<i32> {
    let argument_errors = cli.validate();
    if !argument_errors.is_empty() {
        for error in &argument_errors {
            eprintln!("error: {}", error.description);
        }
        return Ok(2);
    }

    info!(input = ?cli.input, verify = cli.verify, dry_run = cli.dry_run, "starting session");
    let renderer = Arc::new(StreamRenderer::new(cli.verbosity));
    let stats: SessionStats = run_session(cli, renderer)?;
    Ok(stats.exit_code())
}
