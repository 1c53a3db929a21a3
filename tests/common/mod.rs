//! Shared helpers for integration tests

// not every test binary uses every helper
#![allow(dead_code)]

use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use embedm::cli::Cli;
use embedm::events::NullSink;
use embedm::orchestrator::{run_session, SessionStats};

/// Write a file under `dir`, creating parent directories as needed.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Run a session for the given CLI argument list.
pub fn run(args: &[&str]) -> anyhow::Result<SessionStats> {
    let mut full = vec!["embedm"];
    full.extend_from_slice(args);
    let cli = Cli::try_parse_from(full).expect("test arguments must parse");
    run_session(&cli, Arc::new(NullSink))
}

/// Compile `input` into `output` with the sandbox disabled, returning the
/// session stats; panics on hard errors.
pub fn compile_to(input: &Path, output: &Path) -> SessionStats {
    run(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--no-sandbox",
        "-v",
        "0",
        "-A",
    ])
    .unwrap()
}

/// Read a compiled output file.
pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}
