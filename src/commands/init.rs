//! Init command: generate a default configuration file

use std::path::Path;

use crate::config::generate_default_config;
use crate::error::Result;

/// Write a commented default `embedm-config.yaml` into `directory`.
pub fn run(directory: &Path) -> Result<i32> {
    match generate_default_config(directory) {
        Ok(path) => {
            println!("created {}", path.display());
            Ok(0)
        }
        Err(status) => {
            eprintln!("error: {}", status.description);
            Ok(1)
        }
    }
}
