//! Command-line interface definition for EmbedM
//!
//! Defined with clap's derive API. The binary has a single compile
//! pipeline rather than subcommands; `--init` and `--plugins` short-circuit
//! into utility modes.

use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::status::Status;

/// EmbedM - Markdown preprocessor
///
/// Compiles Markdown documents by resolving `yaml embedm` directive
/// blocks through a plugin pipeline.
#[derive(Parser, Debug, Clone)]
#[command(name = "embedm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Input file, directory, or glob; reads stdin when omitted
    pub input: Option<String>,

    /// Output file path (single-file input only)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Output directory, mirroring the input tree
    #[arg(short = 'd', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Configuration file path (default: embedm-config.yaml beside the input)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbosity level 0-3
    #[arg(short = 'v', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub verbosity: u8,

    /// Compare compiled content against existing output without writing
    #[arg(long)]
    pub verify: bool,

    /// Compile without writing any files
    #[arg(long)]
    pub dry_run: bool,

    /// Continue on errors without prompting
    #[arg(short = 'A', long)]
    pub accept_all: bool,

    /// Additional allowed path roots (repeatable)
    #[arg(long, value_name = "PATH")]
    pub allow_path: Vec<PathBuf>,

    /// Disable the file access sandbox
    #[arg(long)]
    pub no_sandbox: bool,

    /// Generate a default embedm-config.yaml in DIR (default: .)
    #[arg(long, value_name = "DIR", num_args = 0..=1, default_missing_value = ".")]
    pub init: Option<PathBuf>,

    /// Print the loaded-plugin report and exit
    #[arg(long)]
    pub plugins: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate argument combinations beyond what clap expresses.
    pub fn validate(&self) -> Vec<Status> {
        let mut errors = Vec::new();

        if self.init.is_some() || self.plugins {
            return errors;
        }

        if self.output_file.is_some() && self.output_dir.is_some() {
            errors.push(Status::error(
                "cannot specify both --output-file and --output-dir",
            ));
        }

        if self.output_file.is_some() && self.is_directory_input() {
            errors.push(Status::error(
                "cannot use --output-file with directory input, use --output-dir",
            ));
        }

        if self.verify && self.dry_run {
            errors.push(Status::error("--verify and --dry-run are mutually exclusive"));
        }

        if self.verify && self.output_file.is_none() && self.output_dir.is_none() {
            errors.push(Status::error(
                "--verify requires --output-file or --output-dir",
            ));
        }

        if self.input.is_none() && std::io::stdin().is_terminal() {
            errors.push(Status::error(
                "no input provided; pass a file/directory or pipe via stdin",
            ));
        }

        errors
    }

    /// Whether the positional input names a directory or a glob.
    pub fn is_directory_input(&self) -> bool {
        match &self.input {
            None => false,
            Some(input) => input.contains('*') || Path::new(input).is_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_input() {
        let cli = Cli::try_parse_from(["embedm", "doc.md"]).unwrap();
        assert_eq!(cli.input.as_deref(), Some("doc.md"));
        assert_eq!(cli.verbosity, 1);
        assert!(!cli.accept_all);
        assert!(!cli.verify);
    }

    #[test]
    fn test_parse_output_file() {
        let cli = Cli::try_parse_from(["embedm", "doc.md", "-o", "out.md"]).unwrap();
        assert_eq!(cli.output_file, Some(PathBuf::from("out.md")));
    }

    #[test]
    fn test_parse_output_dir_and_verbosity() {
        let cli = Cli::try_parse_from(["embedm", "docs/", "-d", "build/", "-v", "3"]).unwrap();
        assert_eq!(cli.output_dir, Some(PathBuf::from("build/")));
        assert_eq!(cli.verbosity, 3);
    }

    #[test]
    fn test_verbosity_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["embedm", "doc.md", "-v", "4"]).is_err());
    }

    #[test]
    fn test_both_output_modes_rejected() {
        let cli =
            Cli::try_parse_from(["embedm", "doc.md", "-o", "a.md", "-d", "build/"]).unwrap();
        let errors = cli.validate();
        assert!(errors
            .iter()
            .any(|e| e.description.contains("both --output-file and --output-dir")));
    }

    #[test]
    fn test_output_file_with_glob_input_rejected() {
        let cli = Cli::try_parse_from(["embedm", "docs/*.md", "-o", "out.md"]).unwrap();
        let errors = cli.validate();
        assert!(errors
            .iter()
            .any(|e| e.description.contains("use --output-dir")));
    }

    #[test]
    fn test_verify_requires_output_target() {
        let cli = Cli::try_parse_from(["embedm", "doc.md", "--verify"]).unwrap();
        let errors = cli.validate();
        assert!(errors
            .iter()
            .any(|e| e.description.contains("--verify requires")));

        let cli = Cli::try_parse_from(["embedm", "doc.md", "--verify", "-o", "out.md"]).unwrap();
        assert!(cli.validate().is_empty());
    }

    #[test]
    fn test_verify_and_dry_run_exclusive() {
        let cli =
            Cli::try_parse_from(["embedm", "doc.md", "--verify", "--dry-run", "-o", "o.md"])
                .unwrap();
        let errors = cli.validate();
        assert!(errors
            .iter()
            .any(|e| e.description.contains("mutually exclusive")));
    }

    #[test]
    fn test_accept_all_short_flag() {
        let cli = Cli::try_parse_from(["embedm", "doc.md", "-A"]).unwrap();
        assert!(cli.accept_all);
    }

    #[test]
    fn test_allow_path_repeatable() {
        let cli = Cli::try_parse_from([
            "embedm",
            "doc.md",
            "--allow-path",
            "/a",
            "--allow-path",
            "/b",
        ])
        .unwrap();
        assert_eq!(cli.allow_path.len(), 2);
    }

    #[test]
    fn test_init_with_and_without_dir() {
        let cli = Cli::try_parse_from(["embedm", "--init"]).unwrap();
        assert_eq!(cli.init, Some(PathBuf::from(".")));

        let cli = Cli::try_parse_from(["embedm", "--init", "docs"]).unwrap();
        assert_eq!(cli.init, Some(PathBuf::from("docs")));
    }

    #[test]
    fn test_init_skips_input_validation() {
        let cli = Cli::try_parse_from(["embedm", "--init"]).unwrap();
        assert!(cli.validate().is_empty());
    }

    #[test]
    fn test_glob_input_counts_as_directory() {
        let cli = Cli::try_parse_from(["embedm", "docs/**/*.md"]).unwrap();
        assert!(cli.is_directory_input());
    }
}
