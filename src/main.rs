//! EmbedM - Markdown preprocessor CLI
//!
//! Main entry point: initialises tracing, parses arguments, and dispatches
//! to the compile pipeline or one of the utility modes.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use embedm::cli::Cli;
use embedm::commands;

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse_args();

    let exit_code = if let Some(directory) = &cli.init {
        commands::init::run(directory)?
    } else if cli.plugins {
        commands::plugins::run(&cli)?
    } else {
        commands::compile::run(&cli)?
    };

    std::process::exit(exit_code);
}

/// Initialise the tracing subscriber with an environment filter.
///
/// `EMBEDM_LOG` takes precedence over `RUST_LOG`; the default keeps the
/// library quiet so diagnostics never mix into piped output.
fn init_tracing() {
    let env_filter = std::env::var("EMBEDM_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("embedm=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
