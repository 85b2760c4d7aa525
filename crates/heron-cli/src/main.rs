//! Command-line driver for the Heron interpreter.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use heron::{Config, Interpreter};
use tracing_subscriber::EnvFilter;

/// Runs a Heron source file.
#[derive(Debug, Parser)]
#[command(name = "heron", version, about)]
struct Cli {
    /// Path to the Heron source file to run.
    file: PathBuf,

    /// Configuration file; defaults to `heron.toml` next to the executable.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let wait = config.wait_for_keypress;

    let mut interpreter = Interpreter::new(config);
    let code = match interpreter.run_file(&cli.file) {
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    };

    if wait {
        eprintln!("press enter to exit");
        let _ = std::io::stdin().read(&mut [0u8]);
    }
    code
}

/// Loads the configuration: an explicit `--config` path must exist; the
/// implicit `heron.toml` next to the executable is optional.
fn load_config(explicit: Option<&std::path::Path>) -> anyhow::Result<Config> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("heron.toml")))
            .filter(|p| p.is_file()),
    };
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}
