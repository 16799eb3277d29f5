use std::fs::{self, OpenOptions};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use checkprobe::app::exit_code;
use checkprobe::cli::Cli;
use checkprobe::config::{HarnessConfig, TomlConfig};
use checkprobe::{util, App};
use clap::Parser;

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let path = log_file
        .map(Path::to_path_buf)
        .unwrap_or_else(util::log_file_path);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .init();
    Ok(())
}

fn load_config(cli: &Cli) -> Result<HarnessConfig, checkprobe::ConfigError> {
    let default_path = util::config_path();
    let file = match &cli.config {
        Some(path) => TomlConfig::load(path)?,
        None if default_path.is_file() => TomlConfig::load(&default_path)?,
        None => TomlConfig::default(),
    };
    HarnessConfig::resolve(file, cli.overrides())
}

fn exit_with(code: i32) -> ExitCode {
    ExitCode::from((code & 0xff) as u8)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to a file; stdout carries the records
    init_logging(cli.log_file.as_deref())?;

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            eprintln!("checkprobe: {e}");
            return Ok(exit_with(exit_code::USAGE));
        }
    };

    let app = App::new(config);
    let code = app.run().await;
    Ok(exit_with(code))
}
