use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigOverrides, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "checkprobe")]
#[command(
    about = "Run a target under a debugger and print a variable at every checkpoint.",
    long_about = None
)]
pub struct Cli {
    /// TOML file with default settings; flags override it
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Executable to launch
    #[arg(long, value_name = "PATH", conflicts_with = "pid")]
    pub target: Option<PathBuf>,

    /// Attach to a running process instead of launching
    #[arg(long)]
    pub pid: Option<u32>,

    /// Function whose entry marks a checkpoint
    #[arg(long)]
    pub marker: Option<String>,

    /// Variable to print in the inspected frame
    #[arg(long)]
    pub variable: Option<String>,

    /// Printer script to load, or "builtin" (repeatable)
    #[arg(long, value_name = "SCRIPT")]
    pub formatter: Vec<String>,

    /// Frames to ascend from the marker
    #[arg(long)]
    pub frame_depth: Option<u32>,

    /// Debugger binary (defaults to gdb on PATH)
    #[arg(long, value_name = "PATH")]
    pub gdb: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Prepended to every record line, e.g. "@@@ "
    #[arg(long)]
    pub prefix: Option<String>,

    /// Compare record lines against this file; exit 1 on mismatch
    #[arg(long, value_name = "FILE")]
    pub expect: Option<PathBuf>,

    /// Rewrite the --expect file from this run's output
    #[arg(long)]
    pub update: bool,

    /// Per-command debugger timeout
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Log file (defaults to ~/.checkprobe/logs/checkprobe.log)
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Arguments passed to the launched target
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            target: self.target.clone(),
            args: self.args.clone(),
            pid: self.pid,
            marker: self.marker.clone(),
            variable: self.variable.clone(),
            formatter: self.formatter.clone(),
            frame_depth: self.frame_depth,
            gdb: self.gdb.clone(),
            command_timeout_ms: self.timeout_ms,
            format: self.format,
            prefix: self.prefix.clone(),
            expect: self.expect.clone(),
            update: self.update,
        }
    }
}
