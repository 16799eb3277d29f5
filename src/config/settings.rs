use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::controller::InspectionPlan;
use crate::debugger::{FormatterSource, TargetSpec};

/// Keyword selecting the debugger's own printers instead of script files
pub const BUILTIN_FORMATTER: &str = "builtin";

pub const DEFAULT_FRAME_DEPTH: u32 = 1;
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Conflicting settings: {0}")]
    Conflict(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    #[error("Formatter script not found: {}", .0.display())]
    FormatterNotFound(PathBuf),
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `TAG:` / `PRINT:` line pairs
    #[default]
    Text,
    /// One JSON object per line
    Jsonl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Prepended to every record line
    pub prefix: String,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub target: TargetSpec,
    pub marker: String,
    pub variable: String,
    pub formatter: FormatterSource,
    pub frame_depth: u32,
    /// Explicit debugger binary; looked up on PATH when unset
    pub gdb_path: Option<PathBuf>,
    pub command_timeout_ms: u64,
    pub output: OutputConfig,
    /// Golden file to compare the record lines against
    pub expect: Option<PathBuf>,
    /// Rewrite the golden file instead of comparing
    pub update: bool,
}

/// TOML representation of the `[target]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlTargetConfig {
    pub path: Option<PathBuf>,
    pub args: Option<Vec<String>>,
    pub pid: Option<u32>,
}

/// TOML representation of the `[inspect]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlInspectConfig {
    pub marker: Option<String>,
    pub variable: Option<String>,
    pub frame_depth: Option<u32>,
    /// Printer scripts, or `["builtin"]`
    pub formatter: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlDebuggerConfig {
    pub gdb: Option<PathBuf>,
    pub command_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlOutputConfig {
    pub format: Option<OutputFormat>,
    pub prefix: Option<String>,
    pub expect: Option<PathBuf>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub target: Option<TomlTargetConfig>,
    pub inspect: Option<TomlInspectConfig>,
    pub debugger: Option<TomlDebuggerConfig>,
    pub output: Option<TomlOutputConfig>,
}

impl TomlConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Settings given on the command line; these win over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub target: Option<PathBuf>,
    pub args: Vec<String>,
    pub pid: Option<u32>,
    pub marker: Option<String>,
    pub variable: Option<String>,
    pub formatter: Vec<String>,
    pub frame_depth: Option<u32>,
    pub gdb: Option<PathBuf>,
    pub command_timeout_ms: Option<u64>,
    pub format: Option<OutputFormat>,
    pub prefix: Option<String>,
    pub expect: Option<PathBuf>,
    pub update: bool,
}

impl HarnessConfig {
    /// Merge command-line settings over the file and validate the result.
    pub fn resolve(file: TomlConfig, cli: ConfigOverrides) -> Result<Self, ConfigError> {
        let target_file = file.target.unwrap_or_default();
        let inspect = file.inspect.unwrap_or_default();
        let debugger = file.debugger.unwrap_or_default();
        let output = file.output.unwrap_or_default();

        // A target given on the command line replaces the file's target as a whole.
        let (path, args, pid) = if cli.target.is_some() || cli.pid.is_some() {
            (cli.target, cli.args, cli.pid)
        } else {
            let args = if cli.args.is_empty() {
                target_file.args.unwrap_or_default()
            } else {
                cli.args
            };
            (target_file.path, args, target_file.pid)
        };
        let target = match (path, pid) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Conflict(
                    "a target path and a pid cannot both be given".to_string(),
                ))
            }
            (Some(path), None) => TargetSpec::Launch { path, args },
            (None, Some(_)) if !args.is_empty() => {
                return Err(ConfigError::Conflict(
                    "target arguments only apply when launching".to_string(),
                ))
            }
            (None, Some(pid)) => TargetSpec::Attach { pid },
            (None, None) => return Err(ConfigError::Missing("target")),
        };

        let marker = non_empty("marker", cli.marker.or(inspect.marker))?;
        let variable = non_empty("variable", cli.variable.or(inspect.variable))?;

        let formatter_entries = if cli.formatter.is_empty() {
            inspect.formatter.unwrap_or_default()
        } else {
            cli.formatter
        };
        let formatter = parse_formatter(formatter_entries)?;

        let command_timeout_ms = cli
            .command_timeout_ms
            .or(debugger.command_timeout_ms)
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS);
        if command_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "command_timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }

        let update = cli.update;
        let expect = cli.expect.or(output.expect);
        if update && expect.is_none() {
            return Err(ConfigError::Conflict(
                "--update needs an expected-output file".to_string(),
            ));
        }

        Ok(Self {
            target,
            marker,
            variable,
            formatter,
            frame_depth: cli
                .frame_depth
                .or(inspect.frame_depth)
                .unwrap_or(DEFAULT_FRAME_DEPTH),
            gdb_path: cli.gdb.or(debugger.gdb),
            command_timeout_ms,
            output: OutputConfig {
                format: cli.format.or(output.format).unwrap_or_default(),
                prefix: cli.prefix.or(output.prefix).unwrap_or_default(),
            },
            expect,
            update,
        })
    }

    pub fn plan(&self) -> InspectionPlan {
        InspectionPlan {
            target: self.target.clone(),
            formatter: self.formatter.clone(),
            marker: self.marker.clone(),
            variable: self.variable.clone(),
            frame_depth: self.frame_depth,
        }
    }
}

fn non_empty(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(ConfigError::InvalidValue {
            field,
            message: "must not be empty".to_string(),
        }),
        None => Err(ConfigError::Missing(field)),
    }
}

fn parse_formatter(entries: Vec<String>) -> Result<FormatterSource, ConfigError> {
    if entries.is_empty() {
        return Err(ConfigError::Missing("formatter"));
    }
    if entries.iter().any(|e| e == BUILTIN_FORMATTER) {
        if entries.len() > 1 {
            return Err(ConfigError::Conflict(format!(
                "\"{BUILTIN_FORMATTER}\" cannot be combined with formatter scripts"
            )));
        }
        return Ok(FormatterSource::Builtin);
    }

    let mut scripts = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = PathBuf::from(entry);
        if !path.is_file() {
            return Err(ConfigError::FormatterNotFound(path));
        }
        scripts.push(path);
    }
    Ok(FormatterSource::Scripts(scripts))
}
