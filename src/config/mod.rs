mod settings;

pub use settings::{
    ConfigError, ConfigOverrides, HarnessConfig, OutputConfig, OutputFormat, TomlConfig,
    BUILTIN_FORMATTER, DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_FRAME_DEPTH,
};
