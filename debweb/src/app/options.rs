//! Run options

use std::collections::HashMap;
use std::path::PathBuf;

use crate::logs::LogLevel;

/// Options for one invocation
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Path to `application.json`
    pub app_config: PathBuf,

    /// Path to `environment.json`
    pub system_config: PathBuf,

    /// Overrides the log level from `environment.json`
    pub log_level: Option<LogLevel>,

    /// Emit JSON log lines on stderr
    pub json_logs: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            app_config: PathBuf::from("application.json"),
            system_config: PathBuf::from("environment.json"),
            log_level: None,
            json_logs: false,
        }
    }
}

impl RunOptions {
    /// Build options from parsed `--key=value` arguments
    pub fn from_args(cli_args: &HashMap<String, String>) -> Result<Self, String> {
        let defaults = Self::default();
        let log_level = cli_args
            .get("log-level")
            .map(|level| level.parse::<LogLevel>())
            .transpose()?;

        Ok(Self {
            app_config: cli_args
                .get("app")
                .map(PathBuf::from)
                .unwrap_or(defaults.app_config),
            system_config: cli_args
                .get("env")
                .map(PathBuf::from)
                .unwrap_or(defaults.system_config),
            log_level,
            json_logs: cli_args.contains_key("json-logs"),
        })
    }
}
