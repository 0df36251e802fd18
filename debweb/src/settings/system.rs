//! System settings (`environment.json`)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::logs::LogLevel;
use crate::settings::app::ApplicationSpec;
use crate::settings::ensure_not_blank;

/// Host paths and ambient settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemSpec {
    /// Directory holding systemd unit files
    #[serde(default)]
    pub systemd_path: String,

    /// nginx `sites-available` directory
    #[serde(default)]
    pub sites_available_nginx: String,

    /// nginx `sites-enabled` directory
    #[serde(default)]
    pub sites_enabled_nginx: String,

    /// sudoers drop-in directory
    #[serde(default)]
    pub sudoers_path: String,

    /// Directory containing `certbot-auto`
    #[serde(default)]
    pub letsencrypt_path: String,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Optional directory for a log file
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Upper bound for any external command
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Directory for per-project lock files
    #[serde(default = "default_lock_path")]
    pub lock_path: String,
}

fn default_command_timeout() -> u64 {
    600
}

fn default_lock_path() -> String {
    "/run/lock".to_string()
}

impl Default for SystemSpec {
    fn default() -> Self {
        Self {
            systemd_path: "/etc/systemd/system".to_string(),
            sites_available_nginx: "/etc/nginx/sites-available".to_string(),
            sites_enabled_nginx: "/etc/nginx/sites-enabled".to_string(),
            sudoers_path: "/etc/sudoers.d".to_string(),
            letsencrypt_path: String::new(),
            log_level: LogLevel::Info,
            log_dir: None,
            command_timeout_secs: default_command_timeout(),
            lock_path: default_lock_path(),
        }
    }
}

impl SystemSpec {
    /// Validate required fields and check every directory exists
    pub async fn check_configuration(&self, app: &ApplicationSpec) -> Result<(), DeployError> {
        ensure_not_blank("SystemdPath", &self.systemd_path)?;
        ensure_not_blank("SitesAvailableNginx", &self.sites_available_nginx)?;
        ensure_not_blank("SitesEnabledNginx", &self.sites_enabled_nginx)?;
        ensure_not_blank("SudoersPath", &self.sudoers_path)?;
        if app.use_letsencrypt && self.letsencrypt_path.trim().is_empty() {
            return Err(DeployError::InvalidConfiguration(
                "LetsencryptPath is not valid (app is using SSL but let's encrypt path is empty)"
                    .to_string(),
            ));
        }
        if self.command_timeout_secs == 0 {
            return Err(DeployError::InvalidConfiguration(
                "CommandTimeoutSecs must be greater than zero".to_string(),
            ));
        }

        let mut required = vec![
            &self.systemd_path,
            &self.sites_available_nginx,
            &self.sites_enabled_nginx,
            &self.sudoers_path,
        ];
        if app.use_letsencrypt {
            required.push(&self.letsencrypt_path);
        }

        for path in required {
            if !Dir::new(path).exists().await {
                return Err(DeployError::InvalidConfiguration(format!(
                    "{} does not exist",
                    path
                )));
            }
        }

        Ok(())
    }

    pub fn systemd_dir(&self) -> Dir {
        Dir::new(&self.systemd_path)
    }

    pub fn sites_available_dir(&self) -> Dir {
        Dir::new(&self.sites_available_nginx)
    }

    pub fn sites_enabled_dir(&self) -> Dir {
        Dir::new(&self.sites_enabled_nginx)
    }

    pub fn sudoers_dir(&self) -> Dir {
        Dir::new(&self.sudoers_path)
    }

    pub fn lock_dir(&self) -> Dir {
        Dir::new(&self.lock_path)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
