//! Application settings (`application.json`)

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::settings::ensure_not_blank;

/// The application being deployed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApplicationSpec {
    /// Unique name of the deployment; also the service and site name
    #[serde(default)]
    pub project_name: String,

    /// Working directory and ACME webroot
    #[serde(default)]
    pub project_path: String,

    /// Command that starts the application
    #[serde(default, alias = "ProjetCommand")]
    pub project_command: String,

    /// OS user the service runs as
    #[serde(default)]
    pub user_name: String,

    /// Contact address for Let's Encrypt
    #[serde(default)]
    pub user_email: String,

    /// Request a certificate and serve over TLS
    #[serde(default)]
    pub use_letsencrypt: bool,

    /// Domains served by the application. The first one is the primary domain.
    #[serde(default)]
    pub dns: Vec<String>,

    /// Upstream the reverse proxy forwards to
    #[serde(default)]
    pub proxy_pass: String,
}

impl ApplicationSpec {
    /// Validate required fields
    pub fn check_configuration(&self) -> Result<(), DeployError> {
        ensure_not_blank("ProjectPath", &self.project_path)?;
        ensure_not_blank("ProjectName", &self.project_name)?;
        ensure_not_blank("UserName", &self.user_name)?;
        ensure_not_blank("ProjectCommand", &self.project_command)?;
        ensure_not_blank("ProxyPass", &self.proxy_pass)?;

        if !is_valid_project_name(&self.project_name) {
            return Err(DeployError::InvalidConfiguration(format!(
                "ProjectName is not valid ({:?} may only use letters, digits, '_' and '-', and must not start with '-')",
                self.project_name
            )));
        }

        if self.use_letsencrypt && self.user_email.trim().is_empty() {
            return Err(DeployError::InvalidConfiguration(
                "UserEmail is not valid (required when UseLetsencrypt is set)".to_string(),
            ));
        }

        if self.dns.is_empty() {
            return Err(DeployError::InvalidConfiguration("Dns is empty".to_string()));
        }
        if self.dns.iter().any(|d| d.trim().is_empty()) {
            return Err(DeployError::InvalidConfiguration(
                "Dns is not valid (contains a blank entry)".to_string(),
            ));
        }

        Ok(())
    }

    /// Domain the certificate is stored under
    pub fn primary_domain(&self) -> &str {
        self.dns.first().map(String::as_str).unwrap_or_default()
    }

    /// systemd unit name
    pub fn service_name(&self) -> &str {
        &self.project_name
    }
}

/// ProjectName is a unit name, a sudoers file name and a sudoers command
/// argument. sudo skips drop-ins containing '.', and ',' or ':' break the rule.
fn is_valid_project_name(name: &str) -> bool {
    !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
