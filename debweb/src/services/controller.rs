//! systemd and nginx control

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::services::command::{CommandRunner, CommandSpec};
use crate::settings::SystemSpec;

/// Service manager and reverse proxy operations
#[async_trait]
pub trait ServiceController: Send + Sync {
    /// Make the service manager re-read unit files
    async fn daemon_reload(&self) -> Result<(), DeployError>;

    async fn start(&self, name: &str) -> Result<(), DeployError>;

    async fn stop(&self, name: &str) -> Result<(), DeployError>;

    /// Start on boot
    async fn enable(&self, name: &str) -> Result<(), DeployError>;

    async fn disable(&self, name: &str) -> Result<(), DeployError>;

    /// Activate the site in the proxy's enabled directory
    async fn enable_site(&self, name: &str) -> Result<(), DeployError>;

    /// Deactivate the site. An inactive site is not an error.
    async fn disable_site(&self, name: &str) -> Result<(), DeployError>;

    async fn reload_proxy(&self) -> Result<(), DeployError>;
}

/// Controller for systemd plus a Debian-style nginx layout
pub struct SystemdNginx {
    runner: Arc<dyn CommandRunner>,
    sites_available: Dir,
    sites_enabled: Dir,
}

impl SystemdNginx {
    pub fn new(runner: Arc<dyn CommandRunner>, system: &SystemSpec) -> Self {
        Self {
            runner,
            sites_available: system.sites_available_dir(),
            sites_enabled: system.sites_enabled_dir(),
        }
    }

    async fn systemctl(&self, args: &[&str]) -> Result<(), DeployError> {
        let cmd = CommandSpec::new("systemctl").args(args.iter().copied());
        info!("{}", cmd);
        self.runner.run(&cmd).await?;
        Ok(())
    }

    fn site_link(&self, name: &str) -> File {
        self.sites_enabled.file(name)
    }

    fn site_config(&self, name: &str) -> PathBuf {
        self.sites_available.path().join(name)
    }
}

#[async_trait]
impl ServiceController for SystemdNginx {
    async fn daemon_reload(&self) -> Result<(), DeployError> {
        self.systemctl(&["daemon-reload"]).await
    }

    async fn start(&self, name: &str) -> Result<(), DeployError> {
        self.systemctl(&["start", name]).await
    }

    async fn stop(&self, name: &str) -> Result<(), DeployError> {
        self.systemctl(&["stop", name]).await
    }

    async fn enable(&self, name: &str) -> Result<(), DeployError> {
        self.systemctl(&["enable", name]).await
    }

    async fn disable(&self, name: &str) -> Result<(), DeployError> {
        self.systemctl(&["disable", name]).await
    }

    async fn enable_site(&self, name: &str) -> Result<(), DeployError> {
        let config = self.site_config(name);
        let link = self.site_link(name);
        if !File::new(&config).exists().await {
            return Err(DeployError::ArtifactWrite {
                path: link.path().to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("site config {} does not exist", config.display()),
                ),
            });
        }

        info!("Linking {:?} -> {:?}", link.path(), config);
        link.symlink_to(&config)
            .await
            .map_err(|source| DeployError::ArtifactWrite {
                path: link.path().to_path_buf(),
                source,
            })
    }

    async fn disable_site(&self, name: &str) -> Result<(), DeployError> {
        let link = self.site_link(name);
        info!("Removing {:?}", link.path());
        link.delete()
            .await
            .map_err(|source| DeployError::ArtifactRemove {
                path: link.path().to_path_buf(),
                source,
            })
    }

    async fn reload_proxy(&self) -> Result<(), DeployError> {
        self.systemctl(&["reload", "nginx"]).await
    }
}
