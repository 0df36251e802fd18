//! Let's Encrypt certificates via certbot
//!
//! Certificates land under `/etc/letsencrypt/live/{primary domain}`. The path
//! helpers are pure; nothing guarantees the files exist until issuance has
//! succeeded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::artifacts::TlsPaths;
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::services::command::{CommandRunner, CommandSpec};
use crate::settings::{ApplicationSpec, SystemSpec};

/// Where certbot stores live certificates
pub const LETSENCRYPT_LIVE_DIR: &str = "/etc/letsencrypt/live";

/// Where DH parameters and the session ticket key live
pub const NGINX_SSL_DIR: &str = "/etc/nginx/ssl";

const RSA_KEY_SIZE: &str = "4096";
const DH_PARAM_BITS: &str = "4096";
const TICKET_KEY_BYTES: &str = "48";

/// Full certificate chain for `domain`
pub fn cert_path(domain: &str) -> PathBuf {
    Path::new(LETSENCRYPT_LIVE_DIR)
        .join(domain)
        .join("fullchain.pem")
}

/// Private key for `domain`
pub fn key_path(domain: &str) -> PathBuf {
    Path::new(LETSENCRYPT_LIVE_DIR).join(domain).join("privkey.pem")
}

/// Obtains TLS certificates for an application
#[async_trait]
pub trait CertificateProvisioner: Send + Sync {
    /// Obtain or renew a certificate covering every domain of `app`
    async fn issue_certificate(
        &self,
        system: &SystemSpec,
        app: &ApplicationSpec,
    ) -> Result<(), DeployError>;

    /// Files the TLS proxy configuration should reference for `domain`
    fn tls_paths(&self, domain: &str) -> TlsPaths;
}

/// certbot in webroot mode, plus openssl for DH parameters
pub struct Certbot {
    runner: Arc<dyn CommandRunner>,
    ssl_dir: Dir,
}

impl Certbot {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            ssl_dir: Dir::new(NGINX_SSL_DIR),
        }
    }

    /// Use a different directory for DH parameters and the ticket key
    pub fn with_ssl_dir(mut self, ssl_dir: impl Into<PathBuf>) -> Self {
        self.ssl_dir = Dir::new(ssl_dir);
        self
    }

    fn dhparam_file(&self) -> File {
        self.ssl_dir.file("dhparams.pem")
    }

    fn ticket_key_file(&self) -> File {
        self.ssl_dir.file("dwticket.key")
    }

    /// Generate the ticket key and DH parameters if they are missing
    pub async fn ensure_dh_params(&self) -> Result<(), DeployError> {
        self.ssl_dir.create().await?;

        let ticket = self.ticket_key_file();
        if !ticket.exists().await {
            info!("Generating session ticket key at {:?}", ticket.path());
            let cmd = CommandSpec::new("openssl")
                .args(["rand", TICKET_KEY_BYTES, "-out"])
                .arg(ticket.path().display().to_string());
            self.runner.run(&cmd).await?;
        }

        let dhparam = self.dhparam_file();
        if !dhparam.exists().await {
            info!(
                "Generating {}-bit DH parameters at {:?}, this takes a while",
                DH_PARAM_BITS,
                dhparam.path()
            );
            let cmd = CommandSpec::new("openssl")
                .args(["dhparam", "-out"])
                .arg(dhparam.path().display().to_string())
                .arg(DH_PARAM_BITS);
            self.runner.run(&cmd).await?;
        }

        Ok(())
    }
}

/// certbot invocation for `app`
pub fn certbot_command(system: &SystemSpec, app: &ApplicationSpec) -> CommandSpec {
    let mut cmd = CommandSpec::new(
        Path::new(&system.letsencrypt_path)
            .join("certbot-auto")
            .display()
            .to_string(),
    )
    .args(["certonly", "-n", "--agree-tos", "--email"])
    .arg(&app.user_email)
    .args(["--rsa-key-size", RSA_KEY_SIZE, "--webroot", "--webroot-path"])
    .arg(&app.project_path);

    for domain in &app.dns {
        cmd = cmd.arg("-d").arg(domain);
    }
    cmd
}

#[async_trait]
impl CertificateProvisioner for Certbot {
    async fn issue_certificate(
        &self,
        system: &SystemSpec,
        app: &ApplicationSpec,
    ) -> Result<(), DeployError> {
        self.ensure_dh_params().await?;

        info!("Requesting certificate for {}", app.dns.join(", "));
        self.runner
            .run(&certbot_command(system, app))
            .await
            .map_err(|e| DeployError::Certificate(e.to_string()))?;
        Ok(())
    }

    fn tls_paths(&self, domain: &str) -> TlsPaths {
        TlsPaths {
            certificate: cert_path(domain),
            key: key_path(domain),
            dhparam: self.dhparam_file().path().to_path_buf(),
            session_ticket_key: self.ticket_key_file().path().to_path_buf(),
        }
    }
}
