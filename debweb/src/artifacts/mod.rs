//! Configuration artifacts
//!
//! Each artifact is one file on the host: the nginx site, the systemd unit and
//! the sudoers drop-in. A generator renders the full text from the settings;
//! writing always replaces the previous file wholesale.

pub mod privilege;
pub mod proxy;
pub mod unit;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::settings::{ApplicationSpec, SystemSpec};

pub use privilege::PrivilegeConfig;
pub use proxy::{ReverseProxyConfig, TlsPaths};
pub use unit::ServiceUnitConfig;

/// Kind of artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    ReverseProxy,
    ServiceUnit,
    Privilege,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::ReverseProxy => write!(f, "nginx site"),
            ArtifactKind::ServiceUnit => write!(f, "systemd unit"),
            ArtifactKind::Privilege => write!(f, "sudoers rules"),
        }
    }
}

/// A rendered artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub content: String,
}

impl Artifact {
    /// Write the artifact, replacing any previous version.
    ///
    /// Content is staged next to the target and renamed over it, so a failed
    /// write leaves the previous version intact.
    pub async fn write(&self) -> Result<(), DeployError> {
        let staged = File::new(&self.path).staging();
        let result = async {
            staged.write_string(&self.content).await?;
            if self.kind == ArtifactKind::Privilege {
                // sudo refuses drop-ins that are group or world writable
                staged.set_mode(0o440).await?;
            }
            staged.rename_to(&self.path).await
        }
        .await;

        if let Err(source) = result {
            if let Err(e) = staged.delete().await {
                tracing::debug!("Leaving {:?}: {}", staged.path(), e);
            }
            return Err(DeployError::ArtifactWrite {
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }
}

/// Remove an artifact path. Missing files are fine.
pub async fn remove(path: &Path) -> Result<(), DeployError> {
    File::new(path)
        .delete()
        .await
        .map_err(|source| DeployError::ArtifactRemove {
            path: path.to_path_buf(),
            source,
        })
}

/// Remove every path, attempting all of them before reporting the first failure
pub async fn remove_all<'a, I>(paths: I) -> Result<(), DeployError>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut first_error = None;
    for path in paths {
        if let Err(e) = remove(path).await {
            tracing::error!("{}", e);
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Renders one artifact from validated settings
pub trait ArtifactGenerator: Send + Sync {
    /// Kind of artifact this generator produces
    fn kind(&self) -> ArtifactKind;

    /// Target path on the host
    fn path(&self, system: &SystemSpec, app: &ApplicationSpec) -> PathBuf;

    /// Full file content
    fn content(&self, system: &SystemSpec, app: &ApplicationSpec) -> String;

    fn render(&self, system: &SystemSpec, app: &ApplicationSpec) -> Artifact {
        Artifact {
            kind: self.kind(),
            path: self.path(system, app),
            content: self.content(system, app),
        }
    }
}

/// Every generator for a deployment, in review order
pub fn generators() -> Vec<Box<dyn ArtifactGenerator>> {
    vec![
        Box::new(ReverseProxyConfig::plain()),
        Box::new(ServiceUnitConfig),
        Box::new(PrivilegeConfig),
    ]
}

/// Target paths of every artifact, in review order
pub fn artifact_paths(system: &SystemSpec, app: &ApplicationSpec) -> Vec<PathBuf> {
    generators()
        .iter()
        .map(|generator| generator.path(system, app))
        .collect()
}

/// Comment line stamped at the top of every generated file
pub(crate) fn generated_header() -> String {
    format!(
        "#### AUTO GENERATED BY debweb - {} ####",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}
