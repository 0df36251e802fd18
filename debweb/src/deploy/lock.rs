//! Per-project run lock

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::errors::DeployError;
use crate::filesys::dir::Dir;

/// Exclusive lock on a project name, released on drop
#[derive(Debug)]
pub struct DeploymentLock {
    path: PathBuf,
}

impl DeploymentLock {
    /// Create `{dir}/debweb-{project}.lock`, failing if another run holds it
    pub async fn acquire(dir: &Dir, project: &str) -> Result<Self, DeployError> {
        let path = dir.path().join(format!("debweb-{}.lock", project));

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(DeployError::Precondition(format!(
                    "another run is managing {} (remove {} if it is stale)",
                    project,
                    path.display()
                )));
            }
            Err(e) => {
                return Err(DeployError::Precondition(format!(
                    "cannot create lock file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        file.write_all(format!("{}\n", std::process::id()).as_bytes())
            .await?;
        debug!("Acquired lock {:?}", path);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DeploymentLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to release lock {:?}: {}", self.path, e);
        }
    }
}
