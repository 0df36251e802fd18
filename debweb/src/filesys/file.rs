//! File operations

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::DeployError;

/// A file wrapper with path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists. Dangling symlinks count as absent.
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Check if anything (including a dangling symlink) occupies the path
    pub async fn occupied(&self) -> bool {
        fs::symlink_metadata(&self.path).await.is_ok()
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, DeployError> {
        Ok(fs::read_to_string(&self.path).await?)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, DeployError> {
        let contents = self.read_string().await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// Write string to file, truncating whatever was there
    pub async fn write_string(&self, contents: &str) -> Result<(), std::io::Error> {
        let mut file = fs::File::create(&self.path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Sibling path used to stage a replacement: `.{name}.tmp`.
    /// The leading dot and the suffix keep sudo and nginx globs away from it.
    pub fn staging(&self) -> File {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        File::new(self.path.with_file_name(format!(".{}.tmp", name)))
    }

    /// Move this file over `target` in one step
    pub async fn rename_to(&self, target: &Path) -> Result<(), std::io::Error> {
        fs::rename(&self.path, target).await
    }

    /// Delete the file. A missing file is not an error.
    pub async fn delete(&self) -> Result<(), std::io::Error> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Point this path at `target` with a symlink, replacing any previous entry
    pub async fn symlink_to(&self, target: &Path) -> Result<(), std::io::Error> {
        self.delete().await?;
        #[cfg(unix)]
        {
            fs::symlink(target, &self.path).await
        }
        #[cfg(not(unix))]
        {
            fs::copy(target, &self.path).await.map(|_| ())
        }
    }

    /// Set file permissions on Unix. A no-op elsewhere.
    pub async fn set_mode(&self, mode: u32) -> Result<(), std::io::Error> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(mode)).await?;
        }
        #[cfg(not(unix))]
        let _ = mode;
        Ok(())
    }
}
