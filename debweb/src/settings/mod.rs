//! Application and system settings
//!
//! Both records are read from JSON files whose paths are handed in by the
//! caller, then validated before anything touches the system.

pub mod app;
pub mod system;

use std::path::Path;

use tracing::debug;

pub use app::ApplicationSpec;
pub use system::SystemSpec;

use crate::errors::DeployError;
use crate::filesys::file::File;

/// Load and validate both settings files
pub async fn load(
    app_path: &Path,
    system_path: &Path,
) -> Result<(ApplicationSpec, SystemSpec), DeployError> {
    let app = read_settings::<ApplicationSpec>(app_path).await?;
    let system = read_settings::<SystemSpec>(system_path).await?;

    app.check_configuration()?;
    system.check_configuration(&app).await?;

    debug!(
        "Loaded settings for project {} from {:?} and {:?}",
        app.project_name, app_path, system_path
    );
    Ok((app, system))
}

async fn read_settings<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DeployError> {
    let file = File::new(path);
    if !file.exists().await {
        return Err(DeployError::Precondition(format!(
            "{} could not be found",
            path.display()
        )));
    }

    file.read_json().await.map_err(|e| {
        DeployError::InvalidConfiguration(format!("{}: {}", path.display(), e))
    })
}

pub(crate) fn ensure_not_blank(field: &str, value: &str) -> Result<(), DeployError> {
    if value.trim().is_empty() {
        return Err(DeployError::InvalidConfiguration(format!("{} is empty", field)));
    }
    Ok(())
}
