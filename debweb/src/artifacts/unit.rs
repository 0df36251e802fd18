//! systemd service unit

use std::path::PathBuf;

use crate::artifacts::{generated_header, ArtifactGenerator, ArtifactKind};
use crate::settings::{ApplicationSpec, SystemSpec};

/// `{SystemdPath}/{ProjectName}.service`
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceUnitConfig;

impl ArtifactGenerator for ServiceUnitConfig {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::ServiceUnit
    }

    fn path(&self, system: &SystemSpec, app: &ApplicationSpec) -> PathBuf {
        system
            .systemd_dir()
            .path()
            .join(format!("{}.service", app.service_name()))
    }

    fn content(&self, _system: &SystemSpec, app: &ApplicationSpec) -> String {
        format!(
            r#"{header}
[Unit]
Description={name} web application (managed by debweb)
After=network.target

[Service]
Type=simple
User={user}
WorkingDirectory={dir}
ExecStart={command}
Restart=always
RestartSec=10
SyslogIdentifier={name}

[Install]
WantedBy=multi-user.target
"#,
            header = generated_header(),
            name = app.project_name,
            user = app.user_name,
            dir = app.project_path,
            command = app.project_command,
        )
    }
}
