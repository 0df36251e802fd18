//! sudoers drop-in letting operators control the service

use std::path::PathBuf;

use crate::artifacts::{generated_header, ArtifactGenerator, ArtifactKind};
use crate::settings::{ApplicationSpec, SystemSpec};

/// `{SudoersPath}/{ProjectName}`
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivilegeConfig;

impl ArtifactGenerator for PrivilegeConfig {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Privilege
    }

    fn path(&self, system: &SystemSpec, app: &ApplicationSpec) -> PathBuf {
        system.sudoers_dir().path().join(&app.project_name)
    }

    fn content(&self, _system: &SystemSpec, app: &ApplicationSpec) -> String {
        let mut out = generated_header();
        out.push('\n');
        for action in ["start", "stop", "restart"] {
            out.push_str(&format!(
                "%sudo ALL= NOPASSWD: /bin/systemctl {} {}\n",
                action,
                app.service_name()
            ));
        }
        out
    }
}
