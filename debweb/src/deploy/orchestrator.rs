//! Deployment orchestrator
//!
//! Drives one run: probe the host, then create, reconfigure or delete the
//! deployment. Creation writes all artifacts concurrently, stops at a review
//! checkpoint where the operator may roll back, then starts the service,
//! activates the site and, when asked for, moves the site to TLS.

use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::artifacts::{self, Artifact, ArtifactGenerator, ReverseProxyConfig, ServiceUnitConfig};
use crate::deploy::fsm::{DeploymentEvent, DeploymentFsm, DeploymentState, Phase};
use crate::deploy::prompt::Prompter;
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::services::certs::CertificateProvisioner;
use crate::services::controller::ServiceController;
use crate::settings::{ApplicationSpec, SystemSpec};

/// Operator choice when a deployment already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingChoice {
    Abort,
    Reconfigure,
    Delete,
}

impl ExistingChoice {
    const ALL: [ExistingChoice; 3] = [
        ExistingChoice::Abort,
        ExistingChoice::Reconfigure,
        ExistingChoice::Delete,
    ];

    fn label(&self) -> &'static str {
        match self {
            ExistingChoice::Abort => "Abort (leave everything as is)",
            ExistingChoice::Reconfigure => "Reconfigure (rewrite and restart)",
            ExistingChoice::Delete => "Delete (stop and remove everything)",
        }
    }

    /// Unrecognised answers abort
    fn from_answer(answer: Option<usize>) -> Self {
        answer
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or(ExistingChoice::Abort)
    }
}

/// TLS result of a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsStatus {
    /// TLS was not requested
    Disabled,
    /// Serving over HTTPS
    Enabled,
    /// TLS was requested but failed; the site is live over HTTP
    Failed(String),
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    /// Existing deployment left untouched
    Aborted,
    /// Deployment removed
    Deleted,
    /// Artifacts removed at the review checkpoint
    RolledBack,
    /// Service running and site active
    Deployed { tls: TlsStatus },
}

/// Orchestrates a single deployment run
pub struct DeploymentOrchestrator {
    system: SystemSpec,
    app: ApplicationSpec,
    controller: Arc<dyn ServiceController>,
    provisioner: Arc<dyn CertificateProvisioner>,
    prompter: Arc<dyn Prompter>,
    fsm: RwLock<DeploymentFsm>,
}

impl DeploymentOrchestrator {
    /// Create an orchestrator over validated settings
    pub fn new(
        system: SystemSpec,
        app: ApplicationSpec,
        controller: Arc<dyn ServiceController>,
        provisioner: Arc<dyn CertificateProvisioner>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            system,
            app,
            controller,
            provisioner,
            prompter,
            fsm: RwLock::new(DeploymentFsm::new()),
        }
    }

    /// Current phase
    pub async fn phase(&self) -> Phase {
        self.fsm.read().await.phase()
    }

    /// Phases visited so far
    pub async fn history(&self) -> Vec<Phase> {
        self.fsm.read().await.history().to_vec()
    }

    async fn transition(&self, event: DeploymentEvent) -> Result<(), DeployError> {
        let mut fsm = self.fsm.write().await;
        let phase = fsm.process(event).map_err(DeployError::InvalidTransition)?;
        debug!("{} -> {:?}", self.app.project_name, phase);
        Ok(())
    }

    /// Run the whole lifecycle
    pub async fn run(&self) -> Result<DeploymentOutcome, DeployError> {
        info!("Managing deployment: {}", self.app.project_name);

        match self.run_phases().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Deployment of {} failed: {}", self.app.project_name, e);
                let mut fsm = self.fsm.write().await;
                if !fsm.phase().is_terminal() {
                    let _ = fsm.process(DeploymentEvent::Fail(e.to_string()));
                }
                Err(e)
            }
        }
    }

    async fn run_phases(&self) -> Result<DeploymentOutcome, DeployError> {
        let state = self.probe().await;
        self.transition(DeploymentEvent::Probed(state)).await?;

        if state == DeploymentState::Absent {
            return self.create().await;
        }

        let options: Vec<&str> = ExistingChoice::ALL.iter().map(|c| c.label()).collect();
        let answer = self.prompter.choose(
            &format!(
                "{} is already deployed. What do you want to do?",
                self.app.project_name
            ),
            &options,
            0,
        )?;

        match ExistingChoice::from_answer(answer) {
            ExistingChoice::Abort => {
                info!("Leaving {} untouched", self.app.project_name);
                self.transition(DeploymentEvent::Abort).await?;
                Ok(DeploymentOutcome::Aborted)
            }
            ExistingChoice::Reconfigure => {
                self.transition(DeploymentEvent::Reconfigure).await?;
                self.reconfigure().await?;
                self.transition(DeploymentEvent::Reconfigured).await?;
                self.create().await
            }
            ExistingChoice::Delete => {
                self.transition(DeploymentEvent::Delete).await?;
                self.delete().await?;
                self.transition(DeploymentEvent::Deleted).await?;
                Ok(DeploymentOutcome::Deleted)
            }
        }
    }

    async fn create(&self) -> Result<DeploymentOutcome, DeployError> {
        let written = self.write_artifacts().await?;
        self.transition(DeploymentEvent::Written).await?;

        for artifact in &written {
            self.prompter.show(artifact);
        }

        if self
            .prompter
            .confirm("Roll back these files instead of starting?", false)?
        {
            self.rollback(&written).await?;
            self.transition(DeploymentEvent::RollBack).await?;
            return Ok(DeploymentOutcome::RolledBack);
        }
        self.transition(DeploymentEvent::Keep).await?;

        self.start_services().await?;
        self.transition(DeploymentEvent::Started).await?;

        if !self.app.use_letsencrypt {
            return Ok(DeploymentOutcome::Deployed {
                tls: TlsStatus::Disabled,
            });
        }

        self.transition(DeploymentEvent::SecureTls).await?;
        match self.secure_tls().await {
            Ok(()) => {
                self.transition(DeploymentEvent::TlsSecured).await?;
                Ok(DeploymentOutcome::Deployed {
                    tls: TlsStatus::Enabled,
                })
            }
            Err(e) => {
                warn!(
                    "TLS setup failed, {} stays live over HTTP: {}",
                    self.app.project_name, e
                );
                self.transition(DeploymentEvent::TlsFailed(e.to_string()))
                    .await?;
                Ok(DeploymentOutcome::Deployed {
                    tls: TlsStatus::Failed(e.to_string()),
                })
            }
        }
    }

    /// Present if the service unit file exists
    pub async fn probe(&self) -> DeploymentState {
        let unit = File::new(ServiceUnitConfig.path(&self.system, &self.app));
        let state = if unit.exists().await {
            DeploymentState::Present
        } else {
            DeploymentState::Absent
        };
        debug!("Probed {:?}: {:?}", unit.path(), state);
        state
    }

    /// Render and write every artifact concurrently.
    ///
    /// Any failed write fails the batch; files written by the other writes
    /// are left in place.
    pub async fn write_artifacts(&self) -> Result<Vec<Artifact>, DeployError> {
        let rendered: Vec<Artifact> = artifacts::generators()
            .iter()
            .map(|generator| generator.render(&self.system, &self.app))
            .collect();

        try_join_all(rendered.iter().map(|artifact| async move {
            info!("Writing {} to {:?}", artifact.kind, artifact.path);
            artifact.write().await
        }))
        .await?;

        Ok(rendered)
    }

    /// Remove just-written artifacts. Nothing was started, so nothing is reloaded.
    pub async fn rollback(&self, written: &[Artifact]) -> Result<(), DeployError> {
        info!("Rolling back {} artifacts", written.len());
        artifacts::remove_all(written.iter().map(|artifact| artifact.path.as_path())).await
    }

    /// Take the running deployment offline ahead of a rewrite
    pub async fn reconfigure(&self) -> Result<(), DeployError> {
        let name = self.app.service_name();
        info!("Taking {} offline for reconfiguration", name);
        self.controller.disable_site(name).await?;
        self.controller.reload_proxy().await?;
        self.controller.stop(name).await?;
        Ok(())
    }

    /// Stop, deactivate, remove every artifact, reload.
    ///
    /// Safe to repeat and safe on a project that was never deployed.
    pub async fn delete(&self) -> Result<(), DeployError> {
        let name = self.app.service_name();
        let unit_present = self.probe().await == DeploymentState::Present;

        if unit_present {
            self.controller.stop(name).await?;
            self.controller.disable(name).await?;
        }
        self.controller.disable_site(name).await?;

        let paths = artifacts::artifact_paths(&self.system, &self.app);
        info!("Removing {:?}", paths);
        artifacts::remove_all(paths.iter().map(|path| path.as_path())).await?;

        if unit_present {
            self.controller.daemon_reload().await?;
        }
        self.controller.reload_proxy().await?;
        info!("Deleted deployment {}", name);
        Ok(())
    }

    /// Start the service first so the proxy never routes to nothing
    pub async fn start_services(&self) -> Result<(), DeployError> {
        let name = self.app.service_name();
        self.controller.daemon_reload().await?;
        self.controller.start(name).await?;
        self.controller.enable(name).await?;
        self.controller.enable_site(name).await?;
        self.controller.reload_proxy().await?;
        info!("{} is live over HTTP", name);
        Ok(())
    }

    /// Issue a certificate and switch the site to TLS.
    ///
    /// On a failed reload the plain site config is restored so the next
    /// reload keeps serving HTTP.
    pub async fn secure_tls(&self) -> Result<(), DeployError> {
        self.provisioner
            .issue_certificate(&self.system, &self.app)
            .await?;

        let paths = self.provisioner.tls_paths(self.app.primary_domain());
        for path in [&paths.certificate, &paths.key] {
            if !File::new(path).exists().await {
                return Err(DeployError::Certificate(format!(
                    "{} is missing after issuance",
                    path.display()
                )));
            }
        }

        let tls_site = ReverseProxyConfig::tls(paths).render(&self.system, &self.app);
        tls_site.write().await?;

        if let Err(e) = self.controller.reload_proxy().await {
            warn!("Proxy rejected TLS config, restoring plain HTTP site");
            let plain_site = ReverseProxyConfig::plain().render(&self.system, &self.app);
            if let Err(restore) = plain_site.write().await {
                error!("Failed to restore {:?}: {}", plain_site.path, restore);
            }
            return Err(e);
        }

        info!("{} is live over HTTPS", self.app.project_name);
        Ok(())
    }
}
