//! Finite state machine for a deployment run

use serde::{Deserialize, Serialize};

/// Whether a deployment exists on the host, derived from the unit file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    Absent,
    Present,
}

/// Phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Looking for an existing deployment
    Probing,

    /// A deployment exists, waiting for the operator
    Present,

    /// Taking the existing deployment offline before rewriting it
    Reconfiguring,

    /// Tearing the deployment down
    Deleting,

    /// Writing artifacts
    Writing,

    /// Artifacts written, waiting for review
    Reviewing,

    /// Starting the service and activating the site
    Starting,

    /// Serving over plain HTTP
    Live,

    /// Provisioning a certificate
    SecuringTls,

    /// Serving over HTTPS
    Secured,

    /// Operator rolled the artifacts back
    RolledBack,

    /// Operator left the existing deployment alone
    Aborted,

    /// Deployment removed
    Deleted,

    /// A step failed
    Failed,
}

impl Phase {
    /// No further transitions are expected
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Phase::Live
                | Phase::Secured
                | Phase::RolledBack
                | Phase::Aborted
                | Phase::Deleted
                | Phase::Failed
        )
    }
}

/// Run event
#[derive(Debug, Clone)]
pub enum DeploymentEvent {
    /// Probe finished
    Probed(DeploymentState),

    /// Operator keeps the existing deployment
    Abort,

    /// Operator asked to rewrite the existing deployment
    Reconfigure,

    /// Existing deployment is offline
    Reconfigured,

    /// Operator asked to remove the deployment
    Delete,

    /// Deployment removed
    Deleted,

    /// All artifacts written
    Written,

    /// Operator rolled back at review
    RollBack,

    /// Operator kept the artifacts at review
    Keep,

    /// Service running and site active
    Started,

    /// Begin certificate provisioning
    SecureTls,

    /// Certificate installed
    TlsSecured,

    /// Certificate provisioning failed; HTTP stays up
    TlsFailed(String),

    /// A step failed
    Fail(String),
}

/// Deployment FSM
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    phase: Phase,
    error: Option<String>,
    history: Vec<Phase>,
}

impl DeploymentFsm {
    /// Create a new FSM in the probing phase
    pub fn new() -> Self {
        Self {
            phase: Phase::Probing,
            error: None,
            history: vec![Phase::Probing],
        }
    }

    /// Get current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Every phase visited, oldest first
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Process an event and transition phase
    pub fn process(&mut self, event: DeploymentEvent) -> Result<Phase, String> {
        let new_phase = match (&self.phase, &event) {
            // From Probing
            (Phase::Probing, DeploymentEvent::Probed(DeploymentState::Absent)) => Phase::Writing,
            (Phase::Probing, DeploymentEvent::Probed(DeploymentState::Present)) => Phase::Present,

            // From Present
            (Phase::Present, DeploymentEvent::Abort) => Phase::Aborted,
            (Phase::Present, DeploymentEvent::Reconfigure) => Phase::Reconfiguring,
            (Phase::Present, DeploymentEvent::Delete) => Phase::Deleting,

            (Phase::Reconfiguring, DeploymentEvent::Reconfigured) => Phase::Writing,
            (Phase::Deleting, DeploymentEvent::Deleted) => Phase::Deleted,

            (Phase::Writing, DeploymentEvent::Written) => Phase::Reviewing,

            // From Reviewing
            (Phase::Reviewing, DeploymentEvent::RollBack) => Phase::RolledBack,
            (Phase::Reviewing, DeploymentEvent::Keep) => Phase::Starting,

            (Phase::Starting, DeploymentEvent::Started) => Phase::Live,
            (Phase::Live, DeploymentEvent::SecureTls) => Phase::SecuringTls,

            // TLS is additive; a failure falls back to the live HTTP site
            (Phase::SecuringTls, DeploymentEvent::TlsSecured) => Phase::Secured,
            (Phase::SecuringTls, DeploymentEvent::TlsFailed(err)) => {
                self.error = Some(err.clone());
                Phase::Live
            }

            (phase, DeploymentEvent::Fail(err)) if !phase.is_terminal() => {
                self.error = Some(err.clone());
                Phase::Failed
            }

            // Invalid transitions
            (phase, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", phase, event));
            }
        };

        self.phase = new_phase;
        self.history.push(new_phase);
        Ok(new_phase)
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new()
    }
}
