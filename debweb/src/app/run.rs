//! Main run flow

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::deploy::lock::DeploymentLock;
use crate::deploy::orchestrator::{DeploymentOrchestrator, DeploymentOutcome};
use crate::deploy::prompt::Prompter;
use crate::errors::DeployError;
use crate::preflight;
use crate::services::certs::Certbot;
use crate::services::command::{CommandRunner, SystemRunner};
use crate::services::controller::SystemdNginx;
use crate::settings::{ApplicationSpec, SystemSpec};

/// Run a deployment against the live host.
///
/// Settings must already be validated. Preconditions are checked and the
/// project lock taken before the orchestrator touches anything. If
/// `shutdown_signal` resolves first the run is abandoned with
/// [`DeployError::Interrupted`].
pub async fn run(
    app: ApplicationSpec,
    system: SystemSpec,
    prompter: Arc<dyn Prompter>,
    shutdown_signal: impl Future<Output = ()> + Send,
) -> Result<DeploymentOutcome, DeployError> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new(system.command_timeout()));

    preflight::check_preconditions(runner.as_ref()).await?;

    let lock = DeploymentLock::acquire(&system.lock_dir(), &app.project_name).await?;
    info!("Holding {:?}", lock.path());

    let controller = Arc::new(SystemdNginx::new(runner.clone(), &system));
    let provisioner = Arc::new(Certbot::new(runner));
    let orchestrator = DeploymentOrchestrator::new(system, app, controller, provisioner, prompter);

    run_locked(lock, orchestrator.run(), shutdown_signal).await
}

/// Drive `work` while holding `lock`.
///
/// The lock is released however the run ends. On shutdown `work` is dropped
/// mid-flight, which kills any child process it is waiting on.
pub async fn run_locked<T>(
    lock: DeploymentLock,
    work: impl Future<Output = Result<T, DeployError>>,
    shutdown_signal: impl Future<Output = ()>,
) -> Result<T, DeployError> {
    let result = tokio::select! {
        result = work => result,
        _ = shutdown_signal => {
            warn!("Shutdown signal received, abandoning the run");
            Err(DeployError::Interrupted)
        }
    };
    drop(lock);
    result
}
