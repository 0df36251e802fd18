//! Orchestrator tests against a temporary host layout

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use debweb::artifacts::{artifact_paths, TlsPaths};
use debweb::deploy::fsm::Phase;
use debweb::deploy::orchestrator::{DeploymentOrchestrator, DeploymentOutcome, TlsStatus};
use debweb::deploy::prompt::ScriptedPrompter;
use debweb::errors::DeployError;
use debweb::services::certs::CertificateProvisioner;
use debweb::services::controller::ServiceController;
use debweb::settings::{ApplicationSpec, SystemSpec};

const ABORT: Option<usize> = Some(0);
const RECONFIGURE: Option<usize> = Some(1);
const DELETE: Option<usize> = Some(2);

#[derive(Default)]
struct FakeController {
    calls: Mutex<Vec<String>>,
    fail_reload_after: Mutex<Option<usize>>,
}

impl FakeController {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// Let `n` reloads succeed, fail every one after that
    fn fail_reload_after(&self, n: usize) {
        *self.fail_reload_after.lock().unwrap() = Some(n);
    }
}

#[async_trait]
impl ServiceController for FakeController {
    async fn daemon_reload(&self) -> Result<(), DeployError> {
        self.record("daemon-reload".to_string());
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<(), DeployError> {
        self.record(format!("start {}", name));
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<(), DeployError> {
        self.record(format!("stop {}", name));
        Ok(())
    }

    async fn enable(&self, name: &str) -> Result<(), DeployError> {
        self.record(format!("enable {}", name));
        Ok(())
    }

    async fn disable(&self, name: &str) -> Result<(), DeployError> {
        self.record(format!("disable {}", name));
        Ok(())
    }

    async fn enable_site(&self, name: &str) -> Result<(), DeployError> {
        self.record(format!("enable-site {}", name));
        Ok(())
    }

    async fn disable_site(&self, name: &str) -> Result<(), DeployError> {
        self.record(format!("disable-site {}", name));
        Ok(())
    }

    async fn reload_proxy(&self) -> Result<(), DeployError> {
        let reloads = self
            .calls()
            .iter()
            .filter(|c| c.as_str() == "reload-proxy")
            .count();
        self.record("reload-proxy".to_string());
        match *self.fail_reload_after.lock().unwrap() {
            Some(n) if reloads >= n => Err(DeployError::Command {
                command: "systemctl reload nginx".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "nginx: configuration file test failed".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

struct FakeProvisioner {
    live_dir: PathBuf,
    succeed: bool,
    issued: Mutex<Vec<Vec<String>>>,
    obstruct: Mutex<Option<PathBuf>>,
}

impl FakeProvisioner {
    fn new(live_dir: PathBuf, succeed: bool) -> Self {
        Self {
            live_dir,
            succeed,
            issued: Mutex::new(Vec::new()),
            obstruct: Mutex::new(None),
        }
    }

    /// Put a directory at `path` once the certificate is issued
    fn obstruct_after_issue(&self, path: PathBuf) {
        *self.obstruct.lock().unwrap() = Some(path);
    }

    fn issued(&self) -> Vec<Vec<String>> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl CertificateProvisioner for FakeProvisioner {
    async fn issue_certificate(
        &self,
        _system: &SystemSpec,
        app: &ApplicationSpec,
    ) -> Result<(), DeployError> {
        self.issued.lock().unwrap().push(app.dns.clone());
        if !self.succeed {
            return Err(DeployError::Certificate("too many requests".to_string()));
        }
        let paths = self.tls_paths(app.primary_domain());
        std::fs::create_dir_all(paths.certificate.parent().unwrap())?;
        std::fs::write(&paths.certificate, "cert")?;
        std::fs::write(&paths.key, "key")?;
        if let Some(path) = self.obstruct.lock().unwrap().as_ref() {
            std::fs::create_dir_all(path)?;
        }
        Ok(())
    }

    fn tls_paths(&self, domain: &str) -> TlsPaths {
        TlsPaths {
            certificate: self.live_dir.join(domain).join("fullchain.pem"),
            key: self.live_dir.join(domain).join("privkey.pem"),
            dhparam: self.live_dir.join("dhparams.pem"),
            session_ticket_key: self.live_dir.join("dwticket.key"),
        }
    }
}

struct Host {
    dir: TempDir,
    system: SystemSpec,
}

impl Host {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let sub = |name: &str| {
            let path = dir.path().join(name);
            std::fs::create_dir_all(&path).unwrap();
            path.display().to_string()
        };
        let system = SystemSpec {
            systemd_path: sub("systemd"),
            sites_available_nginx: sub("sites-available"),
            sites_enabled_nginx: sub("sites-enabled"),
            sudoers_path: sub("sudoers.d"),
            letsencrypt_path: sub("letsencrypt"),
            lock_path: sub("lock"),
            ..Default::default()
        };
        Self { dir, system }
    }

    fn live_dir(&self) -> PathBuf {
        self.dir.path().join("live")
    }

    fn proxy_config(&self, app: &ApplicationSpec) -> PathBuf {
        Path::new(&self.system.sites_available_nginx).join(&app.project_name)
    }

    fn artifacts(&self, app: &ApplicationSpec) -> Vec<PathBuf> {
        artifact_paths(&self.system, app)
    }

    fn existing(&self, app: &ApplicationSpec) -> Vec<PathBuf> {
        self.artifacts(app)
            .into_iter()
            .filter(|p| p.exists())
            .collect()
    }

    /// Contents of every artifact, for before/after comparison
    fn snapshot(&self, app: &ApplicationSpec) -> Vec<Option<String>> {
        self.artifacts(app)
            .iter()
            .map(|p| std::fs::read_to_string(p).ok())
            .collect()
    }
}

fn blog() -> ApplicationSpec {
    ApplicationSpec {
        project_name: "blog".to_string(),
        project_path: "/srv/blog".to_string(),
        project_command: "/srv/blog/bin/server".to_string(),
        user_name: "www-data".to_string(),
        user_email: String::new(),
        use_letsencrypt: false,
        dns: vec!["blog.example.com".to_string()],
        proxy_pass: "http://127.0.0.1:4000".to_string(),
    }
}

fn blog_with_tls() -> ApplicationSpec {
    ApplicationSpec {
        use_letsencrypt: true,
        user_email: "ops@example.com".to_string(),
        dns: vec![
            "blog.example.com".to_string(),
            "www.blog.example.com".to_string(),
        ],
        ..blog()
    }
}

struct Harness {
    orchestrator: DeploymentOrchestrator,
    controller: Arc<FakeController>,
    provisioner: Arc<FakeProvisioner>,
    prompter: Arc<ScriptedPrompter>,
}

fn harness(host: &Host, app: ApplicationSpec, prompter: ScriptedPrompter, tls_ok: bool) -> Harness {
    let controller = Arc::new(FakeController::default());
    let provisioner = Arc::new(FakeProvisioner::new(host.live_dir(), tls_ok));
    let prompter = Arc::new(prompter);
    let orchestrator = DeploymentOrchestrator::new(
        host.system.clone(),
        app,
        controller.clone(),
        provisioner.clone(),
        prompter.clone(),
    );
    Harness {
        orchestrator,
        controller,
        provisioner,
        prompter,
    }
}

/// Deploy `app` without TLS and keep the artifacts
async fn deploy(host: &Host, app: ApplicationSpec) {
    let h = harness(host, app, ScriptedPrompter::new().confirm_with(false), true);
    assert_ok!(h.orchestrator.run().await);
}

#[tokio::test]
async fn test_fresh_deployment() {
    let host = Host::new();
    let app = blog();
    let h = harness(&host, app.clone(), ScriptedPrompter::new().confirm_with(false), true);

    let outcome = h.orchestrator.run().await.unwrap();

    assert_eq!(
        outcome,
        DeploymentOutcome::Deployed {
            tls: TlsStatus::Disabled
        }
    );
    assert_eq!(host.existing(&app), host.artifacts(&app));
    assert_eq!(h.prompter.shown(), host.artifacts(&app));
    assert_eq!(
        h.controller.calls(),
        vec![
            "daemon-reload",
            "start blog",
            "enable blog",
            "enable-site blog",
            "reload-proxy"
        ]
    );
    assert!(h.provisioner.issued().is_empty());
    assert_eq!(h.orchestrator.phase().await, Phase::Live);
}

#[tokio::test]
async fn test_service_starts_before_site_activation() {
    let host = Host::new();
    let h = harness(&host, blog(), ScriptedPrompter::new(), true);
    h.orchestrator.run().await.unwrap();

    let calls = h.controller.calls();
    let start = calls.iter().position(|c| c == "start blog").unwrap();
    let activate = calls.iter().position(|c| c == "enable-site blog").unwrap();
    let reload = calls.iter().position(|c| c == "reload-proxy").unwrap();
    assert!(start < activate);
    assert!(activate < reload);
}

#[tokio::test]
async fn test_present_abort_changes_nothing() {
    let host = Host::new();
    let app = blog();
    deploy(&host, app.clone()).await;
    let before = host.snapshot(&app);

    let h = harness(&host, app.clone(), ScriptedPrompter::new().choose_with(ABORT), true);
    let outcome = h.orchestrator.run().await.unwrap();

    assert_eq!(outcome, DeploymentOutcome::Aborted);
    assert!(h.controller.calls().is_empty());
    assert!(h.prompter.shown().is_empty());
    assert_eq!(host.snapshot(&app), before);
    assert_eq!(
        h.orchestrator.history().await,
        vec![Phase::Probing, Phase::Present, Phase::Aborted]
    );
}

#[tokio::test]
async fn test_unrecognised_answer_aborts() {
    let host = Host::new();
    let app = blog();
    deploy(&host, app.clone()).await;

    let h = harness(&host, app.clone(), ScriptedPrompter::new().choose_with(None), true);
    assert_eq!(h.orchestrator.run().await.unwrap(), DeploymentOutcome::Aborted);
    assert!(h.controller.calls().is_empty());
    assert_eq!(host.existing(&app).len(), 3);
}

#[tokio::test]
async fn test_rollback_removes_artifacts_without_starting() {
    let host = Host::new();
    let app = blog();
    let h = harness(&host, app.clone(), ScriptedPrompter::new().confirm_with(true), true);

    let outcome = h.orchestrator.run().await.unwrap();

    assert_eq!(outcome, DeploymentOutcome::RolledBack);
    assert!(host.existing(&app).is_empty());
    assert_eq!(h.prompter.shown().len(), 3);
    assert!(h.controller.calls().is_empty());
    assert_eq!(h.orchestrator.phase().await, Phase::RolledBack);
}

#[tokio::test]
async fn test_delete_existing_deployment() {
    let host = Host::new();
    let app = blog();
    deploy(&host, app.clone()).await;

    let h = harness(&host, app.clone(), ScriptedPrompter::new().choose_with(DELETE), true);
    let outcome = h.orchestrator.run().await.unwrap();

    assert_eq!(outcome, DeploymentOutcome::Deleted);
    assert!(host.existing(&app).is_empty());
    assert_eq!(
        h.controller.calls(),
        vec![
            "stop blog",
            "disable blog",
            "disable-site blog",
            "daemon-reload",
            "reload-proxy"
        ]
    );
}

#[tokio::test]
async fn test_create_then_delete_round_trip() {
    let host = Host::new();
    let app = blog();
    assert!(host.existing(&app).is_empty());

    let h = harness(&host, app.clone(), ScriptedPrompter::new(), true);
    assert_ok!(h.orchestrator.write_artifacts().await);
    assert_eq!(host.existing(&app).len(), 3);

    assert_ok!(h.orchestrator.delete().await);
    assert!(host.existing(&app).is_empty());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let host = Host::new();
    let app = blog();
    let h = harness(&host, app.clone(), ScriptedPrompter::new(), true);

    // never deployed
    assert_ok!(h.orchestrator.delete().await);
    assert_ok!(h.orchestrator.delete().await);
    assert!(host.existing(&app).is_empty());

    // nothing to stop when the unit is gone
    assert!(!h.controller.calls().iter().any(|c| c.starts_with("stop")));
}

#[tokio::test]
async fn test_delete_removes_remaining_files_when_some_are_missing() {
    let host = Host::new();
    let app = blog();
    let h = harness(&host, app.clone(), ScriptedPrompter::new(), true);
    h.orchestrator.write_artifacts().await.unwrap();
    std::fs::remove_file(host.proxy_config(&app)).unwrap();

    assert_ok!(h.orchestrator.delete().await);
    assert!(host.existing(&app).is_empty());
}

#[tokio::test]
async fn test_reconfigure_takes_site_offline_first() {
    let host = Host::new();
    let app = blog();
    deploy(&host, app.clone()).await;

    let h = harness(
        &host,
        app.clone(),
        ScriptedPrompter::new()
            .choose_with(RECONFIGURE)
            .confirm_with(false),
        true,
    );
    let outcome = h.orchestrator.run().await.unwrap();

    assert_eq!(
        outcome,
        DeploymentOutcome::Deployed {
            tls: TlsStatus::Disabled
        }
    );
    let calls = h.controller.calls();
    assert_eq!(
        &calls[..3],
        &["disable-site blog", "reload-proxy", "stop blog"]
    );
    assert!(calls.contains(&"start blog".to_string()));
    assert_eq!(host.existing(&app).len(), 3);
}

#[tokio::test]
async fn test_tls_deployment_rewrites_proxy() {
    let host = Host::new();
    let app = blog_with_tls();
    let h = harness(&host, app.clone(), ScriptedPrompter::new(), true);

    let outcome = h.orchestrator.run().await.unwrap();

    assert_eq!(
        outcome,
        DeploymentOutcome::Deployed {
            tls: TlsStatus::Enabled
        }
    );
    assert_eq!(h.provisioner.issued(), vec![app.dns.clone()]);

    let proxy = std::fs::read_to_string(host.proxy_config(&app)).unwrap();
    assert!(proxy.contains("listen 443 ssl http2;"));
    assert!(proxy.contains("return 301 https://$host$request_uri;"));
    assert!(proxy.contains(
        &host
            .live_dir()
            .join("blog.example.com/fullchain.pem")
            .display()
            .to_string()
    ));

    let reloads = h
        .controller
        .calls()
        .iter()
        .filter(|c| c.as_str() == "reload-proxy")
        .count();
    assert_eq!(reloads, 2);
    assert_eq!(h.orchestrator.phase().await, Phase::Secured);
}

#[tokio::test]
async fn test_tls_failure_keeps_http_deployment() {
    let host = Host::new();
    let app = blog_with_tls();
    let h = harness(&host, app.clone(), ScriptedPrompter::new(), false);

    let outcome = h.orchestrator.run().await.unwrap();

    match outcome {
        DeploymentOutcome::Deployed {
            tls: TlsStatus::Failed(reason),
        } => assert!(reason.contains("too many requests")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(host.existing(&app).len(), 3);
    let proxy = std::fs::read_to_string(host.proxy_config(&app)).unwrap();
    assert!(!proxy.contains("ssl_certificate"));
    assert!(!h.controller.calls().iter().any(|c| c.starts_with("stop")));
    assert_eq!(h.orchestrator.phase().await, Phase::Live);
}

#[tokio::test]
async fn test_rejected_tls_reload_restores_plain_site() {
    let host = Host::new();
    let app = blog_with_tls();
    let h = harness(&host, app.clone(), ScriptedPrompter::new(), true);
    h.controller.fail_reload_after(1);

    let outcome = h.orchestrator.run().await.unwrap();

    assert!(matches!(
        outcome,
        DeploymentOutcome::Deployed {
            tls: TlsStatus::Failed(_)
        }
    ));
    let proxy = std::fs::read_to_string(host.proxy_config(&app)).unwrap();
    assert!(proxy.contains("proxy_pass http://127.0.0.1:4000;"));
    assert!(!proxy.contains("listen 443"));
}

#[tokio::test]
async fn test_failed_tls_write_keeps_plain_site_intact() {
    let host = Host::new();
    let app = blog_with_tls();
    let h = harness(&host, app.clone(), ScriptedPrompter::new(), true);
    // the staged TLS config cannot be created, so the write fails
    h.provisioner.obstruct_after_issue(
        Path::new(&host.system.sites_available_nginx).join(".blog.tmp"),
    );

    let outcome = h.orchestrator.run().await.unwrap();

    match outcome {
        DeploymentOutcome::Deployed {
            tls: TlsStatus::Failed(reason),
        } => assert!(reason.contains("Failed to write")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    let proxy = std::fs::read_to_string(host.proxy_config(&app)).unwrap();
    assert!(proxy.contains("proxy_pass http://127.0.0.1:4000;"));
    assert!(proxy.contains("acme-challenge"));
    assert!(!proxy.contains("listen 443"));
    // no reload of a half-written config
    let reloads = h
        .controller
        .calls()
        .iter()
        .filter(|c| c.as_str() == "reload-proxy")
        .count();
    assert_eq!(reloads, 1);
}

#[tokio::test]
async fn test_service_command_failure_fails_run() {
    let host = Host::new();
    let app = blog();
    let h = harness(&host, app.clone(), ScriptedPrompter::new(), true);
    h.controller.fail_reload_after(0);

    let err = assert_err!(h.orchestrator.run().await);
    assert!(err.to_string().contains("systemctl reload nginx"));
    assert_eq!(h.orchestrator.phase().await, Phase::Failed);
    // only the review checkpoint removes files
    assert_eq!(host.existing(&app).len(), 3);
}

#[tokio::test]
async fn test_write_failure_aborts_creation() {
    let host = Host::new();
    let app = blog();
    std::fs::remove_dir(&host.system.sudoers_path).unwrap();
    let h = harness(&host, app.clone(), ScriptedPrompter::new(), true);

    let err = assert_err!(h.orchestrator.run().await);
    assert!(matches!(err, DeployError::ArtifactWrite { .. }));
    assert!(h.prompter.shown().is_empty());
    assert!(h.controller.calls().is_empty());
    assert_eq!(h.orchestrator.phase().await, Phase::Failed);
}
