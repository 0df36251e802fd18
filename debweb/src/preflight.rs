//! Host preconditions
//!
//! Checked before anything is written: the tool must run as root and
//! openssl must be installed.

use colored::Colorize;

use crate::errors::DeployError;
use crate::services::command::{CommandRunner, CommandSpec};

/// Result of a single check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Run every check
pub async fn run_checks(runner: &dyn CommandRunner) -> Vec<CheckResult> {
    vec![check_root(runner).await, check_openssl(runner).await]
}

/// Fail with the first failed check
pub async fn check_preconditions(runner: &dyn CommandRunner) -> Result<(), DeployError> {
    match run_checks(runner).await.into_iter().find(|c| !c.passed) {
        Some(failed) => Err(DeployError::Precondition(format!(
            "{}: {}",
            failed.name, failed.detail
        ))),
        None => Ok(()),
    }
}

/// Print check results for `--diagnostic`
pub async fn run_diagnostic(runner: &dyn CommandRunner) -> bool {
    let results = run_checks(runner).await;
    for result in &results {
        let mark = if result.passed {
            "PASS".green()
        } else {
            "FAIL".red()
        };
        println!("[{}] {}: {}", mark, result.name, result.detail);
    }
    results.iter().all(|r| r.passed)
}

async fn check_root(runner: &dyn CommandRunner) -> CheckResult {
    const NAME: &str = "root privileges";
    match runner.run(&CommandSpec::new("id").arg("-u")).await {
        Ok(output) if output.stdout.trim() == "0" => CheckResult::pass(NAME, "running as root"),
        Ok(output) => CheckResult::fail(
            NAME,
            format!("running as uid {}, rerun with sudo", output.stdout.trim()),
        ),
        Err(e) => CheckResult::fail(NAME, e.to_string()),
    }
}

async fn check_openssl(runner: &dyn CommandRunner) -> CheckResult {
    const NAME: &str = "openssl";
    match runner.run(&CommandSpec::new("openssl").arg("version")).await {
        Ok(output) => CheckResult::pass(NAME, output.stdout.trim()),
        Err(_) => CheckResult::fail(NAME, "not installed (apt install openssl)"),
    }
}
