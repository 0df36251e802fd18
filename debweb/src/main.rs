//! debweb - Entry Point
//!
//! Deploys one web application as an nginx site backed by a systemd service.
//! Reads `application.json` and `environment.json` (override with
//! `--app=<path>` and `--env=<path>`).

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tracing::{error, info, warn};

use debweb::app::options::RunOptions;
use debweb::app::run::run;
use debweb::deploy::orchestrator::{DeploymentOutcome, TlsStatus};
use debweb::deploy::prompt::TerminalPrompter;
use debweb::errors::DeployError;
use debweb::logs::{init_logging, LogOptions};
use debweb::preflight::run_diagnostic;
use debweb::services::command::SystemRunner;
use debweb::settings;
use debweb::utils::version_info;

const EXIT_FAILURE: i32 = 1;
const EXIT_INVALID_CONFIGURATION: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{}", e),
        }
        return;
    }

    // Run diagnostics
    if cli_args.contains_key("diagnostic") || cli_args.contains_key("diag") {
        let runner = SystemRunner::new(Duration::from_secs(30));
        if !run_diagnostic(&runner).await {
            std::process::exit(EXIT_INVALID_CONFIGURATION);
        }
        return;
    }

    let options = match RunOptions::from_args(&cli_args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Aborting: {}", e);
            std::process::exit(EXIT_INVALID_CONFIGURATION);
        }
    };

    // Load and validate settings before anything else
    let (app, system) = match settings::load(&options.app_config, &options.system_config).await {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{} {}", "Aborting (configuration invalid):".red().bold(), e);
            std::process::exit(EXIT_INVALID_CONFIGURATION);
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: options.log_level.unwrap_or(system.log_level),
        log_dir: system.log_dir.clone(),
        json_format: options.json_logs,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    info!("debweb {} managing {}", version_info().version, app.project_name);
    let prompter = Arc::new(TerminalPrompter::new());
    match run(app, system, prompter, await_shutdown_signal()).await {
        Ok(outcome) => report(&outcome),
        Err(DeployError::Interrupted) => {
            eprintln!(
                "{} Interrupted. Re-run debweb to finish or remove the deployment.",
                "[WARN]".yellow().bold()
            );
            std::process::exit(EXIT_INTERRUPTED);
        }
        Err(e) => {
            error!("{}", e);
            if e.is_invalid_configuration() {
                eprintln!("{} {}", "Aborting:".red().bold(), e);
                std::process::exit(EXIT_INVALID_CONFIGURATION);
            }
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            eprintln!("Fix the problem above and re-run debweb.");
            std::process::exit(EXIT_FAILURE);
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, shutting down...");
                    }
                    _ = sigint.recv() => {
                        info!("SIGINT received, shutting down...");
                    }
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to install signal handlers: {e}");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received, shutting down..."),
            Err(e) => {
                warn!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        }
    }
}

fn report(outcome: &DeploymentOutcome) {
    match outcome {
        DeploymentOutcome::Aborted => println!("Nothing changed."),
        DeploymentOutcome::Deleted => println!("{}", "Deployment removed.".green()),
        DeploymentOutcome::RolledBack => println!("Generated files removed, nothing was started."),
        DeploymentOutcome::Deployed { tls } => {
            println!("{}", "[SUCCESS] Deployment is live.".green().bold());
            match tls {
                TlsStatus::Disabled => {}
                TlsStatus::Enabled => println!("Serving over HTTPS."),
                TlsStatus::Failed(reason) => println!(
                    "{} TLS setup failed, serving over plain HTTP: {}",
                    "[WARN]".yellow().bold(),
                    reason
                ),
            }
        }
    }
}
