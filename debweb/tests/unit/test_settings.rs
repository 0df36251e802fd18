//! Settings loading and validation tests

use std::path::Path;

use debweb::errors::DeployError;
use debweb::settings;

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn environment_json(root: &Path) -> String {
    for sub in ["systemd", "available", "enabled", "sudoers", "letsencrypt"] {
        std::fs::create_dir_all(root.join(sub)).unwrap();
    }
    serde_json::json!({
        "SystemdPath": root.join("systemd"),
        "SitesAvailableNginx": root.join("available"),
        "SitesEnabledNginx": root.join("enabled"),
        "SudoersPath": root.join("sudoers"),
        "LetsencryptPath": root.join("letsencrypt"),
    })
    .to_string()
}

fn application_json(overrides: serde_json::Value) -> String {
    let mut app = serde_json::json!({
        "ProjectName": "blog",
        "ProjectPath": "/srv/blog",
        "ProjetCommand": "/srv/blog/bin/server",
        "UserName": "www-data",
        "UserEmail": "",
        "UseLetsencrypt": false,
        "Dns": ["blog.example.com"],
        "ProxyPass": "http://127.0.0.1:4000",
    });
    if let (Some(app), Some(overrides)) = (app.as_object_mut(), overrides.as_object()) {
        for (key, value) in overrides {
            app.insert(key.clone(), value.clone());
        }
    }
    app.to_string()
}

async fn load(app: &str) -> Result<(), DeployError> {
    let dir = tempfile::tempdir().unwrap();
    let env = write(dir.path(), "environment.json", &environment_json(dir.path()));
    let app = write(dir.path(), "application.json", app);
    settings::load(&app, &env).await.map(|_| ())
}

#[tokio::test]
async fn test_valid_settings_load() {
    let dir = tempfile::tempdir().unwrap();
    let env = write(dir.path(), "environment.json", &environment_json(dir.path()));
    let app = write(
        dir.path(),
        "application.json",
        &application_json(serde_json::json!({})),
    );

    let (app, system) = settings::load(&app, &env).await.unwrap();
    assert_eq!(app.project_name, "blog");
    assert_eq!(app.project_command, "/srv/blog/bin/server");
    assert_eq!(system.command_timeout_secs, 600);
    assert_eq!(system.lock_path, "/run/lock");
}

#[tokio::test]
async fn test_letsencrypt_without_email_rejected() {
    let result = load(&application_json(serde_json::json!({
        "UseLetsencrypt": true,
        "UserEmail": "  ",
    })))
    .await;

    match result {
        Err(e @ DeployError::InvalidConfiguration(_)) => {
            assert!(e.to_string().contains("UserEmail"))
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_dns_rejected() {
    let result = load(&application_json(serde_json::json!({ "Dns": [] }))).await;
    match result {
        Err(e @ DeployError::InvalidConfiguration(_)) => assert!(e.to_string().contains("Dns")),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_field_rejected() {
    let result = load(&application_json(serde_json::json!({ "ProxyPass": "" }))).await;
    assert!(matches!(result, Err(DeployError::InvalidConfiguration(_))));
}

#[tokio::test]
async fn test_missing_directory_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let env_json = environment_json(dir.path());
    std::fs::remove_dir(dir.path().join("sudoers")).unwrap();

    let env = write(dir.path(), "environment.json", &env_json);
    let app = write(
        dir.path(),
        "application.json",
        &application_json(serde_json::json!({})),
    );

    let err = settings::load(&app, &env).await.unwrap_err();
    assert!(err.is_invalid_configuration());
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn test_missing_file_is_precondition() {
    let dir = tempfile::tempdir().unwrap();
    let err = settings::load(
        &dir.path().join("application.json"),
        &dir.path().join("environment.json"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DeployError::Precondition(_)));
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let result = load("{ not json").await;
    assert!(matches!(result, Err(DeployError::InvalidConfiguration(_))));
}
