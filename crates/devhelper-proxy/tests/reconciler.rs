//! File reconciler tests against a temporary config directory

use chrono::Utc;
use devhelper_core::{Domain, ProxyReconciler, ReconcileError};
use devhelper_proxy::{FileReconciler, ReconcilerConfig, ServerKind};
use std::time::Duration;
use tempfile::TempDir;

fn domain(fqdn: &str, ip: &str) -> Domain {
    let now = Utc::now();
    Domain {
        fqdn: fqdn.to_string(),
        ip: ip.to_string(),
        owner_id: "U1".to_string(),
        owner_name: "Ann Lee".to_string(),
        created_at: now,
        delete_at: now,
        basic_auth: true,
        full_ssl: false,
        port: "80".to_string(),
    }
}

async fn reconciler(dir: &TempDir, kind: ServerKind) -> FileReconciler {
    let mut config = ReconcilerConfig::new(kind, dir.path().join("sites"));
    config.debug = true;
    FileReconciler::new(config).await.unwrap()
}

#[tokio::test]
async fn test_create_exists_delete() {
    let dir = TempDir::new().unwrap();
    let proxy = reconciler(&dir, ServerKind::Nginx).await;
    let d = domain("a-lee.dev.example", "10.1.2.5");

    assert!(!proxy.exists(&d.fqdn).await.unwrap());
    proxy.create(&d).await.unwrap();
    assert!(proxy.exists(&d.fqdn).await.unwrap());

    let written = std::fs::read_to_string(dir.path().join("sites/a-lee.dev.example")).unwrap();
    assert!(written.contains("server_name a-lee.dev.example;"));
    assert!(written.contains("proxy_pass http://10.1.2.5:80;"));

    proxy.delete(&d.fqdn).await.unwrap();
    assert!(!proxy.exists(&d.fqdn).await.unwrap());
}

#[tokio::test]
async fn test_create_twice_conflicts() {
    let dir = TempDir::new().unwrap();
    let proxy = reconciler(&dir, ServerKind::Caddy).await;
    let d = domain("a-lee.dev.example", "10.1.2.5");

    proxy.create(&d).await.unwrap();
    let err = proxy.create(&d).await.unwrap_err();
    assert!(matches!(err, ReconcileError::ConfigAlreadyExists(ref f) if f == "a-lee.dev.example"));
}

#[tokio::test]
async fn test_delete_missing() {
    let dir = TempDir::new().unwrap();
    let proxy = reconciler(&dir, ServerKind::Nginx).await;

    let err = proxy.delete("ghost.dev.example").await.unwrap_err();
    assert!(matches!(err, ReconcileError::ConfigMissing(_)));
}

#[tokio::test]
async fn test_invalid_names_never_touch_disk() {
    let dir = TempDir::new().unwrap();
    let proxy = reconciler(&dir, ServerKind::Nginx).await;

    let err = proxy.create(&domain("../escape", "10.1.2.5")).await.unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidName(_)));
    assert!(!dir.path().join("escape").exists());

    assert!(matches!(
        proxy.exists("a/b").await,
        Err(ReconcileError::InvalidName(_))
    ));
}

#[tokio::test]
async fn test_replace_same_fqdn() {
    let dir = TempDir::new().unwrap();
    let proxy = reconciler(&dir, ServerKind::Nginx).await;
    let before = domain("a-lee.dev.example", "10.1.2.5");
    proxy.create(&before).await.unwrap();

    let mut after = before.clone();
    after.ip = "10.1.2.9".to_string();
    after.full_ssl = true;
    proxy.replace(&before, &after).await.unwrap();

    let written = std::fs::read_to_string(dir.path().join("sites/a-lee.dev.example")).unwrap();
    assert!(written.contains("proxy_pass https://10.1.2.9:443;"));

    // no temp files left behind
    let entries: Vec<_> = std::fs::read_dir(dir.path().join("sites"))
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_replace_renamed_fqdn() {
    let dir = TempDir::new().unwrap();
    let proxy = reconciler(&dir, ServerKind::Nginx).await;
    let before = domain("a-lee.dev.example", "10.1.2.5");
    proxy.create(&before).await.unwrap();

    let mut after = before.clone();
    after.fqdn = "a-lee.stage.example".to_string();
    proxy.replace(&before, &after).await.unwrap();

    assert!(!proxy.exists("a-lee.dev.example").await.unwrap());
    assert!(proxy.exists("a-lee.stage.example").await.unwrap());
}

#[tokio::test]
async fn test_replace_missing_and_taken() {
    let dir = TempDir::new().unwrap();
    let proxy = reconciler(&dir, ServerKind::Nginx).await;
    let a = domain("a.dev.example", "10.1.2.5");
    let b = domain("b.dev.example", "10.1.2.6");

    let err = proxy.replace(&a, &a).await.unwrap_err();
    assert!(matches!(err, ReconcileError::ConfigMissing(_)));

    proxy.create(&a).await.unwrap();
    proxy.create(&b).await.unwrap();
    let err = proxy.replace(&a, &b).await.unwrap_err();
    assert!(matches!(err, ReconcileError::ConfigAlreadyExists(_)));
}

#[tokio::test]
async fn test_replace_restores_on_reload_failure() {
    let dir = TempDir::new().unwrap();
    let sites = dir.path().join("sites");
    let before = domain("a-lee.dev.example", "10.1.2.5");

    // seed the file in debug mode
    reconciler(&dir, ServerKind::Caddy).await.create(&before).await.unwrap();
    let original = std::fs::read_to_string(sites.join("a-lee.dev.example")).unwrap();

    let mut config = ReconcilerConfig::new(ServerKind::Caddy, &sites);
    config.caddyfile = dir.path().join("missing-Caddyfile");
    config.reload_timeout = Duration::from_secs(5);
    let live = FileReconciler::new(config).await.unwrap();

    let mut after = before.clone();
    after.ip = "10.1.2.9".to_string();
    let err = live.replace(&before, &after).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Reload { .. }));

    let restored = std::fs::read_to_string(sites.join("a-lee.dev.example")).unwrap();
    assert_eq!(restored, original);
}

#[tokio::test]
async fn test_custom_template_file() {
    let dir = TempDir::new().unwrap();
    let template = dir.path().join("vhost.tmpl");
    std::fs::write(&template, "{{ .domain }} -> {{ .scheme }}://{{ .ip }}:{{ .port }}\n").unwrap();

    let mut config = ReconcilerConfig::new(ServerKind::Nginx, dir.path().join("sites"));
    config.template_path = Some(template);
    config.debug = true;
    let proxy = FileReconciler::new(config).await.unwrap();

    proxy.create(&domain("x.dev.example", "10.0.0.7")).await.unwrap();
    let written = std::fs::read_to_string(dir.path().join("sites/x.dev.example")).unwrap();
    assert_eq!(written, "x.dev.example -> http://10.0.0.7:80\n");
}

#[tokio::test]
async fn test_bad_template_rejected_at_startup() {
    let dir = TempDir::new().unwrap();
    let template = dir.path().join("vhost.tmpl");
    std::fs::write(&template, "server_name {{hostname}};").unwrap();

    let mut config = ReconcilerConfig::new(ServerKind::Nginx, dir.path().join("sites"));
    config.template_path = Some(template);
    assert!(matches!(
        FileReconciler::new(config).await,
        Err(ReconcileError::Template(_))
    ));
}
