use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

use translator_adapters::{AppConfig, AppContext};
use translator_cli::commands;
use translator_cli::{Command, SettingsAction};
use translator_core::ports::SettingsStore;
use translator_core::preferences::keys;

async fn transcriptions() -> Json<Value> {
    Json(json!({ "text": "good morning" }))
}

async fn chat(body: Bytes) -> Json<Value> {
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let system = request["messages"][0]["content"].as_str().unwrap_or_default();
    let target = system.rsplit(' ').next().unwrap_or_default().to_string();
    Json(json!({ "choices": [ { "message": { "role": "assistant", "content": format!("in {}", target) } } ] }))
}

async fn speech() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "audio/mpeg")], b"ID3reply".to_vec())
}

async fn spawn_fake() -> SocketAddr {
    let app = Router::new()
        .route("/v1/audio/transcriptions", post(transcriptions))
        .route("/v1/chat/completions", post(chat))
        .route("/v1/audio/speech", post(speech));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn context(addr: SocketAddr, dir: &Path, api_key: Option<&str>) -> AppContext {
    let config = AppConfig {
        api_base_url: format!("http://{}/v1", addr),
        auth_base_url: format!("http://{}/auth", addr),
        token_base_url: format!("http://{}/token", addr),
        documents_base_url: format!("http://{}/docs", addr),
        firebase_api_key: None,
        firebase_project_id: None,
        settings_path: dir.join("settings.json"),
        credential_wait: Duration::from_millis(200),
        http_timeout: Duration::from_secs(5),
        player: None,
    };
    let ctx = AppContext::from_config(config).unwrap();
    if let Some(key) = api_key {
        ctx.settings.set(keys::API_KEY, key).unwrap();
    }
    ctx
}

#[tokio::test]
async fn translate_uses_cached_key() {
    let addr = spawn_fake().await;
    let dir = TempDir::new().unwrap();
    let ctx = context(addr, dir.path(), Some("sk-test"));

    let out = commands::execute(
        &ctx,
        Command::Translate {
            from: "English".into(),
            to: "German".into(),
            text: "good morning".into(),
        },
    )
    .await
    .unwrap();

    assert_eq!(out, "in German");
}

#[tokio::test]
async fn translate_without_key_prints_fallback() {
    let addr = spawn_fake().await;
    let dir = TempDir::new().unwrap();
    let ctx = context(addr, dir.path(), None);

    let out = commands::translate(&ctx, "English", "Turkish", "hi").await.unwrap();

    assert_eq!(out, "Translation failed");
}

#[tokio::test]
async fn turns_alternate_between_selected_and_default_language() {
    let addr = spawn_fake().await;
    let dir = TempDir::new().unwrap();
    let ctx = context(addr, dir.path(), Some("sk-test"));
    commands::settings(
        &ctx,
        SettingsAction::DefaultLanguage {
            language: "English".into(),
        },
    )
    .unwrap();
    let clip = dir.path().join("clip.m4a");
    std::fs::write(&clip, b"fake-audio").unwrap();

    let reports = commands::run_turns(&ctx, "Turkish", vec![clip.clone(), clip]).await.unwrap();

    let targets: Vec<_> = reports.iter().map(|r| r.target_language.as_str()).collect();
    assert_eq!(targets, vec!["Turkish", "English"]);
    assert!(reports.iter().all(|r| r.is_completed()));
    assert_eq!(reports[0].reply.as_deref(), Some("in Turkish"));
    assert_eq!(reports[1].reply.as_deref(), Some("in English"));
    assert_eq!(commands::format_outcome(&reports[1]), "[English] completed");
}

#[tokio::test]
async fn unsupported_language_is_refused_before_any_turn() {
    let addr = spawn_fake().await;
    let dir = TempDir::new().unwrap();
    let ctx = context(addr, dir.path(), Some("sk-test"));

    let result = commands::run_turns(&ctx, "Klingon", vec![dir.path().join("missing.m4a")]).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn settings_and_status_reflect_stored_values() {
    let addr = spawn_fake().await;
    let dir = TempDir::new().unwrap();
    let ctx = context(addr, dir.path(), Some("sk-test-123456"));

    let out = commands::settings(&ctx, SettingsAction::Voice { selection: "Male".into() }).unwrap();
    assert_eq!(out, "Voice set to Male (echo)");
    assert_eq!(ctx.settings.get(keys::VOICE_TYPE).as_deref(), Some("echo"));

    assert!(commands::settings(&ctx, SettingsAction::Voice { selection: "Robot".into() }).is_err());

    let status = commands::status(&ctx);
    assert!(status.contains("not signed in"));
    assert!(status.contains("Male"));
    assert!(!status.contains("sk-test-123456"));
}
