use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use speech_client::SpeechClient;
use translator_core::ports::SpeechApi;
use translator_core::{
    AudioSegment, ChatRequest, Credential, CredentialOrigin, ServiceError, SpeechRequest, TranscriptionUpload, Voice,
};

#[derive(Clone, Debug)]
struct Captured {
    path: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

#[derive(Clone, Default)]
struct FakeState {
    captured: Arc<Mutex<Vec<Captured>>>,
}

impl FakeState {
    fn push(&self, path: &str, headers: HeaderMap, body: Bytes) {
        self.captured.lock().unwrap().push(Captured {
            path: path.to_string(),
            headers,
            body: body.to_vec(),
        });
    }

    fn requests(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }
}

async fn transcriptions(State(state): State<FakeState>, headers: HeaderMap, body: Bytes) -> Json<Value> {
    state.push("/v1/audio/transcriptions", headers, body);
    Json(json!({ "text": "hello" }))
}

async fn chat(State(state): State<FakeState>, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.push("/v1/chat/completions", headers, body);
    let user = request["messages"][1]["content"].as_str().unwrap_or_default();
    Json(json!({
        "choices": [ { "message": { "role": "assistant", "content": format!("echo: {}", user) } } ]
    }))
}

async fn speech(State(state): State<FakeState>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    state.push("/v1/audio/speech", headers, body);
    ([(header::CONTENT_TYPE, "audio/mpeg")], b"ID3fake-mp3".to_vec())
}

async fn unauthorized() -> impl IntoResponse {
    (StatusCode::UNAUTHORIZED, r#"{"error":{"message":"Incorrect API key"}}"#)
}

async fn no_choices() -> Json<Value> {
    Json(json!({ "choices": [] }))
}

async fn json_instead_of_audio() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"error":{"message":"voice not found"}}"#,
    )
}

async fn spawn_fake() -> (SocketAddr, FakeState) {
    let state = FakeState::default();
    let app = Router::new()
        .route("/v1/audio/transcriptions", post(transcriptions))
        .route("/v1/chat/completions", post(chat))
        .route("/v1/audio/speech", post(speech))
        .route("/broken/audio/transcriptions", post(unauthorized))
        .route("/broken/chat/completions", post(no_choices))
        .route("/broken/audio/speech", post(json_instead_of_audio))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn credential() -> Credential {
    Credential::new("k1", CredentialOrigin::Cached)
}

fn upload() -> TranscriptionUpload {
    TranscriptionUpload::new(AudioSegment::new(b"fake-m4a-payload".to_vec(), "recording.m4a"))
}

fn boundary_of(headers: &HeaderMap) -> String {
    let content_type = headers.get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
    content_type.split("boundary=").nth(1).unwrap().to_string()
}

#[tokio::test]
async fn transcription_is_one_multipart_post_per_call() {
    let (addr, state) = spawn_fake().await;
    let client = SpeechClient::new(format!("http://{}/v1", addr), Duration::from_secs(5)).unwrap();

    assert_eq!(client.transcribe(&credential(), &upload()).await.unwrap(), "hello");
    assert_eq!(client.transcribe(&credential(), &upload()).await.unwrap(), "hello");

    let requests = state.requests();
    assert_eq!(requests.len(), 2);

    let first = &requests[0];
    assert_eq!(first.headers.get(header::AUTHORIZATION).unwrap(), "Bearer k1");
    let body = String::from_utf8_lossy(&first.body).to_lowercase();
    assert!(body.contains("name=\"model\""));
    assert!(body.contains("whisper-1"));
    assert!(body.contains("name=\"file\"; filename=\"recording.m4a\""));
    assert!(body.contains("content-type: audio/m4a"));
    assert!(body.contains("fake-m4a-payload"));

    assert_ne!(boundary_of(&requests[0].headers), boundary_of(&requests[1].headers));
}

#[tokio::test]
async fn chat_posts_json_and_reads_first_choice() {
    let (addr, state) = spawn_fake().await;
    let client = SpeechClient::new(format!("http://{}/v1", addr), Duration::from_secs(5)).unwrap();

    let reply = client
        .complete(&credential(), &ChatRequest::pipeline("Turkish", "hello"))
        .await
        .unwrap();

    assert_eq!(reply, "echo: hello");
    let sent: Value = serde_json::from_slice(&state.requests()[0].body).unwrap();
    assert_eq!(sent["model"], "gpt-4");
    assert_eq!(sent["messages"][0]["role"], "system");
    assert!(sent["messages"][0]["content"].as_str().unwrap().contains("Turkish"));
    assert_eq!(sent["messages"][1]["content"], "hello");
}

#[tokio::test]
async fn speech_returns_raw_audio_bytes() {
    let (addr, state) = spawn_fake().await;
    let client = SpeechClient::new(format!("http://{}/v1", addr), Duration::from_secs(5)).unwrap();

    let audio = client
        .synthesize(&credential(), &SpeechRequest::new(Voice::Echo, "merhaba"))
        .await
        .unwrap();

    assert_eq!(audio.bytes, b"ID3fake-mp3".to_vec());
    assert_eq!(audio.content_type, "audio/mpeg");
    let sent: Value = serde_json::from_slice(&state.requests()[0].body).unwrap();
    assert_eq!(sent, json!({ "model": "tts-1", "voice": "echo", "input": "merhaba" }));
}

#[tokio::test]
async fn error_responses_map_to_service_errors() {
    let (addr, _) = spawn_fake().await;
    let client = SpeechClient::new(format!("http://{}/broken", addr), Duration::from_secs(5)).unwrap();

    match client.transcribe(&credential(), &upload()).await {
        Err(ServiceError::Status { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("Incorrect API key"));
        }
        other => panic!("expected status error, got {:?}", other),
    }

    let chat = client.complete(&credential(), &ChatRequest::direct("English", "Turkish", "")).await;
    assert!(matches!(chat, Err(ServiceError::MalformedResponse(_))));

    let speech = client.synthesize(&credential(), &SpeechRequest::new(Voice::Alloy, "hi")).await;
    assert_eq!(speech, Err(ServiceError::MalformedResponse("voice not found".into())));
}

#[tokio::test]
async fn unreachable_host_is_a_transport_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = SpeechClient::new(format!("http://{}/v1", addr), Duration::from_secs(5)).unwrap();

    let result = client.complete(&credential(), &ChatRequest::pipeline("English", "hi")).await;

    assert!(matches!(result, Err(ServiceError::Transport(_))));
}
