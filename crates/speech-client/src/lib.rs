//! HTTP client for the OpenAI-compatible speech, chat and transcription endpoints.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{multipart, Client as Http, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use translator_core::ports::SpeechApi;
use translator_core::{ChatRequest, Credential, ServiceError, SpeechRequest, SynthesizedAudio, TranscriptionUpload};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Clone, Debug)]
pub struct SpeechClient {
    http: Http,
    base_url: String,
}

impl SpeechClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Http::builder()
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for speech API")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn openai() -> Result<Self> {
        Self::new(DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl SpeechApi for SpeechClient {
    async fn transcribe(&self, credential: &Credential, upload: &TranscriptionUpload) -> Result<String, ServiceError> {
        let form = build_transcription_form(upload)?;
        debug!(boundary = form.boundary(), bytes = upload.audio.bytes().len(), "sending transcription");

        let resp = self
            .http
            .post(self.url("audio/transcriptions"))
            .bearer_auth(credential.value())
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let resp = check_status(resp).await?;

        let body: TranscriptionResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(format!("transcription: {}", e)))?;
        Ok(body.text)
    }

    async fn complete(&self, credential: &Credential, request: &ChatRequest) -> Result<String, ServiceError> {
        let resp = self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(credential.value())
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        let resp = check_status(resp).await?;

        let v: Value = resp
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(format!("invalid json: {}", e)))?;
        let content = v
            .pointer("/choices/0/message/content")
            .and_then(|x| x.as_str())
            .ok_or_else(|| ServiceError::MalformedResponse("missing choices[0].message.content".into()))?;
        Ok(content.to_string())
    }

    async fn synthesize(&self, credential: &Credential, request: &SpeechRequest) -> Result<SynthesizedAudio, ServiceError> {
        let resp = self
            .http
            .post(self.url("audio/speech"))
            .bearer_auth(credential.value())
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        let resp = check_status(resp).await?;

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|raw| raw.to_str().ok())
            .map(|s| s.to_owned())
            .unwrap_or_default();
        let bytes = resp.bytes().await.map_err(transport)?;

        if bytes.is_empty() {
            return Err(ServiceError::MalformedResponse("speech response was empty".into()));
        }
        // Some gateways answer 200 with a JSON error body.
        if content_type.contains("application/json") || bytes.starts_with(b"{") {
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_owned))
                .unwrap_or_else(|| "expected audio, got JSON".to_string());
            return Err(ServiceError::MalformedResponse(message));
        }

        let mut audio = SynthesizedAudio::mp3(bytes.to_vec());
        if !content_type.is_empty() {
            audio.content_type = content_type;
        }
        Ok(audio)
    }
}

/// Multipart body: the model name plus the audio file. reqwest picks a fresh
/// random boundary for every form.
fn build_transcription_form(upload: &TranscriptionUpload) -> Result<multipart::Form, ServiceError> {
    let audio_part = multipart::Part::bytes(upload.audio.bytes().to_vec())
        .file_name(upload.audio.file_name().to_string())
        .mime_str(upload.audio.mime_type())
        .map_err(|e| ServiceError::Transport(format!("Failed to create audio part: {}", e)))?;

    Ok(multipart::Form::new()
        .text("model", upload.model.clone())
        .part("file", audio_part))
}

async fn check_status(resp: Response) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

fn transport(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Transport(format!("request timed out: {}", e))
    } else {
        ServiceError::Transport(e.to_string())
    }
}
