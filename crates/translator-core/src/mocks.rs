//! In-crate test doubles for the ports, shared by unit and integration tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::ServiceError;
use crate::pipeline::TurnEvent;
use crate::ports::{
    AudioPlayer, AudioRecorder, AuthProvider, CredentialDirectory, SettingsStore, SpeechApi, TurnObserver,
};
use crate::request::{ChatRequest, SpeechRequest, TranscriptionUpload};
use crate::types::{AudioSegment, Credential, Identity, SynthesizedAudio};

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

pub struct StaticAuth {
    user: Mutex<Option<Identity>>,
    password: Option<String>,
    refreshed_token: Option<String>,
    refreshes: AtomicUsize,
}

impl StaticAuth {
    pub fn signed_in(uid: &str) -> Self {
        Self {
            user: Mutex::new(Some(Identity::new(uid, format!("token-{}", uid)))),
            password: None,
            refreshed_token: None,
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            user: Mutex::new(None),
            password: None,
            refreshed_token: None,
            refreshes: AtomicUsize::new(0),
        }
    }

    /// Marks the signed-in user's token as expired at `expires_at` (unix seconds).
    pub fn expiring_at(self, expires_at: u64) -> Self {
        if let Some(user) = self.user.lock().unwrap().as_mut() {
            user.expires_at = Some(expires_at);
        }
        self
    }

    /// Token handed out by `refresh`; without one, refresh fails.
    pub fn refreshing_to(mut self, token: &str) -> Self {
        self.refreshed_token = Some(token.to_string());
        self
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Password accepted by `sign_in`.
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ServiceError> {
        if self.password.as_deref() != Some(password) {
            return Err(ServiceError::Auth("INVALID_PASSWORD".to_string()));
        }
        let identity = Identity {
            email: Some(email.to_string()),
            ..Identity::new(format!("uid-{}", email), "token")
        };
        *self.user.lock().unwrap() = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ServiceError> {
        *self.user.lock().unwrap() = None;
        Ok(())
    }

    fn current_user(&self) -> Option<Identity> {
        self.user.lock().unwrap().clone()
    }

    async fn refresh(&self) -> Result<Identity, ServiceError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let token = self
            .refreshed_token
            .clone()
            .ok_or_else(|| ServiceError::Auth("TOKEN_EXPIRED".to_string()))?;
        let mut user = self.user.lock().unwrap();
        let identity = user.as_mut().ok_or(ServiceError::CredentialUnavailable)?;
        identity.id_token = token;
        identity.expires_at = None;
        Ok(identity.clone())
    }
}

/// Serves a fixed key after an optional delay and counts lookups.
pub struct CountingDirectory {
    key: Option<String>,
    delay: Duration,
    accepted_token: Option<String>,
    calls: AtomicUsize,
    tokens_seen: Mutex<Vec<String>>,
}

impl CountingDirectory {
    pub fn with_key(key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            delay: Duration::ZERO,
            accepted_token: None,
            calls: AtomicUsize::new(0),
            tokens_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self {
            key: None,
            delay: Duration::ZERO,
            accepted_token: None,
            calls: AtomicUsize::new(0),
            tokens_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answers 401 to any other identity token.
    pub fn accepting_token(mut self, token: &str) -> Self {
        self.accepted_token = Some(token.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialDirectory for CountingDirectory {
    async fn fetch_api_key(&self, identity: &Identity) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen.lock().unwrap().push(identity.id_token.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(accepted) = &self.accepted_token {
            if accepted != &identity.id_token {
                return Err(ServiceError::Status {
                    status: 401,
                    body: "token expired".to_string(),
                }
                .into());
            }
        }
        Ok(self.key.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Transcribe { credential: String, file_name: String, model: String },
    Complete(ChatRequest),
    Synthesize(SpeechRequest),
}

/// Speech API with canned results per operation. Every call is recorded.
pub struct ScriptedSpeechApi {
    transcript: Mutex<Result<String, ServiceError>>,
    reply: Mutex<Result<String, ServiceError>>,
    audio: Mutex<Result<SynthesizedAudio, ServiceError>>,
    transcribe_delay: Duration,
    calls: Mutex<Vec<ApiCall>>,
}

impl ScriptedSpeechApi {
    pub fn new(transcript: &str, reply: &str) -> Self {
        Self {
            transcript: Mutex::new(Ok(transcript.to_string())),
            reply: Mutex::new(Ok(reply.to_string())),
            audio: Mutex::new(Ok(SynthesizedAudio::mp3(b"ID3-mock".to_vec()))),
            transcribe_delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_transcribe_delay(mut self, delay: Duration) -> Self {
        self.transcribe_delay = delay;
        self
    }

    pub fn fail_transcription(&self, error: ServiceError) {
        *self.transcript.lock().unwrap() = Err(error);
    }

    pub fn fail_completion(&self, error: ServiceError) {
        *self.reply.lock().unwrap() = Err(error);
    }

    pub fn fail_synthesis(&self, error: ServiceError) {
        *self.audio.lock().unwrap() = Err(error);
    }

    pub fn set_reply(&self, reply: &str) {
        *self.reply.lock().unwrap() = Ok(reply.to_string());
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Complete(req) => Some(req),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SpeechApi for ScriptedSpeechApi {
    async fn transcribe(&self, credential: &Credential, upload: &TranscriptionUpload) -> Result<String, ServiceError> {
        self.calls.lock().unwrap().push(ApiCall::Transcribe {
            credential: credential.value().to_string(),
            file_name: upload.audio.file_name().to_string(),
            model: upload.model.clone(),
        });
        if !self.transcribe_delay.is_zero() {
            tokio::time::sleep(self.transcribe_delay).await;
        }
        self.transcript.lock().unwrap().clone()
    }

    async fn complete(&self, _credential: &Credential, request: &ChatRequest) -> Result<String, ServiceError> {
        self.calls.lock().unwrap().push(ApiCall::Complete(request.clone()));
        self.reply.lock().unwrap().clone()
    }

    async fn synthesize(&self, _credential: &Credential, request: &SpeechRequest) -> Result<SynthesizedAudio, ServiceError> {
        self.calls.lock().unwrap().push(ApiCall::Synthesize(request.clone()));
        self.audio.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct RecordingPlayer {
    played: Mutex<Vec<SynthesizedAudio>>,
    fail: AtomicBool,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let player = Self::default();
        player.fail.store(true, Ordering::SeqCst);
        player
    }

    pub fn played(&self) -> Vec<SynthesizedAudio> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioPlayer for RecordingPlayer {
    async fn play(&self, audio: &SynthesizedAudio) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("audio device unavailable"));
        }
        self.played.lock().unwrap().push(audio.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<TurnEvent>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TurnEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl TurnObserver for CollectingObserver {
    async fn notify(&self, event: TurnEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Recorder that "captures" a fixed segment.
pub struct ScriptedRecorder {
    segment: AudioSegment,
    recording: bool,
}

impl ScriptedRecorder {
    pub fn new(segment: AudioSegment) -> Self {
        Self {
            segment,
            recording: false,
        }
    }
}

impl AudioRecorder for ScriptedRecorder {
    fn start_recording(&mut self) -> Result<()> {
        self.recording = true;
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<AudioSegment> {
        if !self.recording {
            return Err(anyhow!("not recording"));
        }
        self.recording = false;
        Ok(self.segment.clone())
    }

    fn is_recording(&self) -> bool {
        self.recording
    }
}
