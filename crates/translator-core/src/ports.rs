use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ServiceError;
use crate::pipeline::TurnEvent;
use crate::request::{ChatRequest, SpeechRequest, TranscriptionUpload};
use crate::types::{AudioSegment, Credential, Identity, SynthesizedAudio};

/// The three remote operations the pipeline chains together.
#[async_trait]
pub trait SpeechApi: Send + Sync {
    async fn transcribe(&self, credential: &Credential, upload: &TranscriptionUpload) -> Result<String, ServiceError>;
    async fn complete(&self, credential: &Credential, request: &ChatRequest) -> Result<String, ServiceError>;
    async fn synthesize(&self, credential: &Credential, request: &SpeechRequest) -> Result<SynthesizedAudio, ServiceError>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ServiceError>;
    async fn sign_out(&self) -> Result<(), ServiceError>;
    fn current_user(&self) -> Option<Identity>;

    /// Trades the current user's refresh token for a new identity token.
    async fn refresh(&self) -> Result<Identity, ServiceError> {
        Err(ServiceError::Auth("token refresh is not supported".to_string()))
    }
}

/// Per-user document holding the API credential.
#[async_trait]
pub trait CredentialDirectory: Send + Sync {
    /// `Ok(None)` when the user has no document or the document has no key.
    /// A refused token is reported as a [`ServiceError`] inside the error so
    /// callers can refresh and retry.
    async fn fetch_api_key(&self, identity: &Identity) -> Result<Option<String>>;
}

/// Persistent key-value settings.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub trait AudioRecorder: Send {
    fn start_recording(&mut self) -> Result<()>;
    fn stop_recording(&mut self) -> Result<AudioSegment>;
    fn is_recording(&self) -> bool;
}

#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, audio: &SynthesizedAudio) -> Result<()>;
}

/// Receives stage results as soon as they are known.
#[async_trait]
pub trait TurnObserver: Send + Sync {
    async fn notify(&self, event: TurnEvent);
}

/// Observer that drops every event.
pub struct NoopObserver;

#[async_trait]
impl TurnObserver for NoopObserver {
    async fn notify(&self, _event: TurnEvent) {}
}

#[async_trait]
impl<T: SpeechApi + ?Sized> SpeechApi for Arc<T> {
    async fn transcribe(&self, credential: &Credential, upload: &TranscriptionUpload) -> Result<String, ServiceError> {
        (**self).transcribe(credential, upload).await
    }

    async fn complete(&self, credential: &Credential, request: &ChatRequest) -> Result<String, ServiceError> {
        (**self).complete(credential, request).await
    }

    async fn synthesize(&self, credential: &Credential, request: &SpeechRequest) -> Result<SynthesizedAudio, ServiceError> {
        (**self).synthesize(credential, request).await
    }
}

#[async_trait]
impl<T: AudioPlayer + ?Sized> AudioPlayer for Arc<T> {
    async fn play(&self, audio: &SynthesizedAudio) -> Result<()> {
        (**self).play(audio).await
    }
}

#[async_trait]
impl<T: TurnObserver + ?Sized> TurnObserver for Arc<T> {
    async fn notify(&self, event: TurnEvent) {
        (**self).notify(event).await
    }
}
