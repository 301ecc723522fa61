use tracing::{info, warn};

use crate::credential::CredentialStore;
use crate::error::{Stage, StageFailure};
use crate::ports::SpeechApi;
use crate::request::ChatRequest;

/// One-shot free-text translation, independent of any pipeline turn.
pub struct TranslationService<A: SpeechApi> {
    api: A,
    credentials: CredentialStore,
}

impl<A: SpeechApi> TranslationService<A> {
    pub fn new(api: A, credentials: CredentialStore) -> Self {
        Self { api, credentials }
    }

    /// Input is passed through as-is, malformed or empty text included; the
    /// model is told to do its best with it.
    pub async fn translate(&self, from: &str, to: &str, text: &str) -> Result<String, StageFailure> {
        let credential = self
            .credentials
            .credential()
            .await
            .map_err(|e| StageFailure::new(Stage::Credential, e))?;

        info!(from, to, chars = text.chars().count(), "translating text");
        self.api
            .complete(&credential, &ChatRequest::direct(from, to, text))
            .await
            .map_err(|e| StageFailure::new(Stage::Translation, e))
    }

    pub async fn translate_or_fallback(&self, from: &str, to: &str, text: &str) -> String {
        match self.translate(from, to, text).await {
            Ok(translated) => translated,
            Err(failure) => {
                warn!(error = %failure, "translation failed");
                Stage::Translation.fallback_message().to_string()
            }
        }
    }
}
