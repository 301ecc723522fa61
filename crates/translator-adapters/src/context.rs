use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use speech_client::SpeechClient;
use translator_core::ports::{AuthProvider, CredentialDirectory, SettingsStore, TurnObserver};
use translator_core::preferences::keys;
use translator_core::{
    Credential, CredentialOrigin, CredentialStore, PipelineOrchestrator, Preferences, TranslationService, UserSession,
};

use crate::config::AppConfig;
use crate::firebase::{AuthEndpoints, FirebaseAuth, FirestoreCredentials};
use crate::playback::ScratchPlayer;
use crate::settings_file::JsonFileSettings;

pub type LiveOrchestrator<O> = PipelineOrchestrator<SpeechClient, ScratchPlayer, O>;

/// Every live collaborator, wired once at startup.
pub struct AppContext {
    pub config: AppConfig,
    pub settings: Arc<JsonFileSettings>,
    pub credentials: CredentialStore,
    pub session: UserSession,
    pub speech: SpeechClient,
}

impl AppContext {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let settings = Arc::new(JsonFileSettings::open(&config.settings_path)?);
        let store: Arc<dyn SettingsStore> = settings.clone();

        let endpoints = AuthEndpoints {
            accounts: config.auth_base_url.clone(),
            tokens: config.token_base_url.clone(),
        };
        let auth: Arc<dyn AuthProvider> = Arc::new(FirebaseAuth::new(
            endpoints,
            config.firebase_api_key.clone(),
            store.clone(),
            config.http_timeout,
        )?);
        let directory: Arc<dyn CredentialDirectory> = Arc::new(FirestoreCredentials::new(
            config.documents_base_url.clone(),
            config.firebase_project_id.clone(),
            config.http_timeout,
        )?);

        let credentials = CredentialStore::new(store.clone(), auth.clone(), directory, config.credential_wait);
        let session = UserSession::new(auth, store, credentials.clone());
        let speech = SpeechClient::new(config.api_base_url.clone(), config.http_timeout)?;
        debug!(settings = %config.settings_path.display(), api = %config.api_base_url, "context ready");

        Ok(Self {
            config,
            settings,
            credentials,
            session,
            speech,
        })
    }

    pub fn preferences(&self) -> Preferences {
        Preferences::new(self.settings.clone())
    }

    /// Cached API key without triggering a remote fetch.
    pub fn cached_credential(&self) -> Option<Credential> {
        self.settings
            .get(keys::API_KEY)
            .filter(|value| !value.is_empty())
            .map(|value| Credential::new(value, CredentialOrigin::Cached))
    }

    pub fn translation_service(&self) -> TranslationService<SpeechClient> {
        TranslationService::new(self.speech.clone(), self.credentials.clone())
    }

    /// Orchestrator for one conversation screen, entered with `selected_language`.
    pub fn orchestrator<O: TurnObserver>(&self, observer: O, selected_language: &str) -> LiveOrchestrator<O> {
        PipelineOrchestrator::new(
            self.speech.clone(),
            ScratchPlayer::in_temp_dir(self.config.player.clone()),
            observer,
            self.credentials.clone(),
            self.preferences(),
            selected_language,
        )
    }
}
