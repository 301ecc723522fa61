use std::sync::Arc;
use std::time::Duration;

use translator_core::mocks::*;
use translator_core::ports::SettingsStore;
use translator_core::preferences::keys;
use translator_core::{CredentialStore, ServiceError, Stage, TranslationService};

fn service(api: Arc<ScriptedSpeechApi>, cached_key: Option<&str>) -> TranslationService<Arc<ScriptedSpeechApi>> {
    let settings = Arc::new(MemorySettings::new());
    if let Some(key) = cached_key {
        settings.set(keys::API_KEY, key).unwrap();
    }
    let credentials = CredentialStore::new(
        settings,
        Arc::new(StaticAuth::signed_out()),
        Arc::new(CountingDirectory::empty()),
        Duration::from_secs(1),
    );
    TranslationService::new(api, credentials)
}

#[tokio::test]
async fn translate_sends_direct_instruction() {
    let api = Arc::new(ScriptedSpeechApi::new("", "Guten Morgen"));
    let svc = service(api.clone(), Some("k1"));

    let out = svc.translate("English", "German", "good morning").await.unwrap();

    assert_eq!(out, "Guten Morgen");
    let requests = api.chat_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].system_instruction().unwrap().contains("from English to German"));
    assert_eq!(requests[0].user_content(), Some("good morning"));
}

#[tokio::test]
async fn empty_text_is_forwarded_not_rejected() {
    let api = Arc::new(ScriptedSpeechApi::new("", ""));
    let svc = service(api.clone(), Some("k1"));

    let out = svc.translate("English", "Turkish", "").await;

    assert_eq!(out, Ok(String::new()));
    assert_eq!(api.chat_requests()[0].user_content(), Some(""));
}

#[tokio::test]
async fn remote_failure_maps_to_translation_stage() {
    let api = Arc::new(ScriptedSpeechApi::new("", "unused"));
    api.fail_completion(ServiceError::Transport("timed out".into()));
    let svc = service(api, Some("k1"));

    let err = svc.translate("English", "Turkish", "hi").await.unwrap_err();
    assert_eq!(err.stage, Stage::Translation);

    assert_eq!(svc.translate_or_fallback("English", "Turkish", "hi").await, "Translation failed");
}

#[tokio::test]
async fn no_credential_means_no_request() {
    let api = Arc::new(ScriptedSpeechApi::new("", "unused"));
    let svc = service(api.clone(), None);

    let err = svc.translate("English", "Turkish", "hi").await.unwrap_err();

    assert_eq!(err.stage, Stage::Credential);
    assert!(api.calls().is_empty());
    assert_eq!(svc.translate_or_fallback("English", "Turkish", "hi").await, "Translation failed");
}
