use anyhow::{anyhow, Result};
use std::str::FromStr;
use std::sync::Arc;

use crate::ports::SettingsStore;
use crate::request::Voice;

/// Keys persisted in the settings store.
pub mod keys {
    pub const API_KEY: &str = "apiKey";
    pub const SELECTED_VOICE: &str = "selectedVoice";
    pub const VOICE_TYPE: &str = "voiceType";
    pub const DEFAULT_LANGUAGE: &str = "defaultLanguage";
    pub const IS_LOGGED_IN: &str = "isLoggedIn";
    pub const AUTH_IDENTITY: &str = "authIdentity";
}

pub const FALLBACK_DEFAULT_LANGUAGE: &str = "English";

/// Languages offered when starting a voice conversation.
pub const PIPELINE_LANGUAGES: &[&str] = &[
    "Arabic", "Azerbaijani", "Chinese", "Dutch", "English", "Spanish", "French", "German", "Italian",
    "Japanese", "Turkish",
];

/// Languages offered by the free-text translation screen.
pub const TRANSLATION_LANGUAGES: &[&str] = &[
    "English", "Spanish", "French", "German", "Italian", "Japanese", "Chinese", "Arabic", "Turkish",
    "Dutch",
];

pub const DEFAULT_LANGUAGE_CHOICES: &[&str] = &["English", "Spanish", "Turkish", "French", "German"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceSelection {
    Male,
    Female,
}

impl VoiceSelection {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceSelection::Male => "Male",
            VoiceSelection::Female => "Female",
        }
    }

    pub fn voice(&self) -> Voice {
        Voice::from_selection(Some(self.as_str()))
    }
}

impl FromStr for VoiceSelection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Male" | "male" => Ok(VoiceSelection::Male),
            "Female" | "female" => Ok(VoiceSelection::Female),
            other => Err(anyhow!("unknown voice '{}', expected Male or Female", other)),
        }
    }
}

/// Typed view over the user-facing settings.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn SettingsStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    pub fn voice_selection(&self) -> VoiceSelection {
        match self.store.get(keys::SELECTED_VOICE).as_deref() {
            Some("Male") => VoiceSelection::Male,
            _ => VoiceSelection::Female,
        }
    }

    /// Stores the selection together with the derived voice name.
    pub fn set_voice_selection(&self, selection: VoiceSelection) -> Result<()> {
        self.store.set(keys::SELECTED_VOICE, selection.as_str())?;
        self.store.set(keys::VOICE_TYPE, selection.voice().as_str())
    }

    /// Voice for the next synthesis call, read fresh every time.
    pub fn voice(&self) -> Voice {
        Voice::from_selection(self.store.get(keys::SELECTED_VOICE).as_deref())
    }

    pub fn default_language(&self) -> String {
        self.store
            .get(keys::DEFAULT_LANGUAGE)
            .unwrap_or_else(|| FALLBACK_DEFAULT_LANGUAGE.to_string())
    }

    pub fn set_default_language(&self, language: &str) -> Result<()> {
        self.store.set(keys::DEFAULT_LANGUAGE, language)
    }
}
