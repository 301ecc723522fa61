//! Request payloads for the remote speech/chat API.
//!
//! Everything here is pure: the HTTP layer only serializes these and attaches
//! the bearer credential.

use serde::{Deserialize, Serialize};

use crate::types::AudioSegment;

pub const TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const CHAT_MODEL: &str = "gpt-4";
pub const SPEECH_MODEL: &str = "tts-1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Body of `POST /chat/completions`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Verbatim translation used by the voice pipeline.
    pub fn pipeline(target_language: &str, text: &str) -> Self {
        Self::with_instruction(pipeline_instruction(target_language), text)
    }

    /// Free-text translation between two explicit languages.
    pub fn direct(from: &str, to: &str, text: &str) -> Self {
        Self::with_instruction(direct_instruction(from, to), text)
    }

    fn with_instruction(instruction: String, text: &str) -> Self {
        Self {
            model: CHAT_MODEL.to_string(),
            messages: vec![
                ChatMessage { role: Role::System, content: instruction },
                ChatMessage { role: Role::User, content: text.to_string() },
            ],
        }
    }

    pub fn system_instruction(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    pub fn user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

pub fn pipeline_instruction(target_language: &str) -> String {
    format!(
        "You are a translator and your job is to translate whatever text given to you, \
         do not add anything else on your own, don't say anything other than the text \
         provided to you. You are translating the given text to this language: {}",
        target_language
    )
}

pub fn direct_instruction(from: &str, to: &str) -> String {
    format!(
        "You are a translator. Even though the user inputs the wrong text, translate it \
         to given language and don't add any comments to the answer. Translate the given \
         text from {} to {}.",
        from, to
    )
}

/// Synthesis voice. The settings screen offers "Male" and "Female".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Echo,
    Alloy,
}

impl Voice {
    pub fn from_selection(selection: Option<&str>) -> Self {
        match selection {
            Some("Male") => Voice::Echo,
            _ => Voice::Alloy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Echo => "echo",
            Voice::Alloy => "alloy",
        }
    }
}

/// Body of `POST /audio/speech`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpeechRequest {
    pub model: String,
    pub voice: Voice,
    pub input: String,
}

impl SpeechRequest {
    pub fn new(voice: Voice, text: &str) -> Self {
        Self {
            model: SPEECH_MODEL.to_string(),
            voice,
            input: text.to_string(),
        }
    }
}

/// Parts of the multipart `POST /audio/transcriptions` body. The boundary is
/// chosen by the HTTP layer, fresh for every upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptionUpload {
    pub model: String,
    pub audio: AudioSegment,
}

impl TranscriptionUpload {
    pub fn new(audio: AudioSegment) -> Self {
        Self {
            model: TRANSCRIPTION_MODEL.to_string(),
            audio,
        }
    }
}
