use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// MIME type of every recorded segment; the recorder writes AAC in an MPEG-4 container.
pub const RECORDING_MIME_TYPE: &str = "audio/m4a";
pub const RECORDING_FILE_NAME: &str = "recording.m4a";

/// MIME type of audio returned by the speech endpoint.
pub const SYNTHESIZED_MIME_TYPE: &str = "audio/mpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    Cached,
    Remote,
}

/// Bearer token for the speech/chat API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    value: String,
    origin: CredentialOrigin,
}

impl Credential {
    pub fn new(value: impl Into<String>, origin: CredentialOrigin) -> Self {
        Self {
            value: value.into(),
            origin,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn origin(&self) -> CredentialOrigin {
        self.origin
    }

    /// First few characters only, for logs.
    pub fn masked(&self) -> String {
        let prefix: String = self.value.chars().take(4).collect();
        format!("{}***", prefix)
    }
}

// Keep the token out of Debug output.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("value", &self.masked())
            .field("origin", &self.origin)
            .finish()
    }
}

/// Signed-in user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
    /// Token presented to the per-user document store.
    pub id_token: String,
    /// Exchanged for a new `id_token` once the current one is rejected or expired.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds at which `id_token` stops being accepted.
    #[serde(default)]
    pub expires_at: Option<u64>,
}

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: u64 = 60;

impl Identity {
    pub fn new(uid: impl Into<String>, id_token: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            id_token: id_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Identities without a known expiry never count as expired.
    pub fn is_expired_at(&self, now_unix_secs: u64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now_unix_secs + EXPIRY_MARGIN_SECS >= expires_at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// One captured recording, consumed exactly once by the transcription stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSegment {
    bytes: Vec<u8>,
    file_name: String,
    mime_type: String,
}

impl AudioSegment {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            mime_type: RECORDING_MIME_TYPE.to_string(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl SynthesizedAudio {
    pub fn mp3(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: SYNTHESIZED_MIME_TYPE.to_string(),
        }
    }
}
