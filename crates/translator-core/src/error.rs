use std::fmt;
use thiserror::Error;

/// Failures surfaced by the remote speech/chat API, the auth provider and the
/// credential store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("API credential is not available")]
    CredentialUnavailable,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unexpected response shape: {0}")]
    MalformedResponse(String),

    #[error("remote API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl ServiceError {
    /// The remote side refused the presented token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ServiceError::Status { status: 401 | 403, .. })
    }
}

/// The step of a turn (or of a one-shot translation) that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Credential,
    Transcription,
    Completion,
    Synthesis,
    Translation,
}

impl Stage {
    /// Text shown in place of real output when this stage fails.
    pub fn fallback_message(&self) -> &'static str {
        match self {
            Stage::Credential => "API key is not available",
            Stage::Transcription => "Transcription failed",
            Stage::Completion => "Failed to get response from chat completion",
            Stage::Synthesis => "Speech synthesis failed",
            Stage::Translation => "Translation failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Credential => write!(f, "credential"),
            Stage::Transcription => write!(f, "transcription"),
            Stage::Completion => write!(f, "completion"),
            Stage::Synthesis => write!(f, "synthesis"),
            Stage::Translation => write!(f, "translation"),
        }
    }
}

/// A terminal failure for one turn or one translation call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} stage failed: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    pub error: ServiceError,
}

impl StageFailure {
    pub fn new(stage: Stage, error: ServiceError) -> Self {
        Self { stage, error }
    }

    pub fn fallback_message(&self) -> &'static str {
        self.stage.fallback_message()
    }
}
