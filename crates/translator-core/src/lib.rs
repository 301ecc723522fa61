//! Headless core of the voice translator: credential handling, request
//! payloads, the record -> transcribe -> translate -> speak pipeline and
//! one-shot text translation. Collaborators (HTTP API, auth, settings,
//! audio devices) plug in through [`ports`].

pub mod credential;
pub mod error;
pub mod mocks;
pub mod pipeline;
pub mod ports;
pub mod preferences;
pub mod recording;
pub mod request;
pub mod translation;
pub mod types;
pub mod user_session;

pub use credential::{CredentialStore, DEFAULT_CREDENTIAL_WAIT};
pub use error::{ServiceError, Stage, StageFailure};
pub use pipeline::{PipelineOrchestrator, PipelineState, PipelineTurnState, TurnEvent, TurnOutcome, TurnReport};
pub use preferences::{Preferences, VoiceSelection};
pub use recording::RecordingSession;
pub use request::{ChatRequest, SpeechRequest, TranscriptionUpload, Voice};
pub use translation::TranslationService;
pub use types::{AudioSegment, Credential, CredentialOrigin, Identity, SynthesizedAudio};
pub use user_session::UserSession;
