use std::fmt;

use crate::error::StageFailure;
use crate::types::SynthesizedAudio;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    CredentialPending,
    Transcribing,
    Completing,
    Synthesizing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "Idle"),
            PipelineState::CredentialPending => write!(f, "CredentialPending"),
            PipelineState::Transcribing => write!(f, "Transcribing"),
            PipelineState::Completing => write!(f, "Completing"),
            PipelineState::Synthesizing => write!(f, "Synthesizing"),
        }
    }
}

pub struct PipelineStateMachine {
    current_state: PipelineState,
}

impl PipelineStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: PipelineState::Idle,
        }
    }

    pub fn current_state(&self) -> PipelineState {
        self.current_state
    }

    pub fn can_transition_to(&self, new_state: PipelineState) -> bool {
        use PipelineState::*;
        match (self.current_state, new_state) {
            (Idle, CredentialPending) => true,
            (CredentialPending, Transcribing) => true,
            (Transcribing, Completing) => true,
            (Completing, Synthesizing) => true,
            // Success or failure, every state can fall back to Idle.
            (_, Idle) => true,
            _ => false,
        }
    }

    pub fn transition_to(&mut self, new_state: PipelineState) -> Result<(), String> {
        if self.can_transition_to(new_state) {
            self.current_state = new_state;
            Ok(())
        } else {
            Err(format!(
                "Invalid pipeline transition from {} to {}",
                self.current_state, new_state
            ))
        }
    }

    pub fn reset(&mut self) {
        self.current_state = PipelineState::Idle;
    }
}

impl Default for PipelineStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Which language the next turn translates into.
///
/// Starts at the selected language and flips between it and the default
/// language after every turn that produced a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineTurnState {
    pub selected_language: String,
    pub default_language: String,
    pub current_target_language: String,
}

impl PipelineTurnState {
    pub fn new(selected_language: &str, default_language: &str) -> Self {
        Self {
            selected_language: selected_language.to_string(),
            default_language: default_language.to_string(),
            current_target_language: selected_language.to_string(),
        }
    }

    pub fn toggle(&mut self) {
        self.current_target_language = if self.current_target_language == self.selected_language {
            self.default_language.clone()
        } else {
            self.selected_language.clone()
        };
    }
}

/// Progress notifications, delivered while the turn runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    StateChanged(PipelineState),
    Transcribed(String),
    Replied(String),
    Synthesized(SynthesizedAudio),
    PlaybackFailed(String),
    Failed(StageFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed(SynthesizedAudio),
    Failed(StageFailure),
    /// Another turn was still in flight; nothing was done.
    Rejected,
}

/// Everything a caller needs to render one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub target_language: String,
    pub transcript: Option<String>,
    pub reply: Option<String>,
    pub outcome: TurnOutcome,
}

impl TurnReport {
    pub(crate) fn new(target_language: String) -> Self {
        Self {
            target_language,
            transcript: None,
            reply: None,
            outcome: TurnOutcome::Rejected,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, TurnOutcome::Completed(_))
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match &self.outcome {
            TurnOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Transcript, or the fallback text when transcription did not succeed.
    pub fn transcript_text(&self) -> String {
        self.transcript
            .clone()
            .unwrap_or_else(|| "Transcription failed".to_string())
    }

    /// Reply, or the fallback text when a transcript existed but no reply came back.
    pub fn reply_text(&self) -> Option<String> {
        match (&self.transcript, &self.reply) {
            (_, Some(reply)) => Some(reply.clone()),
            (Some(_), None) => Some("Failed to get response from chat completion".to_string()),
            (None, None) => None,
        }
    }
}
