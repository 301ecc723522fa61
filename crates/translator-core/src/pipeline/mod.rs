mod state;

pub use state::{
    PipelineState, PipelineStateMachine, PipelineTurnState, TurnEvent, TurnOutcome, TurnReport,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::credential::CredentialStore;
use crate::error::{Stage, StageFailure};
use crate::ports::{AudioPlayer, SpeechApi, TurnObserver};
use crate::preferences::Preferences;
use crate::request::{ChatRequest, SpeechRequest, TranscriptionUpload};
use crate::types::{AudioSegment, SynthesizedAudio};

/// Runs record -> transcribe -> translate -> synthesize -> play, one turn at a time.
pub struct PipelineOrchestrator<A: SpeechApi, P: AudioPlayer, O: TurnObserver> {
    api: A,
    player: P,
    observer: O,
    credentials: CredentialStore,
    preferences: Preferences,
    machine: Mutex<PipelineStateMachine>,
    conversation: Mutex<Conversation>,
    busy: AtomicBool,
}

/// Turn state tagged with the `enter` call that created it. A turn started
/// under an older generation must not toggle the newer conversation.
struct Conversation {
    generation: u64,
    turn: PipelineTurnState,
}

/// Clears the busy flag even if the turn future is dropped midway.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<A: SpeechApi, P: AudioPlayer, O: TurnObserver> PipelineOrchestrator<A, P, O> {
    pub fn new(
        api: A,
        player: P,
        observer: O,
        credentials: CredentialStore,
        preferences: Preferences,
        selected_language: &str,
    ) -> Self {
        let turn = PipelineTurnState::new(selected_language, &preferences.default_language());
        Self {
            api,
            player,
            observer,
            credentials,
            preferences,
            machine: Mutex::new(PipelineStateMachine::new()),
            conversation: Mutex::new(Conversation { generation: 0, turn }),
            busy: AtomicBool::new(false),
        }
    }

    /// Re-enters the conversation with a (possibly new) selected language.
    /// The target language starts over at `selected_language`.
    ///
    /// A turn still in flight finishes normally but no longer toggles the
    /// target language, and keeps the state machine until it returns to idle.
    pub fn enter(&self, selected_language: &str) {
        let turn = PipelineTurnState::new(selected_language, &self.preferences.default_language());
        info!(selected = %turn.selected_language, default = %turn.default_language, "pipeline entered");
        {
            let mut conversation = self.conversation.lock().unwrap_or_else(|e| e.into_inner());
            conversation.generation += 1;
            conversation.turn = turn;
        }

        let mut machine = self.machine.lock().unwrap_or_else(|e| e.into_inner());
        if !self.is_busy() {
            machine.reset();
        }
    }

    pub fn state(&self) -> PipelineState {
        self.machine.lock().unwrap_or_else(|e| e.into_inner()).current_state()
    }

    pub fn turn_state(&self) -> PipelineTurnState {
        self.conversation.lock().unwrap_or_else(|e| e.into_inner()).turn.clone()
    }

    pub fn current_target_language(&self) -> String {
        self.turn_state().current_target_language
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Runs one full turn for a captured segment.
    ///
    /// Never fails outright: stage failures end the turn and are reported in
    /// the returned [`TurnReport`], and a call made while another turn is in
    /// flight is answered with [`TurnOutcome::Rejected`].
    pub async fn run_turn(&self, audio: AudioSegment) -> TurnReport {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("turn rejected, another turn is still in flight");
            return TurnReport::new(self.current_target_language());
        }
        let _busy = BusyGuard(&self.busy);
        self.machine.lock().unwrap_or_else(|e| e.into_inner()).reset();

        let (generation, target_language) = {
            let conversation = self.conversation.lock().unwrap_or_else(|e| e.into_inner());
            (conversation.generation, conversation.turn.current_target_language.clone())
        };
        let mut report = TurnReport::new(target_language.clone());

        let turn_id = Uuid::new_v4();
        info!(%turn_id, target = %target_language, bytes = audio.bytes().len(), "turn started");

        let result = self.drive(audio, generation, &target_language, &mut report).await;
        report.outcome = match result {
            Ok(audio) => {
                info!(%turn_id, "turn completed");
                TurnOutcome::Completed(audio)
            }
            Err(failure) => {
                warn!(%turn_id, stage = %failure.stage, error = %failure.error, "turn failed");
                self.observer.notify(TurnEvent::Failed(failure.clone())).await;
                TurnOutcome::Failed(failure)
            }
        };

        self.set_state(PipelineState::Idle).await;
        report
    }

    async fn drive(
        &self,
        audio: AudioSegment,
        generation: u64,
        target_language: &str,
        report: &mut TurnReport,
    ) -> Result<SynthesizedAudio, StageFailure> {
        self.set_state(PipelineState::CredentialPending).await;
        let credential = self
            .credentials
            .credential()
            .await
            .map_err(|e| StageFailure::new(Stage::Credential, e))?;
        debug!(credential = %credential.masked(), "credential ready");

        self.set_state(PipelineState::Transcribing).await;
        let transcript = self
            .api
            .transcribe(&credential, &TranscriptionUpload::new(audio))
            .await
            .map_err(|e| StageFailure::new(Stage::Transcription, e))?;
        report.transcript = Some(transcript.clone());
        self.observer.notify(TurnEvent::Transcribed(transcript.clone())).await;

        self.set_state(PipelineState::Completing).await;
        let reply = self
            .api
            .complete(&credential, &ChatRequest::pipeline(target_language, &transcript))
            .await
            .map_err(|e| StageFailure::new(Stage::Completion, e))?;
        report.reply = Some(reply.clone());
        self.observer.notify(TurnEvent::Replied(reply.clone())).await;

        // The next turn answers in the other language no matter how synthesis goes.
        self.toggle_target_language(generation);

        self.set_state(PipelineState::Synthesizing).await;
        let speech = SpeechRequest::new(self.preferences.voice(), &reply);
        let audio = self
            .api
            .synthesize(&credential, &speech)
            .await
            .map_err(|e| StageFailure::new(Stage::Synthesis, e))?;
        self.observer.notify(TurnEvent::Synthesized(audio.clone())).await;

        if let Err(e) = self.player.play(&audio).await {
            warn!(error = %e, "failed to play synthesized audio");
            self.observer.notify(TurnEvent::PlaybackFailed(e.to_string())).await;
        }

        Ok(audio)
    }

    fn toggle_target_language(&self, generation: u64) {
        let mut conversation = self.conversation.lock().unwrap_or_else(|e| e.into_inner());
        if conversation.generation != generation {
            debug!("conversation re-entered during the turn, target language kept");
            return;
        }
        conversation.turn.toggle();
        debug!(next = %conversation.turn.current_target_language, "target language toggled");
    }

    async fn set_state(&self, state: PipelineState) {
        let changed = {
            let mut machine = self.machine.lock().unwrap_or_else(|e| e.into_inner());
            match machine.transition_to(state) {
                Ok(()) => true,
                Err(e) => {
                    error!("{}", e);
                    false
                }
            }
        };
        if changed {
            self.observer.notify(TurnEvent::StateChanged(state)).await;
        }
    }
}
