use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::pipeline::{PipelineOrchestrator, TurnReport};
use crate::ports::{AudioPlayer, AudioRecorder, SpeechApi, TurnObserver};

/// Record button behaviour: the first press starts capturing, the second
/// stops and hands the segment to the pipeline.
pub struct RecordingSession<A: SpeechApi, P: AudioPlayer, O: TurnObserver> {
    recorder: Box<dyn AudioRecorder>,
    orchestrator: Arc<PipelineOrchestrator<A, P, O>>,
}

impl<A: SpeechApi, P: AudioPlayer, O: TurnObserver> RecordingSession<A, P, O> {
    pub fn new(recorder: Box<dyn AudioRecorder>, orchestrator: Arc<PipelineOrchestrator<A, P, O>>) -> Self {
        Self {
            recorder,
            orchestrator,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Returns the turn report when this press ended a recording.
    pub async fn toggle_recording(&mut self) -> Result<Option<TurnReport>> {
        if !self.is_recording() {
            self.recorder.start_recording()?;
            info!("recording started");
            return Ok(None);
        }

        let segment = self.recorder.stop_recording()?;
        if segment.is_empty() {
            warn!("no audio recorded");
            return Ok(None);
        }
        info!(bytes = segment.bytes().len(), "recording stopped");
        Ok(Some(self.orchestrator.run_turn(segment).await))
    }
}
