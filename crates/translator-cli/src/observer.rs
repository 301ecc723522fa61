use async_trait::async_trait;
use tracing::{debug, warn};

use translator_core::ports::TurnObserver;
use translator_core::TurnEvent;

/// Prints stage results to stdout as soon as they arrive.
pub struct ConsoleObserver;

#[async_trait]
impl TurnObserver for ConsoleObserver {
    async fn notify(&self, event: TurnEvent) {
        let line = match event {
            TurnEvent::StateChanged(state) => {
                debug!(%state, "pipeline state");
                return;
            }
            TurnEvent::Transcribed(text) => format!("  you said: {}", text),
            TurnEvent::Replied(text) => format!("  reply:    {}", text),
            TurnEvent::Synthesized(audio) => format!("  audio:    {} bytes ({})", audio.bytes.len(), audio.content_type),
            TurnEvent::PlaybackFailed(reason) => {
                warn!(%reason, "playback failed");
                format!("  playback failed: {}", reason)
            }
            TurnEvent::Failed(failure) => format!("  {}", failure.fallback_message()),
        };
        println!("{}", line);
    }
}
