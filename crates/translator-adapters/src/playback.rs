use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use translator_core::ports::AudioPlayer;
use translator_core::SynthesizedAudio;

pub const SCRATCH_FILE_NAME: &str = "response.mp3";

/// Writes each reply to one scratch file, overwriting the previous one, and
/// optionally hands it to an external player command.
pub struct ScratchPlayer {
    path: PathBuf,
    command: Option<String>,
}

impl ScratchPlayer {
    pub fn new(dir: impl AsRef<Path>, command: Option<String>) -> Self {
        Self {
            path: dir.as_ref().join(SCRATCH_FILE_NAME),
            command,
        }
    }

    /// Scratch file in the system temp directory.
    pub fn in_temp_dir(command: Option<String>) -> Self {
        Self::new(std::env::temp_dir(), command)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AudioPlayer for ScratchPlayer {
    async fn play(&self, audio: &SynthesizedAudio) -> Result<()> {
        tokio::fs::write(&self.path, &audio.bytes)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        debug!(path = %self.path.display(), bytes = audio.bytes.len(), "reply audio written");

        let Some(command) = self.command.as_deref() else {
            info!(path = %self.path.display(), "no player configured, reply saved");
            return Ok(());
        };

        let status = Command::new(command)
            .arg(&self.path)
            .status()
            .await
            .with_context(|| format!("Failed to launch player '{}'", command))?;
        if !status.success() {
            return Err(anyhow!("player '{}' exited with {}", command, status));
        }
        Ok(())
    }
}
