use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use translator_core::ports::AudioRecorder;
use translator_core::types::RECORDING_FILE_NAME;
use translator_core::AudioSegment;

/// Recorder backed by a clip captured ahead of time. Stopping reads the
/// whole file into a segment; the upload name is always `recording.m4a`.
pub struct FileRecorder {
    path: PathBuf,
    recording: bool,
}

impl FileRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recording: false,
        }
    }
}

impl AudioRecorder for FileRecorder {
    fn start_recording(&mut self) -> Result<()> {
        if !self.path.is_file() {
            bail!("audio file {} does not exist", self.path.display());
        }
        self.recording = true;
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<AudioSegment> {
        if !self.recording {
            bail!("not recording");
        }
        self.recording = false;
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read audio file {}", self.path.display()))?;
        Ok(AudioSegment::new(bytes, RECORDING_FILE_NAME))
    }

    fn is_recording(&self) -> bool {
        self.recording
    }
}
