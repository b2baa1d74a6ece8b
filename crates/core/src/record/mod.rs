use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{Bitmap, Frame, Result};

/// Configuration options for the recording subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSettings {
    pub output_dir: PathBuf,
    pub prefix: String,
    /// Keep one frame out of every `every` delivered.
    pub every: u64,
}

impl RecordingSettings {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("frames"),
            prefix: "frame".to_string(),
            every: 1,
        }
    }
}

/// Writes delivered frames to numbered PNG files.
#[derive(Debug)]
pub struct Recorder {
    settings: RecordingSettings,
    is_recording: bool,
    written: usize,
}

impl Recorder {
    pub fn new(settings: RecordingSettings) -> Self {
        Self {
            settings,
            is_recording: false,
            written: 0,
        }
    }

    /// Creates the output directory and starts accepting frames.
    pub fn start(&mut self) -> Result<()> {
        fs::create_dir_all(&self.settings.output_dir)?;
        self.is_recording = true;
        tracing::debug!(dir = %self.settings.output_dir.display(), "recording frames");
        Ok(())
    }

    pub fn stop(&mut self) {
        self.is_recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn output_dir(&self) -> &Path {
        &self.settings.output_dir
    }

    /// Saves `frame` if recording and the frame falls on the sampling
    /// stride. Skipped frames (no bitmap) are ignored.
    pub fn record(&mut self, frame: &Frame) -> Result<Option<PathBuf>> {
        if !self.is_recording || frame.index % self.settings.every.max(1) != 0 {
            return Ok(None);
        }
        match &frame.bitmap {
            Some(bitmap) => self.write(frame.index, bitmap).map(Some),
            None => Ok(None),
        }
    }

    /// Saves a bitmap under an explicit index, regardless of sampling.
    pub fn write(&mut self, index: u64, bitmap: &Bitmap) -> Result<PathBuf> {
        let path = self.frame_path(index);
        bitmap.save_png(&path)?;
        self.written += 1;
        Ok(path)
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.settings
            .output_dir
            .join(format!("{}-{index:05}.png", self.settings.prefix))
    }
}
