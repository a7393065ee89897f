use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::PcmFormat;

/// Directory name used under the platform data directory
const APP_DIR_NAME: &str = "wav-recorder";

/// Configuration for the recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory for the output and temporary files
    /// Default: platform local data directory + "wav-recorder"
    pub wav_file_dir: Option<PathBuf>,

    /// Output WAV file name
    pub wav_file: String,

    /// Temporary raw PCM file name
    pub temp_file: String,

    /// Requested sample rate (the device may report another)
    pub sample_rate: u32,

    /// Requested channel count (the device may report another)
    pub channels: u16,

    /// Audio per capture block in milliseconds
    pub buffer_duration_ms: u64,

    /// Explicit block size in bytes; overrides `buffer_duration_ms`
    pub buffer_size: Option<usize>,

    /// Amplitude reporter period in milliseconds
    pub amplitude_interval_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            wav_file_dir: None,
            wav_file: "audio.wav".to_string(),
            temp_file: "temp.pcm".to_string(),
            sample_rate: 44100,
            channels: 2,
            buffer_duration_ms: 20,
            buffer_size: None,
            amplitude_interval_ms: 50,
        }
    }
}

impl RecorderConfig {
    /// Apply the host's init options on top of this configuration
    pub fn with_options(mut self, options: &InitOptions) -> Self {
        if let Some(dir) = &options.wav_file_dir {
            self.wav_file_dir = Some(expand_path(dir));
        }
        if let Some(file) = &options.wav_file {
            self.wav_file = file.clone();
        }
        self
    }

    pub fn requested_format(&self) -> PcmFormat {
        PcmFormat::new(self.sample_rate, self.channels)
    }

    /// Block size in bytes for the requested format
    pub fn buffer_size(&self) -> usize {
        self.buffer_size_for(&self.requested_format())
    }

    /// Block size in bytes for the format the device actually delivers
    ///
    /// An explicit size is rounded down to whole frames, keeping at least one.
    pub fn buffer_size_for(&self, format: &PcmFormat) -> usize {
        let frame = (format.block_align() as usize).max(1);
        match self.buffer_size.filter(|size| *size > 0) {
            Some(size) => (size / frame).max(1) * frame,
            None => format.buffer_size_for(self.buffer_duration_ms),
        }
    }

    pub fn amplitude_interval(&self) -> Duration {
        Duration::from_millis(self.amplitude_interval_ms.max(1))
    }

    pub fn directory(&self) -> PathBuf {
        self.wav_file_dir.clone().unwrap_or_else(default_directory)
    }

    pub fn paths(&self) -> SessionPaths {
        let dir = self.directory();
        SessionPaths {
            output: dir.join(&self.wav_file),
            temp: dir.join(&self.temp_file),
        }
    }
}

/// Options passed by the host to `init`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitOptions {
    /// Directory for the output file; `~` is expanded
    pub wav_file_dir: Option<String>,
    /// Output file name
    pub wav_file: Option<String>,
}

/// Files used by one recording session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionPaths {
    /// Final WAV file
    pub output: PathBuf,
    /// Raw PCM accumulated while recording
    pub temp: PathBuf,
}

/// Expand a leading `~` in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn default_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}
