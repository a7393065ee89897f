use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::session::RecordingState;

/// Code reported to hosts for every failed recording operation
pub const E_RECORDING_ERROR: &str = "E_RECORDING_ERROR";

/// Errors surfaced by the recorder's public operations
#[derive(Debug, Error)]
pub enum RecordingError {
    /// The PCM source could not be opened
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Operation not allowed in the current state
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: RecordingState,
    },

    /// The device came back with a different format on resume
    #[error("stream format changed on resume: {0}")]
    FormatChanged(String),

    /// Event name not known to the event hub
    #[error("invalid event '{0}'")]
    InvalidEvent(String),

    /// Temporary raw file could not be opened for writing
    #[error("failed to open raw sink {}: {source}", path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Capture thread could not be spawned or panicked
    #[error("capture worker failed: {0}")]
    Worker(String),

    /// Header bytes are not a canonical PCM WAV header
    #[error("invalid WAV header: {0}")]
    InvalidHeader(String),

    /// WAV finalization failed during stop
    #[error("recording failed: {0}")]
    Finalize(#[from] FinalizeError),
}

impl RecordingError {
    /// Host-visible error code; hosts get no structured detail beyond this
    pub fn code(&self) -> &'static str {
        E_RECORDING_ERROR
    }
}

/// Failures while turning the raw PCM file into the final WAV file
#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("failed to read raw PCM file {}: {source}", path.display())]
    ReadRaw {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open output file {}: {source}", path.display())]
    OpenOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("output file {} is not a compatible WAV file: {reason}", path.display())]
    IncompatibleOutput { path: PathBuf, reason: String },

    #[error("failed to write WAV header: {0}")]
    WriteHeader(#[source] io::Error),

    #[error("failed to write WAV payload: {0}")]
    WritePayload(#[source] io::Error),

    #[error("payload of {0} bytes exceeds the RIFF size limit")]
    TooLarge(u64),

    #[error("finalize task failed: {0}")]
    Task(String),
}

/// Per-block read failures reported by a PCM stream; never fatal to the capture loop
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Device reported the read as invalid (stream not started, source exhausted)
    #[error("invalid read operation")]
    InvalidOperation,

    /// No data arrived within the stream's read timeout
    #[error("read timed out")]
    Timeout,

    /// Transient device-side failure
    #[error("device read error: {0}")]
    Device(String),
}
