use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::state::RecordingState;
use crate::audio::PcmFormat;

/// Snapshot of the recorder
#[derive(Debug, Clone, Serialize)]
pub struct RecordingStats {
    /// Current lifecycle state
    pub state: RecordingState,

    /// Active session, if any
    pub session_id: Option<Uuid>,

    /// When the active session started
    pub started_at: Option<DateTime<Utc>>,

    /// Wall-clock seconds since the session started
    pub elapsed_secs: f64,

    /// Raw PCM bytes captured so far in the active session
    pub bytes_captured: u64,

    /// Audio duration represented by `bytes_captured`
    pub audio_secs: f64,

    /// Format of the active session
    pub format: Option<PcmFormat>,

    /// Where `stop` will write the WAV file
    pub output_path: PathBuf,
}
