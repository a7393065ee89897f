use std::fmt;
use std::sync::atomic::{AtomicI16, AtomicU8, Ordering};

use serde::Serialize;

/// Recording lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum RecordingState {
    /// No session; `start` is allowed
    Idle = 0,
    /// Capture thread running
    Recording = 1,
    /// Capture thread gone, raw file kept for `resume`
    Paused = 2,
    /// `stop` in progress: joining capture and finalizing
    Stopped = 3,
}

impl RecordingState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Recording,
            2 => Self::Paused,
            3 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Scalars shared between the controller, the capture thread and the reporter
///
/// Both values are plain atomics. Readers may see an amplitude that is one block
/// stale; that is fine for a level meter.
#[derive(Debug)]
pub struct SharedState {
    state: AtomicU8,
    amplitude: AtomicI16,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RecordingState::Idle as u8),
            amplitude: AtomicI16::new(0),
        }
    }

    pub fn state(&self) -> RecordingState {
        RecordingState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// Only the session controller drives transitions
    pub(crate) fn set_state(&self, state: RecordingState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Signed value of the most recently captured sample
    pub fn amplitude(&self) -> i16 {
        self.amplitude.load(Ordering::Relaxed)
    }

    pub(crate) fn set_amplitude(&self, sample: i16) {
        self.amplitude.store(sample, Ordering::Relaxed);
    }

    /// Absolute amplitude while recording, `-1` otherwise
    pub fn max_amplitude(&self) -> i32 {
        if self.is_recording() {
            self.amplitude().unsigned_abs() as i32
        } else {
            -1
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
