//! Recording session management
//!
//! This module provides the `AudioRecorder` controller that manages:
//! - The Idle / Recording / Paused lifecycle
//! - The capture thread for each recording span
//! - The periodic amplitude reporter
//! - WAV finalization on stop

mod config;
mod recorder;
mod reporter;
mod state;
mod stats;

pub use config::{expand_path, InitOptions, RecorderConfig, SessionPaths};
pub use recorder::AudioRecorder;
pub use reporter::AmplitudeReporter;
pub use state::{RecordingState, SharedState};
pub use stats::RecordingStats;
