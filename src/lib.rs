pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod session;

pub use audio::{
    finalize_wav, AudioFile, CaptureReport, FileSource, PcmFormat, PcmSource, PcmSourceFactory,
    PcmSourceKind, PcmStream, SineSource, StreamParams, WavHeader,
};
pub use config::Config;
pub use error::{FinalizeError, ReadError, RecordingError, E_RECORDING_ERROR};
pub use events::{
    AmplitudeEvent, ChannelSink, EmittedEvent, EventHub, EventSink, RecorderEvent, TracingSink,
};
pub use session::{AudioRecorder, InitOptions, RecorderConfig, RecordingState, RecordingStats};
