pub mod capture;
pub mod file;
pub mod format;
pub mod source;
pub mod synthetic;
pub mod wav;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use capture::{last_sample, CaptureLoop, CaptureReport};
pub use file::{AudioFile, FileSource};
pub use format::{PcmFormat, BITS_PER_SAMPLE};
pub use source::{PcmSource, PcmSourceFactory, PcmSourceKind, PcmStream, StreamParams};
pub use synthetic::SineSource;
pub use wav::{finalize_wav, WavHeader, HEADER_LEN};
