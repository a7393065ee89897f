use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use super::format::PcmFormat;
use crate::error::{ReadError, RecordingError};

/// Parameters requested when opening a capture stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Requested format; the device may report a different channel count
    pub format: PcmFormat,
    /// Size in bytes of every block handed to the capture loop
    pub buffer_size: usize,
}

/// An open capture stream producing interleaved 16-bit little-endian PCM
///
/// Streams are moved onto the capture thread, so they must be `Send`.
pub trait PcmStream: Send {
    /// Format actually delivered by the device
    fn format(&self) -> PcmFormat;

    /// Block until `buf` is filled with one block of samples
    ///
    /// Returns the number of bytes read. Anything less than `buf.len()` is a short read
    /// and is discarded by the capture loop.
    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, ReadError>;

    /// Release the device; further reads return `ReadError::InvalidOperation`
    fn close(&mut self);
}

/// Capture device driver
///
/// Implementations:
/// - Microphone: cpal default input device (`microphone` feature)
/// - Synthetic: generated sine tone, paced like a real device
/// - File: samples read from a WAV file (for testing/batch processing)
pub trait PcmSource: Send + Sync {
    /// Open a new stream; called on every start and resume
    fn open(&self, params: &StreamParams) -> Result<Box<dyn PcmStream>, RecordingError>;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// PCM source type
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PcmSourceKind {
    /// Default input device (requires the `microphone` feature)
    Microphone,
    /// Sine tone generator
    Synthetic {
        #[serde(default = "default_frequency_hz")]
        frequency_hz: f32,
        #[serde(default = "default_level")]
        level: f32,
    },
    /// WAV file played back as if it were a device
    File {
        path: PathBuf,
        #[serde(default = "default_realtime")]
        realtime: bool,
    },
}

fn default_frequency_hz() -> f32 {
    440.0
}

fn default_level() -> f32 {
    0.5
}

fn default_realtime() -> bool {
    true
}

impl Default for PcmSourceKind {
    fn default() -> Self {
        Self::Microphone
    }
}

/// PCM source factory
pub struct PcmSourceFactory;

impl PcmSourceFactory {
    /// Create a PCM source for the given kind
    pub fn create(kind: &PcmSourceKind) -> Result<Arc<dyn PcmSource>, RecordingError> {
        match kind {
            PcmSourceKind::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    Ok(Arc::new(super::microphone::MicrophoneSource::new()))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    Err(RecordingError::DeviceUnavailable(
                        "microphone capture requires the `microphone` feature".to_string(),
                    ))
                }
            }

            PcmSourceKind::Synthetic {
                frequency_hz,
                level,
            } => Ok(Arc::new(super::synthetic::SineSource::new(*frequency_hz, *level))),

            PcmSourceKind::File { path, realtime } => Ok(Arc::new(
                super::file::FileSource::new(path.clone()).realtime(*realtime),
            )),
        }
    }
}
