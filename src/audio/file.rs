use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use hound::WavReader;
use tracing::{debug, info};

use super::format::PcmFormat;
use super::source::{PcmSource, PcmStream, StreamParams};
use crate::error::{ReadError, RecordingError};

/// Back-off before reporting an exhausted file stream as an invalid read
const EXHAUSTED_BACKOFF: Duration = Duration::from_millis(5);

/// A WAV file loaded through hound
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Unsupported WAV encoding: {}-bit {:?} (expected 16-bit PCM)",
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            samples,
        })
    }

    pub fn format(&self) -> PcmFormat {
        PcmFormat::new(self.sample_rate, self.channels)
    }

    /// Samples as interleaved little-endian bytes
    pub fn pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// PCM source that plays a WAV file through the capture pipeline
///
/// Every `open` starts again from the beginning of the file. The file's own format
/// wins over the requested one, the same way a device reports what it actually
/// delivers. Once the samples run out, reads report `InvalidOperation`.
pub struct FileSource {
    path: PathBuf,
    realtime: bool,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            realtime: false,
        }
    }

    /// Pace reads to the file's sample rate
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

impl PcmSource for FileSource {
    fn open(&self, _params: &StreamParams) -> Result<Box<dyn PcmStream>, RecordingError> {
        let audio = AudioFile::open(&self.path)
            .map_err(|e| RecordingError::DeviceUnavailable(format!("{:#}", e)))?;

        Ok(Box::new(FileStream {
            format: audio.format(),
            data: audio.pcm_bytes(),
            position: 0,
            realtime: self.realtime,
            started_at: Instant::now(),
            open: true,
        }))
    }

    fn name(&self) -> &str {
        "wav file"
    }
}

struct FileStream {
    format: PcmFormat,
    data: Vec<u8>,
    position: usize,
    realtime: bool,
    started_at: Instant,
    open: bool,
}

impl PcmStream for FileStream {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        if !self.open || self.position >= self.data.len() {
            thread::sleep(EXHAUSTED_BACKOFF);
            return Err(ReadError::InvalidOperation);
        }

        let end = (self.position + buf.len()).min(self.data.len());
        let read = end - self.position;
        buf[..read].copy_from_slice(&self.data[self.position..end]);
        self.position = end;

        if self.realtime {
            let due = Duration::from_secs_f64(self.format.duration_secs(self.position as u64));
            let elapsed = self.started_at.elapsed();
            if due > elapsed {
                thread::sleep(due - elapsed);
            }
        }

        Ok(read)
    }

    fn close(&mut self) {
        self.open = false;
    }
}
