// Synthetic PCM source
//
// Generates a continuous sine tone and paces reads to wall-clock time so the
// capture loop sees the same cadence it would get from a real input device.

use std::f32::consts::TAU;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::format::PcmFormat;
use super::source::{PcmSource, PcmStream, StreamParams};
use crate::error::{ReadError, RecordingError};

/// Sine tone generator
pub struct SineSource {
    frequency_hz: f32,
    level: f32,
}

impl SineSource {
    /// `level` is the peak amplitude relative to full scale (0.0 to 1.0)
    pub fn new(frequency_hz: f32, level: f32) -> Self {
        Self {
            frequency_hz,
            level: level.clamp(0.0, 1.0),
        }
    }
}

impl PcmSource for SineSource {
    fn open(&self, params: &StreamParams) -> Result<Box<dyn PcmStream>, RecordingError> {
        let format = params.format;
        if format.sample_rate == 0 || format.channels == 0 {
            return Err(RecordingError::DeviceUnavailable(format!(
                "unsupported format {}Hz / {} channels",
                format.sample_rate, format.channels
            )));
        }

        info!(
            "Synthetic source opened: {:.1}Hz tone, {}Hz, {} channels",
            self.frequency_hz, format.sample_rate, format.channels
        );

        Ok(Box::new(SineStream {
            format,
            phase: 0.0,
            step: TAU * self.frequency_hz / format.sample_rate as f32,
            peak: self.level * i16::MAX as f32,
            started_at: Instant::now(),
            delivered_bytes: 0,
            open: true,
        }))
    }

    fn name(&self) -> &str {
        "synthetic sine"
    }
}

struct SineStream {
    format: PcmFormat,
    phase: f32,
    step: f32,
    peak: f32,
    started_at: Instant,
    delivered_bytes: u64,
    open: bool,
}

impl SineStream {
    /// Sleep until the wall clock has caught up with the audio delivered so far
    fn pace(&self) {
        let due = Duration::from_secs_f64(self.format.duration_secs(self.delivered_bytes));
        let elapsed = self.started_at.elapsed();
        if due > elapsed {
            thread::sleep(due - elapsed);
        }
    }
}

impl PcmStream for SineStream {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        if !self.open {
            return Err(ReadError::InvalidOperation);
        }

        let frame_bytes = 2 * self.format.channels as usize;
        let mut frames = buf.chunks_exact_mut(frame_bytes);
        for frame in &mut frames {
            let sample = (self.phase.sin() * self.peak) as i16;
            for slot in frame.chunks_exact_mut(2) {
                slot.copy_from_slice(&sample.to_le_bytes());
            }
            self.phase = (self.phase + self.step) % TAU;
        }
        frames.into_remainder().fill(0);

        self.delivered_bytes += buf.len() as u64;
        self.pace();

        Ok(buf.len())
    }

    fn close(&mut self) {
        if self.open {
            debug!(
                "Synthetic stream closed after {} bytes",
                self.delivered_bytes
            );
        }
        self.open = false;
    }
}
