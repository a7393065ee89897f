use serde::{Deserialize, Serialize};

/// Only 16-bit signed PCM is captured
pub const BITS_PER_SAMPLE: u16 = 16;

/// PCM layout of a capture stream (interleaved, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Bits per sample
    pub bits_per_sample: u16,
}

impl PcmFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: BITS_PER_SAMPLE,
        }
    }

    /// Bytes per frame (one sample for every channel)
    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    /// Bytes per second of audio
    pub fn byte_rate(&self) -> u32 {
        self.bits_per_sample as u32 * self.sample_rate * self.channels as u32 / 8
    }

    /// Size in bytes of a buffer holding `duration_ms` of audio, rounded down to whole
    /// frames and never smaller than one frame
    pub fn buffer_size_for(&self, duration_ms: u64) -> usize {
        let frames = (self.sample_rate as u64 * duration_ms / 1000).max(1);
        frames as usize * self.block_align() as usize
    }

    /// Playback duration of `bytes` of audio in this format
    pub fn duration_secs(&self, bytes: u64) -> f64 {
        let rate = self.byte_rate();
        if rate == 0 {
            return 0.0;
        }
        bytes as f64 / rate as f64
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::new(44100, 2)
    }
}
