// Shared helpers for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use wav_recorder::audio::{PcmFormat, PcmSource, PcmStream, StreamParams};
use wav_recorder::{ReadError, RecorderConfig, RecordingError};

/// Block size used by scripted recordings
pub const BLOCK: usize = 8;

/// PCM source that replays a fixed list of blocks for every `open`
///
/// Each call to `open` takes the next span of blocks. Once a span runs out,
/// reads report `InvalidOperation` the way an idle device would. Streams echo the
/// requested format unless scripted formats are given.
pub struct ScriptedSource {
    spans: Mutex<VecDeque<Vec<Vec<u8>>>>,
    formats: Mutex<VecDeque<PcmFormat>>,
    served: Arc<AtomicUsize>,
    opens: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(spans: Vec<Vec<Vec<u8>>>) -> Arc<Self> {
        Self::with_formats(spans, Vec::new())
    }

    /// The n-th `open` reports `formats[n]`; the last one repeats
    pub fn with_formats(spans: Vec<Vec<Vec<u8>>>, formats: Vec<PcmFormat>) -> Arc<Self> {
        Arc::new(Self {
            spans: Mutex::new(spans.into()),
            formats: Mutex::new(formats.into()),
            served: Arc::new(AtomicUsize::new(0)),
            opens: AtomicUsize::new(0),
        })
    }

    /// Blocks handed out so far across all spans
    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl PcmSource for ScriptedSource {
    fn open(&self, params: &StreamParams) -> Result<Box<dyn PcmStream>, RecordingError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let blocks = self.spans.lock().unwrap().pop_front().unwrap_or_default();

        let format = {
            let mut formats = self.formats.lock().unwrap();
            if formats.len() > 1 {
                formats.pop_front()
            } else {
                formats.front().copied()
            }
        };

        Ok(Box::new(ScriptedStream {
            format: format.unwrap_or(params.format),
            blocks: blocks.into(),
            served: Arc::clone(&self.served),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedStream {
    format: PcmFormat,
    blocks: VecDeque<Vec<u8>>,
    served: Arc<AtomicUsize>,
}

impl PcmStream for ScriptedStream {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        match self.blocks.pop_front() {
            Some(block) => {
                let len = block.len().min(buf.len());
                buf[..len].copy_from_slice(&block[..len]);
                self.served.fetch_add(1, Ordering::SeqCst);
                Ok(len)
            }
            None => {
                thread::sleep(Duration::from_millis(2));
                Err(ReadError::InvalidOperation)
            }
        }
    }

    fn close(&mut self) {
        self.blocks.clear();
    }
}

/// A block of 16-bit samples, little-endian
pub fn block_of(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Recorder config writing into `dir` with fixed-size scripted blocks
pub fn scripted_config(dir: &Path) -> RecorderConfig {
    RecorderConfig {
        wav_file_dir: Some(dir.to_path_buf()),
        sample_rate: 8000,
        channels: 1,
        buffer_size: Some(BLOCK),
        ..RecorderConfig::default()
    }
}

/// Poll `condition` until it holds, panicking after a few seconds
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("Timed out waiting for {}", what);
}

/// Write a 16-bit PCM WAV file with hound
pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

/// Format used by `scripted_config`
pub fn scripted_format() -> PcmFormat {
    PcmFormat::new(8000, 1)
}
