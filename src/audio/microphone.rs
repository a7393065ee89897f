// Microphone source using cpal
//
// cpal streams cannot move between threads, so every opened stream lives on its
// own owner thread. The input callback converts samples to 16-bit little-endian
// bytes and hands them over a bounded channel; `read_block` reassembles them into
// fixed-size blocks for the capture loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{error, info, warn};

use super::format::PcmFormat;
use super::source::{PcmSource, PcmStream, StreamParams};
use crate::error::{ReadError, RecordingError};

/// Callback buffers queued before incoming audio is dropped
const MAX_PENDING_BUFFERS: usize = 256;

/// How long `read_block` waits for device data before reporting a timeout
const READ_TIMEOUT: Duration = Duration::from_millis(250);

/// How long `open` waits for the device to come up
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default input device
pub struct MicrophoneSource;

impl MicrophoneSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MicrophoneSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PcmSource for MicrophoneSource {
    fn open(&self, params: &StreamParams) -> Result<Box<dyn PcmStream>, RecordingError> {
        let requested = params.format;
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (data_tx, data_rx) = crossbeam_channel::bounded(MAX_PENDING_BUFFERS);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let dropped = Arc::new(AtomicU64::new(0));
        let dropped_in_callback = Arc::clone(&dropped);

        let owner = thread::Builder::new()
            .name("mic-stream".into())
            .spawn(move || {
                let stream = match start_input_stream(requested, data_tx, dropped_in_callback) {
                    Ok((stream, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Keep the stream alive until the capture side closes it
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| {
                RecordingError::DeviceUnavailable(format!("failed to spawn stream thread: {}", e))
            })?;

        let format = match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(format)) => format,
            Ok(Err(e)) => {
                let _ = owner.join();
                return Err(RecordingError::DeviceUnavailable(e));
            }
            Err(_) => {
                let _ = stop_tx.send(());
                return Err(RecordingError::DeviceUnavailable(
                    "input device did not start in time".to_string(),
                ));
            }
        };

        info!(
            "Microphone stream opened: {}Hz, {} channels",
            format.sample_rate, format.channels
        );

        Ok(Box::new(MicrophoneStream {
            format,
            data_rx,
            pending: Vec::new(),
            dropped,
            stop_tx: Some(stop_tx),
            owner: Some(owner),
        }))
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

/// Build and start an input stream on the default device
///
/// Uses the requested rate and channel count when the device supports them and
/// otherwise falls back to the device default, whose format is passed through.
fn start_input_stream(
    requested: PcmFormat,
    data_tx: Sender<Vec<u8>>,
    dropped: Arc<AtomicU64>,
) -> Result<(Stream, PcmFormat), String> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| "no default input device".to_string())?;

    info!("Using audio input device: {:?}", device.name());

    let default_config = device
        .default_input_config()
        .map_err(|e| format!("no supported input config: {}", e))?;

    let supports_requested = device
        .supported_input_configs()
        .map(|mut configs| {
            configs.any(|c| {
                c.channels() == requested.channels
                    && c.min_sample_rate().0 <= requested.sample_rate
                    && c.max_sample_rate().0 >= requested.sample_rate
            })
        })
        .unwrap_or(false);

    let (sample_rate, channels) = if supports_requested {
        (requested.sample_rate, requested.channels)
    } else {
        warn!(
            "Device does not support {}Hz / {} channels, using {}Hz / {} channels",
            requested.sample_rate,
            requested.channels,
            default_config.sample_rate().0,
            default_config.channels()
        );
        (default_config.sample_rate().0, default_config.channels())
    };

    let config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match default_config.sample_format() {
        SampleFormat::I16 => build_stream::<i16>(&device, &config, data_tx, dropped),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, data_tx, dropped),
        SampleFormat::F32 => build_stream::<f32>(&device, &config, data_tx, dropped),
        other => return Err(format!("unsupported device sample format {:?}", other)),
    }?;

    stream
        .play()
        .map_err(|e| format!("failed to start stream: {}", e))?;

    Ok((stream, PcmFormat::new(sample_rate, channels)))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    data_tx: Sender<Vec<u8>>,
    dropped: Arc<AtomicU64>,
) -> Result<Stream, String>
where
    T: SizedSample + Send + 'static,
    i16: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let bytes: Vec<u8> = data
                    .iter()
                    .flat_map(|&s| i16::from_sample(s).to_le_bytes())
                    .collect();

                // Never block the audio callback
                if data_tx.try_send(bytes).is_err() {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| format!("failed to build input stream: {}", e))
}

struct MicrophoneStream {
    format: PcmFormat,
    data_rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    dropped: Arc<AtomicU64>,
    stop_tx: Option<Sender<()>>,
    owner: Option<JoinHandle<()>>,
}

impl PcmStream for MicrophoneStream {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        if self.stop_tx.is_none() {
            return Err(ReadError::InvalidOperation);
        }

        while self.pending.len() < buf.len() {
            match self.data_rx.recv_timeout(READ_TIMEOUT) {
                Ok(bytes) => self.pending.extend_from_slice(&bytes),
                Err(RecvTimeoutError::Timeout) => return Err(ReadError::Timeout),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ReadError::Device("input stream disconnected".to_string()))
                }
            }
        }

        buf.copy_from_slice(&self.pending[..buf.len()]);
        self.pending.drain(..buf.len());
        Ok(buf.len())
    }

    fn close(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(owner) = self.owner.take() {
            if owner.join().is_err() {
                error!("Microphone stream thread panicked");
            }

            let dropped = self.dropped.load(Ordering::Relaxed);
            if dropped > 0 {
                warn!("Microphone stream dropped {} callback buffers", dropped);
            }
        }
    }
}

impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        self.close();
    }
}
