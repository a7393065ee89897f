use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, trace};

use super::source::PcmStream;
use crate::events::{EventHub, RecorderEvent};
use crate::session::SharedState;

/// Counters collected by one run of the capture loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureReport {
    /// Blocks appended to the sink
    pub blocks_written: u64,
    /// Bytes appended to the sink
    pub bytes_written: u64,
    /// Reads the device reported as failed
    pub skipped_reads: u64,
    /// Reads that returned less than a full block
    pub short_reads: u64,
    /// Blocks lost to sink write failures
    pub write_errors: u64,
}

impl CaptureReport {
    pub fn merge(&mut self, other: &CaptureReport) {
        self.blocks_written += other.blocks_written;
        self.bytes_written += other.bytes_written;
        self.skipped_reads += other.skipped_reads;
        self.short_reads += other.short_reads;
        self.write_errors += other.write_errors;
    }
}

/// Signed value of the last complete little-endian 16-bit sample in `chunk`
pub fn last_sample(chunk: &[u8]) -> Option<i16> {
    chunk
        .chunks_exact(2)
        .last()
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
}

/// Pulls fixed-size blocks from a PCM stream into a byte sink
///
/// The loop runs while the shared state is `Recording` and checks it once per
/// block, so it exits at most one blocking read after the state changes. Read
/// failures and short reads skip the block; write failures are logged and the
/// loop keeps going. The stream is closed when the loop exits.
pub struct CaptureLoop<W> {
    stream: Box<dyn PcmStream>,
    sink: W,
    buffer_size: usize,
    shared: Arc<SharedState>,
    events: Arc<EventHub>,
}

impl<W: Write> CaptureLoop<W> {
    pub fn new(
        stream: Box<dyn PcmStream>,
        sink: W,
        buffer_size: usize,
        shared: Arc<SharedState>,
        events: Arc<EventHub>,
    ) -> Self {
        Self {
            stream,
            sink,
            buffer_size,
            shared,
            events,
        }
    }

    /// Run until recording stops
    pub fn run(mut self) -> CaptureReport {
        let mut buf = vec![0u8; self.buffer_size];
        let mut report = CaptureReport::default();

        info!("Capture loop started ({} byte blocks)", self.buffer_size);

        while self.shared.is_recording() {
            match self.stream.read_block(&mut buf) {
                Ok(read) if read == buf.len() => {}
                Ok(read) => {
                    trace!("Short read of {} bytes, block dropped", read);
                    report.short_reads += 1;
                    continue;
                }
                Err(e) => {
                    trace!("Skipping block: {}", e);
                    report.skipped_reads += 1;
                    continue;
                }
            }

            if let Err(e) = self.sink.write_all(&buf) {
                error!("Failed to write audio block: {}", e);
                report.write_errors += 1;
                continue;
            }

            report.blocks_written += 1;
            report.bytes_written += buf.len() as u64;

            if let Some(sample) = last_sample(&buf) {
                self.shared.set_amplitude(sample);
            }

            if self.events.has_listener(RecorderEvent::Data) {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&buf);
                self.events.emit(RecorderEvent::Data, Value::String(encoded));
            }
        }

        if let Err(e) = self.sink.flush() {
            error!("Failed to flush raw audio file: {}", e);
        }
        self.stream.close();

        info!(
            "Capture loop stopped: {} blocks ({} bytes), {} skipped reads, {} short reads, {} write errors",
            report.blocks_written,
            report.bytes_written,
            report.skipped_reads,
            report.short_reads,
            report.write_errors
        );

        report
    }
}

impl<W: Write + Send + 'static> CaptureLoop<W> {
    /// Run the loop on a dedicated thread
    pub fn spawn(self) -> io::Result<JoinHandle<CaptureReport>> {
        thread::Builder::new()
            .name("audio-recorder".into())
            .spawn(move || self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::PcmFormat;
    use crate::error::ReadError;
    use crate::session::RecordingState;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted reads, then stops recording once the script runs out
    struct ScriptedStream {
        reads: VecDeque<Result<Vec<u8>, ReadError>>,
        shared: Arc<SharedState>,
        closed: Arc<Mutex<bool>>,
    }

    impl PcmStream for ScriptedStream {
        fn format(&self) -> PcmFormat {
            PcmFormat::new(8000, 1)
        }

        fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
            let next = self.reads.pop_front();
            if self.reads.is_empty() {
                self.shared.set_state(RecordingState::Paused);
            }
            match next {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(ReadError::InvalidOperation),
            }
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    /// Sink that fails every other write
    struct FlakySink {
        written: Vec<u8>,
        calls: usize,
    }

    impl Write for FlakySink {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.written.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn recording_state() -> Arc<SharedState> {
        let shared = Arc::new(SharedState::new());
        shared.set_state(RecordingState::Recording);
        shared
    }

    #[test]
    fn test_last_sample_decodes_little_endian() {
        assert_eq!(last_sample(&[0x01, 0x00, 0x18, 0xFC]), Some(-1000));
        assert_eq!(last_sample(&[0xFF, 0x7F]), Some(i16::MAX));
        assert_eq!(last_sample(&[0x00, 0x80, 0x05]), Some(i16::MIN), "Trailing odd byte ignored");
        assert_eq!(last_sample(&[0x05]), None);
    }

    #[test]
    fn test_full_blocks_written_and_failures_skipped() {
        let shared = recording_state();
        let closed = Arc::new(Mutex::new(false));
        let stream = ScriptedStream {
            reads: VecDeque::from(vec![
                Ok(vec![1, 0, 2, 0]),
                Err(ReadError::InvalidOperation),
                Ok(vec![9, 9]),
                Err(ReadError::Timeout),
                Ok(vec![3, 0, 0x18, 0xFC]),
            ]),
            shared: Arc::clone(&shared),
            closed: Arc::clone(&closed),
        };

        let mut sink = Vec::new();
        let report = CaptureLoop::new(
            Box::new(stream),
            &mut sink,
            4,
            Arc::clone(&shared),
            Arc::new(EventHub::new()),
        )
        .run();

        assert_eq!(sink, vec![1, 0, 2, 0, 3, 0, 0x18, 0xFC]);
        assert_eq!(report.blocks_written, 2);
        assert_eq!(report.bytes_written, 8);
        assert_eq!(report.skipped_reads, 2);
        assert_eq!(report.short_reads, 1);
        assert_eq!(shared.amplitude(), -1000);
        assert!(*closed.lock().unwrap(), "Stream should be closed on exit");
    }

    #[test]
    fn test_write_errors_do_not_stop_capture() {
        let shared = recording_state();
        let stream = ScriptedStream {
            reads: VecDeque::from(vec![
                Ok(vec![1, 0]),
                Ok(vec![2, 0]),
                Ok(vec![3, 0]),
            ]),
            shared: Arc::clone(&shared),
            closed: Arc::new(Mutex::new(false)),
        };

        let mut sink = FlakySink {
            written: Vec::new(),
            calls: 0,
        };
        let report = CaptureLoop::new(
            Box::new(stream),
            &mut sink,
            2,
            Arc::clone(&shared),
            Arc::new(EventHub::new()),
        )
        .run();

        assert_eq!(sink.written, vec![1, 0, 3, 0]);
        assert_eq!(report.blocks_written, 2);
        assert_eq!(report.write_errors, 1);
        assert_eq!(shared.amplitude(), 3);
    }

    #[test]
    fn test_data_listener_receives_base64_blocks() {
        let shared = recording_state();
        let events = Arc::new(EventHub::new());
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&payloads);
        events.subscribe(
            RecorderEvent::Data,
            Arc::new(move |_: &str, payload: Value| seen.lock().unwrap().push(payload)),
        );

        let stream = ScriptedStream {
            reads: VecDeque::from(vec![Ok(vec![0x01, 0x02, 0x03])]),
            shared: Arc::clone(&shared),
            closed: Arc::new(Mutex::new(false)),
        };

        CaptureLoop::new(Box::new(stream), io::sink(), 3, shared, events).run();

        assert_eq!(payloads.lock().unwrap().as_slice(), [Value::String("AQID".into())]);
    }
}
