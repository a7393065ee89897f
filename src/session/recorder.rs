use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::config::{InitOptions, RecorderConfig, SessionPaths};
use super::reporter::AmplitudeReporter;
use super::state::{RecordingState, SharedState};
use super::stats::RecordingStats;
use crate::audio::wav::{finalize_wav, remove_raw_file};
use crate::audio::{CaptureLoop, CaptureReport, PcmFormat, PcmSource, StreamParams};
use crate::error::{FinalizeError, RecordingError};
use crate::events::{EventHub, EventSink};

/// Microphone recorder producing a WAV file
///
/// Drives the Idle → Recording ⇄ Paused → Idle lifecycle. Capture runs on a
/// dedicated thread per recording span; the amplitude reporter runs on the tokio
/// runtime from `init` until the recorder is dropped. Operations are serialized,
/// except `max_amplitude` and `state`, which only read atomics.
///
/// Dropping the recorder mid-recording waits for the capture thread to finish its
/// current block, so the raw file holds whole blocks only. It is not finalized.
pub struct AudioRecorder {
    /// PCM device driver, reopened on every start and resume
    source: Arc<dyn PcmSource>,

    /// Configuration that init options are applied to
    base_config: RecorderConfig,

    /// State flag and amplitude shared with the capture thread and reporter
    shared: Arc<SharedState>,

    /// Event listeners
    events: Arc<EventHub>,

    inner: Mutex<Inner>,
}

struct Inner {
    config: RecorderConfig,
    reporter: Option<AmplitudeReporter>,
    session: Option<Session>,
    /// Format of the last session that reached `stop`; the output file holds it
    last_format: Option<PcmFormat>,
}

/// The single live recording
struct Session {
    id: Uuid,
    paths: SessionPaths,
    format: PcmFormat,
    buffer_size: usize,
    started_at: DateTime<Utc>,
    capture: Option<JoinHandle<CaptureReport>>,
    totals: CaptureReport,
}

impl AudioRecorder {
    pub fn new(source: Arc<dyn PcmSource>, config: RecorderConfig) -> Self {
        Self {
            source,
            base_config: config.clone(),
            shared: Arc::new(SharedState::new()),
            events: Arc::new(EventHub::new()),
            inner: Mutex::new(Inner {
                config,
                reporter: None,
                session: None,
                last_format: None,
            }),
        }
    }

    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    /// Register a listener for `onGetMaxAmplitude` or `data`
    pub fn on(&self, event: &str, sink: Arc<dyn EventSink>) -> Result<(), RecordingError> {
        self.events.on(event, sink)
    }

    pub fn state(&self) -> RecordingState {
        self.shared.state()
    }

    /// Absolute value of the latest sample while recording, `-1` otherwise
    pub fn max_amplitude(&self) -> i32 {
        self.shared.max_amplitude()
    }

    /// Configure output paths and start the amplitude reporter
    ///
    /// Can be called again; new options apply to the next session while an
    /// in-flight session keeps the files it was started with.
    pub async fn init(&self, options: InitOptions) {
        let mut inner = self.inner.lock().await;

        inner.config = self.base_config.clone().with_options(&options);
        let paths = inner.config.paths();
        info!(
            "Recorder initialized: output {}, temp {}",
            paths.output.display(),
            paths.temp.display()
        );

        if inner.reporter.is_none() {
            inner.reporter = Some(AmplitudeReporter::spawn(
                Arc::clone(&self.shared),
                Arc::clone(&self.events),
                inner.config.amplitude_interval(),
            ));
        }
    }

    /// Begin a new recording, truncating the temporary raw file
    pub async fn start(&self) -> Result<(), RecordingError> {
        let mut inner = self.inner.lock().await;

        let state = self.shared.state();
        if state != RecordingState::Idle {
            warn!("Ignoring start while {}", state);
            return Err(RecordingError::InvalidTransition {
                action: "start",
                state,
            });
        }

        let config = &inner.config;
        let mut session = Session {
            id: Uuid::new_v4(),
            paths: config.paths(),
            format: config.requested_format(),
            buffer_size: config.buffer_size(),
            started_at: Utc::now(),
            capture: None,
            totals: CaptureReport::default(),
        };

        info!(session = %session.id, "Starting recording via {}", self.source.name());

        self.begin_capture(&mut session, &inner.config, false)?;
        inner.session = Some(session);

        Ok(())
    }

    /// Stop capturing but keep the raw file for `resume` or `stop`
    pub async fn pause(&self) -> Result<(), RecordingError> {
        let mut inner = self.inner.lock().await;

        let state = self.shared.state();
        if state != RecordingState::Recording {
            warn!("Ignoring pause while {}", state);
            return Err(RecordingError::InvalidTransition {
                action: "pause",
                state,
            });
        }

        self.shared.set_state(RecordingState::Paused);
        if let Some(session) = inner.session.as_mut() {
            join_capture(session).await;
            info!(
                session = %session.id,
                "Recording paused ({} bytes so far)",
                session.totals.bytes_written
            );
        }

        Ok(())
    }

    /// Continue a paused recording, appending to the raw file
    pub async fn resume(&self) -> Result<(), RecordingError> {
        let mut inner = self.inner.lock().await;

        let state = self.shared.state();
        if state != RecordingState::Paused {
            warn!("Ignoring resume while {}", state);
            return Err(RecordingError::InvalidTransition {
                action: "resume",
                state,
            });
        }

        let inner = &mut *inner;
        let session = inner
            .session
            .as_mut()
            .ok_or(RecordingError::InvalidTransition {
                action: "resume",
                state,
            })?;

        info!(session = %session.id, "Resuming recording");
        self.begin_capture(session, &inner.config, true)
    }

    /// Finish the recording and return the WAV file path
    ///
    /// Accepted in every state. Joins the capture thread before the raw file is
    /// measured, finalizes the WAV file and removes the raw file. Without a prior
    /// `start` the configured output is finalized over an empty payload.
    pub async fn stop(&self) -> Result<PathBuf, RecordingError> {
        let mut inner = self.inner.lock().await;

        let previous = self.shared.state();
        self.shared.set_state(RecordingState::Stopped);

        let mut session = inner.session.take();
        let (paths, format) = match session.as_mut() {
            Some(session) => {
                join_capture(session).await;
                info!(
                    session = %session.id,
                    "Stopping recording ({} bytes captured)",
                    session.totals.bytes_written
                );
                (session.paths.clone(), session.format)
            }
            None => {
                info!("Stop requested while {} with no session", previous);
                let format = inner
                    .last_format
                    .unwrap_or_else(|| inner.config.requested_format());
                (inner.config.paths(), format)
            }
        };
        inner.last_format = Some(format);

        let result = finalize(paths.clone(), format).await;
        self.shared.set_state(RecordingState::Idle);

        match result {
            Ok(()) => Ok(paths.output),
            Err(e) => {
                error!("Failed to finalize {}: {}", paths.output.display(), e);
                Err(e.into())
            }
        }
    }

    /// Current state, session and capture progress
    pub async fn stats(&self) -> RecordingStats {
        let inner = self.inner.lock().await;
        let state = self.shared.state();

        match &inner.session {
            Some(session) => {
                let bytes_captured = fs::metadata(&session.paths.temp)
                    .map(|m| m.len())
                    .unwrap_or(session.totals.bytes_written);
                let elapsed = Utc::now().signed_duration_since(session.started_at);

                RecordingStats {
                    state,
                    session_id: Some(session.id),
                    started_at: Some(session.started_at),
                    elapsed_secs: elapsed.num_milliseconds() as f64 / 1000.0,
                    bytes_captured,
                    audio_secs: session.format.duration_secs(bytes_captured),
                    format: Some(session.format),
                    output_path: session.paths.output.clone(),
                }
            }
            None => RecordingStats {
                state,
                session_id: None,
                started_at: None,
                elapsed_secs: 0.0,
                bytes_captured: 0,
                audio_secs: 0.0,
                format: None,
                output_path: inner.config.paths().output,
            },
        }
    }

    /// Open the device and the raw sink, then hand both to a new capture thread
    fn begin_capture(
        &self,
        session: &mut Session,
        config: &RecorderConfig,
        append: bool,
    ) -> Result<(), RecordingError> {
        if let Some(dir) = session.paths.temp.parent() {
            fs::create_dir_all(dir).map_err(|source| RecordingError::Sink {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let params = StreamParams {
            format: session.format,
            buffer_size: session.buffer_size,
        };
        let mut stream = self.source.open(&params)?;

        let format = stream.format();
        if append && format != session.format {
            stream.close();
            return Err(RecordingError::FormatChanged(format!(
                "session is {}Hz / {} channels, device now delivers {}Hz / {} channels",
                session.format.sample_rate,
                session.format.channels,
                format.sample_rate,
                format.channels
            )));
        }
        if format != session.format {
            info!(
                "Device delivers {}Hz / {} channels",
                format.sample_rate, format.channels
            );
            session.format = format;
            session.buffer_size = config.buffer_size_for(&format);
        }

        let sink = match open_raw_sink(&session.paths.temp, append) {
            Ok(sink) => sink,
            Err(e) => {
                stream.close();
                return Err(e);
            }
        };

        self.shared.set_amplitude(0);
        self.shared.set_state(RecordingState::Recording);

        let capture = CaptureLoop::new(
            stream,
            sink,
            session.buffer_size,
            Arc::clone(&self.shared),
            Arc::clone(&self.events),
        );
        match capture.spawn() {
            Ok(handle) => {
                session.capture = Some(handle);
                info!(
                    session = %session.id,
                    "Recording to {} ({} byte blocks, append={})",
                    session.paths.temp.display(),
                    session.buffer_size,
                    append
                );
                Ok(())
            }
            Err(e) => {
                let fallback = if append {
                    RecordingState::Paused
                } else {
                    RecordingState::Idle
                };
                self.shared.set_state(fallback);
                Err(RecordingError::Worker(e.to_string()))
            }
        }
    }
}

impl Drop for AudioRecorder {
    fn drop(&mut self) {
        self.shared.set_state(RecordingState::Idle);

        // The capture thread exits after its current read
        let capture = self
            .inner
            .get_mut()
            .session
            .as_mut()
            .and_then(|session| session.capture.take());
        if let Some(handle) = capture {
            if handle.join().is_err() {
                error!("Capture thread panicked");
            }
        }
    }
}

fn open_raw_sink(path: &std::path::Path, append: bool) -> Result<File, RecordingError> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }

    options.open(path).map_err(|source| RecordingError::Sink {
        path: path.to_path_buf(),
        source,
    })
}

/// Wait for the capture thread to finish its last write
async fn join_capture(session: &mut Session) {
    let Some(handle) = session.capture.take() else {
        return;
    };

    match tokio::task::spawn_blocking(move || handle.join()).await {
        Ok(Ok(report)) => session.totals.merge(&report),
        Ok(Err(_)) => error!(session = %session.id, "Capture thread panicked"),
        Err(e) => error!(session = %session.id, "Failed to join capture thread: {}", e),
    }
}

/// Write the WAV file and drop the raw file; the raw file is kept if finalizing fails
async fn finalize(paths: SessionPaths, format: PcmFormat) -> Result<(), FinalizeError> {
    tokio::task::spawn_blocking(move || {
        if let Some(dir) = paths.output.parent() {
            fs::create_dir_all(dir).map_err(|source| FinalizeError::OpenOutput {
                path: paths.output.clone(),
                source,
            })?;
        }

        finalize_wav(&paths.temp, &paths.output, &format)?;

        if let Err(e) = remove_raw_file(&paths.temp) {
            warn!("Failed to delete {}: {}", paths.temp.display(), e);
        }
        Ok(())
    })
    .await
    .map_err(|e| FinalizeError::Task(e.to_string()))?
}
