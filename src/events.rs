//! Listener registry for recorder events
//!
//! Hosts register one sink per event name. Events with no registered sink are
//! dropped silently; sinks never apply backpressure to the recorder.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::RecordingError;

/// Events the recorder emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecorderEvent {
    /// Periodic absolute amplitude while recording
    MaxAmplitude,
    /// Every captured block, base64-encoded
    Data,
}

impl RecorderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MaxAmplitude => "onGetMaxAmplitude",
            Self::Data => "data",
        }
    }
}

impl fmt::Display for RecorderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RecorderEvent {
    type Err = RecordingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onGetMaxAmplitude" => Ok(Self::MaxAmplitude),
            "data" => Ok(Self::Data),
            other => Err(RecordingError::InvalidEvent(other.to_string())),
        }
    }
}

/// Payload of the `onGetMaxAmplitude` event
#[derive(Debug, Clone, Serialize)]
pub struct AmplitudeEvent {
    /// Non-negative amplitude as a decimal string
    pub current: String,
}

/// Receiver of recorder events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, payload: Value);
}

impl<F> EventSink for F
where
    F: Fn(&str, Value) + Send + Sync,
{
    fn emit(&self, event: &str, payload: Value) {
        self(event, payload)
    }
}

/// An event as delivered through a [`ChannelSink`]
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    pub name: String,
    pub payload: Value,
}

/// Forwards events into a bounded tokio channel, dropping them when it is full
pub struct ChannelSink {
    tx: mpsc::Sender<EmittedEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<EmittedEvent>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end of a channel holding up to `capacity` events
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EmittedEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &str, payload: Value) {
        let emitted = EmittedEvent {
            name: event.to_string(),
            payload,
        };
        if let Err(e) = self.tx.try_send(emitted) {
            trace!("Dropping {} event: {}", event, e);
        }
    }
}

/// Logs every event at debug level
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &str, payload: Value) {
        debug!(event, %payload, "recorder event");
    }
}

/// Registered listeners, one per event
#[derive(Default)]
pub struct EventHub {
    listeners: RwLock<HashMap<RecorderEvent, Arc<dyn EventSink>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` for the event called `name`, replacing any previous listener
    pub fn on(&self, name: &str, sink: Arc<dyn EventSink>) -> Result<(), RecordingError> {
        let event = name.parse::<RecorderEvent>()?;
        self.subscribe(event, sink);
        Ok(())
    }

    pub fn subscribe(&self, event: RecorderEvent, sink: Arc<dyn EventSink>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event, sink);
        debug!("Listener registered for {}", event);
    }

    pub fn has_listener(&self, event: RecorderEvent) -> bool {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&event)
    }

    /// Deliver `payload`; returns false when nobody listens
    pub fn emit(&self, event: RecorderEvent, payload: Value) -> bool {
        // Clone the sink out so a slow listener never holds the lock
        let sink = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event)
            .cloned();

        match sink {
            Some(sink) => {
                sink.emit(event.name(), payload);
                true
            }
            None => false,
        }
    }
}
