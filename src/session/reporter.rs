use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::state::SharedState;
use crate::events::{AmplitudeEvent, EventHub, RecorderEvent};

/// Periodic amplitude reporter
///
/// Ticks on its own cadence, independent of the capture loop, and emits the
/// absolute amplitude to the `onGetMaxAmplitude` listener while recording.
/// The task is aborted when the reporter is dropped.
pub struct AmplitudeReporter {
    handle: JoinHandle<()>,
}

impl AmplitudeReporter {
    /// Start the reporter on the current tokio runtime; the first tick fires immediately
    pub fn spawn(shared: Arc<SharedState>, events: Arc<EventHub>, interval: Duration) -> Self {
        info!("Amplitude reporter started ({}ms period)", interval.as_millis());

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                report_once(&shared, &events);
            }
        });

        Self { handle }
    }
}

impl Drop for AmplitudeReporter {
    fn drop(&mut self) {
        debug!("Amplitude reporter stopped");
        self.handle.abort();
    }
}

/// One reporter tick; emits nothing unless recording
fn report_once(shared: &SharedState, events: &EventHub) {
    let current = shared.max_amplitude();
    if current < 0 {
        return;
    }

    let event = AmplitudeEvent {
        current: current.to_string(),
    };
    match serde_json::to_value(&event) {
        Ok(payload) => {
            events.emit(RecorderEvent::MaxAmplitude, payload);
        }
        Err(e) => debug!("Failed to encode amplitude event: {}", e),
    }
}
