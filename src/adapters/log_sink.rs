//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A telemetry-uplink adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::ModeEntered(mode) => {
                info!("MODE  | entering {:?}", mode);
            }
            AppEvent::ConnectRetryScheduled { attempt, delay_ms } => {
                info!("RETRY | attempt {} in {} ms", attempt, delay_ms);
            }
            AppEvent::ControlConnected { resumed } => {
                info!("LINK  | control connection up (resumed={})", resumed);
            }
            AppEvent::ConnectionLost(reason) => {
                warn!("LINK  | connection lost: {}", reason.name());
            }
            AppEvent::Provisioning { from, to } => {
                info!("PRVSN | {} -> {}", from.name(), to.name());
            }
            AppEvent::SessionStats(stats) => {
                info!(
                    "STATS | state={} rx={} q={} done={} drop={}",
                    stats.state.name(),
                    stats.counters.received,
                    stats.counters.queued,
                    stats.counters.processed,
                    stats.counters.dropped,
                );
            }
            AppEvent::SessionEnded(exit) => {
                info!("SESSN | ended: {:?}", exit);
            }
        }
    }
}
