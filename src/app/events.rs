//! Outbound application events.
//!
//! The mode selector, provisioning machine, and session loop emit these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on the
//! other side decide what to do with them — log to serial, forward to a
//! telemetry uplink, etc. Emission is observational: no event has a control
//! effect.

use crate::connectivity::DisconnectReason;
use crate::provisioning::ProvisioningState;
use crate::session::context::{SessionExit, SessionStats};

use super::mode::DeviceMode;

/// Structured events emitted by the orchestration core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The mode selector committed to a mode.
    ModeEntered(DeviceMode),

    /// A failed connection attempt scheduled a jittered retry.
    ConnectRetryScheduled { attempt: u32, delay_ms: u64 },

    /// The control connection is up and the agent is bound to it.
    ControlConnected {
        /// `true` when a suspended agent was resumed rather than
        /// initialised fresh.
        resumed: bool,
    },

    /// The monitor observed the connectivity flag go down.
    ConnectionLost(DisconnectReason),

    /// The provisioning machine moved between states.
    Provisioning {
        from: ProvisioningState,
        to: ProvisioningState,
    },

    /// Per-tick session statistics snapshot.
    SessionStats(SessionStats),

    /// The update session ended; the caller decides whether to restart.
    SessionEnded(SessionExit),
}
