//! Connectivity flag shared between the transport driver and the session
//! loop.
//!
//! The transport delivers disconnect notifications from its own execution
//! context (driver thread or interrupt-adjacent callback). That crossing is
//! modelled as a single-writer-many-reader atomic cell, not as a direct
//! state mutation from arbitrary call sites:
//!
//! ```text
//! ┌──────────────────┐  on_disconnect   ┌──────────────────────┐
//! │ transport driver │─────────────────▶│ AtomicBool + AtomicU8 │
//! │ (its own context)│                  │  (connected, reason)  │
//! └──────────────────┘                  └──────────┬───────────┘
//!                                          is_connected() polls
//!                                       ┌──────────▼───────────┐
//!                                       │   session loop        │
//!                                       └──────────────────────┘
//! ```
//!
//! The writer never blocks; the reader polls non-destructively at the
//! monitor cadence. Staleness bounded by one poll interval is a documented
//! trade-off of the design, not a bug.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Why the transport reported a disconnect.
///
/// Informational only — every reason means the connection is gone and the
/// session loop reacts identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DisconnectReason {
    /// We asked for the disconnect ourselves.
    ClientRequested = 0,
    /// Malformed or unexpected traffic from the peer.
    ProtocolError = 1,
    /// Keep-alive response never arrived.
    KeepAliveTimeout = 2,
    Unknown = 3,
}

impl DisconnectReason {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::ClientRequested,
            1 => Self::ProtocolError,
            2 => Self::KeepAliveTimeout,
            _ => Self::Unknown,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ClientRequested => "client requested",
            Self::ProtocolError => "protocol error",
            Self::KeepAliveTimeout => "keep-alive timeout",
            Self::Unknown => "unknown",
        }
    }
}

struct Shared {
    connected: AtomicBool,
    reason: AtomicU8,
}

/// Reader side — owned by the orchestrator for the process lifetime.
pub struct ConnectivityMonitor {
    shared: Arc<Shared>,
}

/// Writer side — registered with the transport driver. Cloneable, callable
/// from any context, never blocks.
#[derive(Clone)]
pub struct DisconnectHandle {
    shared: Arc<Shared>,
}

impl ConnectivityMonitor {
    /// Create a monitor in the disconnected state.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                connected: AtomicBool::new(false),
                reason: AtomicU8::new(DisconnectReason::Unknown as u8),
            }),
        }
    }

    /// Obtain a writer handle for the transport driver.
    pub fn handle(&self) -> DisconnectHandle {
        DisconnectHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Non-destructive read of the shared flag.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Successful-connect transition. Only the orchestrator calls this.
    pub fn mark_connected(&self) {
        self.shared.connected.store(true, Ordering::Release);
    }

    /// The reason recorded by the most recent disconnect notification.
    pub fn last_disconnect_reason(&self) -> DisconnectReason {
        DisconnectReason::from_u8(self.shared.reason.load(Ordering::Acquire))
    }
}

impl DisconnectHandle {
    /// Record a disconnect. Unconditionally clears the connected flag and
    /// stores `reason` for logging. Lock-free; safe from any context.
    pub fn on_disconnect(&self, reason: DisconnectReason) {
        self.shared.reason.store(reason as u8, Ordering::Release);
        self.shared.connected.store(false, Ordering::Release);
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
