//! Access-point provisioning state machine.
//!
//! Drives the radio into its provisioning role and waits for out-of-band
//! credential delivery:
//!
//! ```text
//!  IDLE ──▶ STARTING ──▶ AWAITING_ROLE ──[role == desired]──▶ CONFIRMED
//!                             │                                   │
//!                       [role != desired]                  [protocol start]
//!                             ▼                                   ▼
//!                       ROLE_MISMATCH                    PROVISIONING_ACTIVE
//!                                                        │               │
//!                                              [credentials accepted] [inactivity]
//!                                                        ▼               ▼
//!                                                   PROVISIONED       TIMED_OUT
//!
//!  Any step ──[radio failure]──▶ ERROR (terminal, never auto-retried)
//! ```
//!
//! The role-confirmation event arrives asynchronously from the radio driver
//! and is consumed through an atomic take — the equality check against the
//! requested role is the guard against silently operating in the wrong
//! radio role. Out-of-band provisioning frames are forwarded verbatim; the
//! machine never interprets credential contents.

use core::time::Duration;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{
    ClockPort, CredentialStorePort, EventSink, ProvisioningProtocolPort, RadioPort, RadioRole,
    WifiCredentials,
};
use crate::error::{Error, ProvisioningError, RadioError, Result};
use crate::config::SystemConfig;

/// Cadence of the cooperative waits inside the machine.
const PROVISIONING_POLL: Duration = Duration::from_millis(100);

/// Bounded retries of the radio reset when provisioning is already running.
const RESET_ATTEMPTS: u32 = 3;

/// Maximum out-of-band frame size forwarded to the radio.
pub const MAX_FRAME_LEN: usize = 256;

/// Depth of the out-of-band frame queue.
const FRAME_QUEUE_DEPTH: usize = 4;

/// A raw provisioning frame, forwarded without interpretation.
pub type ProvisioningFrame = heapless::Vec<u8, MAX_FRAME_LEN>;

// ───────────────────────────────────────────────────────────────
// States
// ───────────────────────────────────────────────────────────────

/// Named states of the provisioning machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    Idle,
    Starting,
    AwaitingRoleConfirmation,
    Confirmed,
    RoleMismatch,
    ProvisioningActive,
    Provisioned,
    TimedOut,
    Error,
}

impl ProvisioningState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Starting => "Starting",
            Self::AwaitingRoleConfirmation => "AwaitingRoleConfirmation",
            Self::Confirmed => "Confirmed",
            Self::RoleMismatch => "RoleMismatch",
            Self::ProvisioningActive => "ProvisioningActive",
            Self::Provisioned => "Provisioned",
            Self::TimedOut => "TimedOut",
            Self::Error => "Error",
        }
    }

    /// Terminal states return control to the mode selector.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::RoleMismatch | Self::Provisioned | Self::TimedOut | Self::Error
        )
    }
}

/// How a completed provisioning attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    /// Credentials were accepted and persisted.
    Provisioned,
    /// The inactivity window elapsed with no exchange.
    TimedOut,
}

// ───────────────────────────────────────────────────────────────
// Asynchronous event cells
// ───────────────────────────────────────────────────────────────

/// Shared cells through which the radio driver and the out-of-band channel
/// deliver events into the machine.
///
/// Writers (driver/OOB context) never block: signals overwrite, the frame
/// queue drops when full. The machine consumes with atomic take — the
/// clear-on-read the role-confirmation protocol requires.
pub struct ProvisioningEvents {
    role_confirmed: Signal<CriticalSectionRawMutex, RadioRole>,
    credentials_accepted: Signal<CriticalSectionRawMutex, WifiCredentials>,
    frames: Channel<CriticalSectionRawMutex, ProvisioningFrame, FRAME_QUEUE_DEPTH>,
}

impl ProvisioningEvents {
    pub fn new() -> Self {
        Self {
            role_confirmed: Signal::new(),
            credentials_accepted: Signal::new(),
            frames: Channel::new(),
        }
    }

    /// Driver callback: the radio reports the role it actually entered.
    pub fn notify_role(&self, actual: RadioRole) {
        self.role_confirmed.signal(actual);
    }

    /// Protocol callback: the peer's credentials were accepted on-wire.
    pub fn notify_credentials(&self, credentials: WifiCredentials) {
        self.credentials_accepted.signal(credentials);
    }

    /// Out-of-band channel: enqueue a frame for forwarding. Returns `false`
    /// if the frame is oversized or the queue is full (frame dropped).
    pub fn push_frame(&self, frame: &[u8]) -> bool {
        let Ok(buf) = ProvisioningFrame::from_slice(frame) else {
            return false;
        };
        self.frames.try_send(buf).is_ok()
    }

    pub(crate) fn take_role(&self) -> Option<RadioRole> {
        self.role_confirmed.try_take()
    }

    pub(crate) fn take_credentials(&self) -> Option<WifiCredentials> {
        self.credentials_accepted.try_take()
    }

    pub(crate) fn take_frame(&self) -> Option<ProvisioningFrame> {
        self.frames.try_receive().ok()
    }
}

// ───────────────────────────────────────────────────────────────
// The machine
// ───────────────────────────────────────────────────────────────

/// One run of the provisioning state machine.
///
/// Created when entering provisioning mode, consumed by [`run`]; the mode
/// selector constructs a fresh session for every attempt.
///
/// [`run`]: ProvisioningSession::run
pub struct ProvisioningSession {
    desired_role: RadioRole,
    state: ProvisioningState,
    events: Arc<ProvisioningEvents>,
}

impl ProvisioningSession {
    pub fn new(desired_role: RadioRole, events: Arc<ProvisioningEvents>) -> Self {
        Self {
            desired_role,
            state: ProvisioningState::Idle,
            events,
        }
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    /// Drive the machine from `Idle` to a terminal state.
    ///
    /// Blocks cooperatively (bounded polls through `clock`) until the
    /// attempt ends. Radio failures abort immediately into `Error` and are
    /// surfaced, never retried here — retrying provisioning is an
    /// out-of-band decision.
    ///
    /// The `radio` parameter satisfies **both** [`RadioPort`] and
    /// [`ProvisioningProtocolPort`] — the two faces of the single radio —
    /// which avoids a double mutable borrow while keeping the port
    /// boundary explicit.
    pub fn run(
        &mut self,
        radio: &mut (impl RadioPort + ProvisioningProtocolPort),
        store: &mut impl CredentialStorePort,
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
        config: &SystemConfig,
    ) -> Result<ProvisioningOutcome> {
        self.transition(ProvisioningState::Starting, sink);
        self.reset_radio(radio, clock, sink)?;

        if let Err(e) = radio.request_role(self.desired_role) {
            return Err(self.fail(sink, e.into()));
        }
        self.transition(ProvisioningState::AwaitingRoleConfirmation, sink);

        self.await_role_confirmation(clock, sink, config)?;

        // Confirmed — start the on-wire exchange.
        let inactivity = Duration::from_secs(u64::from(config.provisioning_inactivity_secs));
        if let Err(e) = radio.start(inactivity) {
            return Err(self.fail(sink, e.into()));
        }
        self.transition(ProvisioningState::ProvisioningActive, sink);
        info!("provisioning: waiting to be provisioned (inactivity window {}s)",
            config.provisioning_inactivity_secs);

        self.await_credentials(radio, store, clock, sink, inactivity)
    }

    // ── Phase: radio reset ────────────────────────────────────

    /// Bring the radio to its default state. A provisioning exchange left
    /// running by a previous attempt is stopped and the reset retried a
    /// bounded number of times.
    fn reset_radio(
        &mut self,
        radio: &mut (impl RadioPort + ProvisioningProtocolPort),
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        for attempt in 0..RESET_ATTEMPTS {
            match radio.reset_to_defaults() {
                Ok(()) => return Ok(()),
                Err(RadioError::ProvisioningInProgress) => {
                    info!("provisioning: already running, stopping it (attempt {attempt})");
                    if let Err(e) = radio.stop() {
                        return Err(self.fail(sink, e.into()));
                    }
                    clock.sleep(PROVISIONING_POLL);
                }
                Err(e) => return Err(self.fail(sink, e.into())),
            }
        }
        Err(self.fail(sink, RadioError::ProvisioningInProgress.into()))
    }

    // ── Phase: role confirmation ──────────────────────────────

    /// Wait for the radio to report the role it actually entered.
    ///
    /// The wait is bounded (`role_confirm_timeout_secs`) — a radio that
    /// never calls back must not wedge the device.
    fn await_role_confirmation(
        &mut self,
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
        config: &SystemConfig,
    ) -> Result<()> {
        let deadline = clock.now() + Duration::from_secs(u64::from(config.role_confirm_timeout_secs));
        loop {
            if let Some(actual) = self.events.take_role() {
                if actual == self.desired_role {
                    info!("provisioning: radio confirmed {:?} role", actual);
                    self.transition(ProvisioningState::Confirmed, sink);
                    return Ok(());
                }
                warn!(
                    "provisioning: radio started in {:?} but {:?} was requested",
                    actual, self.desired_role
                );
                self.transition(ProvisioningState::RoleMismatch, sink);
                return Err(ProvisioningError::RoleMismatch.into());
            }
            if clock.now() >= deadline {
                return Err(self.fail(sink, ProvisioningError::RoleConfirmTimeout.into()));
            }
            clock.sleep(PROVISIONING_POLL);
        }
    }

    // ── Phase: active exchange ────────────────────────────────

    fn await_credentials(
        &mut self,
        protocol: &mut impl ProvisioningProtocolPort,
        store: &mut impl CredentialStorePort,
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
        inactivity: Duration,
    ) -> Result<ProvisioningOutcome> {
        // `protocol` is the same radio object; only its protocol face is
        // needed from here on.
        let mut last_activity = clock.now();

        loop {
            if let Some(credentials) = self.events.take_credentials() {
                if let Err(e) = store.persist(&credentials) {
                    return Err(self.fail(sink, e.into()));
                }
                info!("provisioning: credentials accepted and persisted");
                self.transition(ProvisioningState::Provisioned, sink);
                return Ok(ProvisioningOutcome::Provisioned);
            }

            while let Some(frame) = self.events.take_frame() {
                if let Err(e) = protocol.forward_frame(&frame) {
                    return Err(self.fail(sink, e.into()));
                }
                last_activity = clock.now();
            }

            if clock.now().saturating_sub(last_activity) >= inactivity {
                // Best-effort stop; the terminal state is TimedOut either way.
                if let Err(e) = protocol.stop() {
                    warn!("provisioning: stop after inactivity failed: {e}");
                }
                self.transition(ProvisioningState::TimedOut, sink);
                return Ok(ProvisioningOutcome::TimedOut);
            }

            clock.sleep(PROVISIONING_POLL);
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn transition(&mut self, next: ProvisioningState, sink: &mut impl EventSink) {
        if next == self.state {
            return;
        }
        info!("provisioning: {} -> {}", self.state.name(), next.name());
        sink.emit(&AppEvent::Provisioning {
            from: self.state,
            to: next,
        });
        self.state = next;
    }

    fn fail(&mut self, sink: &mut impl EventSink, err: Error) -> Error {
        warn!("provisioning: aborting from {}: {}", self.state.name(), err);
        self.transition(ProvisioningState::Error, sink);
        err
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
