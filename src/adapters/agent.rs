//! Update-agent binding — backed by the `esp-ota` partition API.
//!
//! Implements [`UpdateAgentPort`]. The agent's block-transfer and
//! verification logic runs in its own task and is not part of this core;
//! this adapter is the orchestrator-facing binding: lifecycle requests,
//! observed state, counters, and completion events.
//!
//! On ESP-IDF targets, image acceptance and activation go through the
//! `esp-ota` crate (safe wrapper around the OTA partition API). On
//! simulation targets the lifecycle is scripted via the `sim_*` hooks.

use core::time::Duration;

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{
    AgentCounters, AgentEvent, AgentState, ConnectionHandle, DeviceIdentity, ImageState,
    UpdateAgentPort,
};
use crate::error::SessionError;

/// Pending completion events the orchestrator has not consumed yet.
const EVENT_QUEUE_DEPTH: usize = 4;

pub struct OtaAgentAdapter {
    state: AgentState,
    image_state: ImageState,
    counters: AgentCounters,
    events: heapless::Deque<AgentEvent, EVENT_QUEUE_DEPTH>,
    bound: Option<ConnectionHandle>,
}

impl OtaAgentAdapter {
    pub fn new() -> Self {
        Self {
            state: AgentState::Init,
            image_state: ImageState::None,
            counters: AgentCounters::default(),
            events: heapless::Deque::new(),
            bound: None,
        }
    }

    /// Connection the agent is currently bound to.
    pub fn bound_connection(&self) -> Option<ConnectionHandle> {
        self.bound
    }

    // ── Simulation hooks ──────────────────────────────────────

    /// Simulation: advance the agent's internal state.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_state(&mut self, state: AgentState) {
        self.state = state;
    }

    /// Simulation: set the image state the agent reports.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_image_state(&mut self, state: ImageState) {
        self.image_state = state;
    }

    /// Simulation: raise a completion event.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_raise_event(&mut self, event: AgentEvent) -> bool {
        self.events.push_back(event).is_ok()
    }

    /// Simulation: bump the traffic counters.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_account(&mut self, received: u32, processed: u32) {
        self.counters.received += received;
        self.counters.processed += processed;
        self.counters.queued = self.counters.received - self.counters.processed;
    }
}

impl UpdateAgentPort for OtaAgentAdapter {
    fn init(
        &mut self,
        conn: ConnectionHandle,
        identity: &DeviceIdentity,
    ) -> Result<(), SessionError> {
        // A stopped agent is never reinitialised in place — the caller
        // restarts the device instead.
        if self.state == AgentState::Stopped {
            return Err(SessionError::InitFailed);
        }
        info!("agent: init for '{}' on {:?}", identity.client_id, conn);
        self.bound = Some(conn);
        self.state = AgentState::Init;
        self.image_state = ImageState::None;
        self.counters = AgentCounters::default();
        Ok(())
    }

    fn resume(&mut self, conn: ConnectionHandle) -> Result<(), SessionError> {
        if self.state != AgentState::Suspended {
            return Err(SessionError::ResumeFailed);
        }
        info!("agent: resuming on {:?} (progress retained)", conn);
        self.bound = Some(conn);
        self.state = AgentState::Init;
        // Per-connection statistics restart with the new connection.
        self.counters = AgentCounters::default();
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), SessionError> {
        if self.state == AgentState::Suspended {
            return Ok(()); // idempotent
        }
        info!("agent: suspend requested from {}", self.state.name());
        self.state = AgentState::Suspended;
        Ok(())
    }

    fn shutdown(&mut self, timeout: Duration) -> Result<(), SessionError> {
        info!(
            "agent: shutdown requested (timeout {}s) from {}",
            timeout.as_secs(),
            self.state.name()
        );
        // The agent task drains its queues and stops; on hardware this
        // blocks up to `timeout` on the task's exit notification.
        self.state = AgentState::Stopped;
        self.bound = None;
        Ok(())
    }

    fn state(&self) -> AgentState {
        self.state
    }

    fn image_state(&self) -> ImageState {
        self.image_state
    }

    #[cfg(target_os = "espidf")]
    fn set_image_state(&mut self, state: ImageState) -> Result<(), SessionError> {
        match state {
            ImageState::Accepted => {
                // Confirms the running image so the bootloader keeps it.
                if let Err(e) = esp_ota::mark_app_valid() {
                    warn!("agent: mark_app_valid failed: {:?}", e);
                    return Err(SessionError::ActivateFailed);
                }
            }
            ImageState::Rejected => {
                // Reverts to the previous image; does not return on success.
                if let Err(e) = esp_ota::rollback_and_reboot() {
                    warn!("agent: rollback failed: {:?}", e);
                    return Err(SessionError::ActivateFailed);
                }
            }
            _ => {}
        }
        self.image_state = state;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_image_state(&mut self, state: ImageState) -> Result<(), SessionError> {
        info!("agent(sim): image state -> {:?}", state);
        self.image_state = state;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    #[allow(unreachable_code)]
    fn activate_image(&mut self) -> Result<(), SessionError> {
        // The agent's transfer task already wrote the image and set the
        // boot partition; activation is a device reset into it.
        info!("agent: activating new image — restarting");
        unsafe {
            esp_idf_svc::sys::esp_restart();
        }
        // esp_restart does not return; reaching this line is a failure.
        Err(SessionError::ActivateFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn activate_image(&mut self) -> Result<(), SessionError> {
        info!("agent(sim): image activation (device reset elided)");
        Ok(())
    }

    fn counters(&self) -> AgentCounters {
        self.counters
    }

    fn take_event(&mut self) -> Option<AgentEvent> {
        self.events.pop_front()
    }
}

// ───────────────────────────────────────────────────────────────
// Boot-time rollback confirmation
// ───────────────────────────────────────────────────────────────

/// Confirm the running image after an update boot.
///
/// Called once early in `main`. If this firmware is running from a fresh
/// OTA partition pending verification, marking it valid stops the
/// bootloader from rolling back on the next reset.
#[cfg(target_os = "espidf")]
pub fn check_rollback() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("agent: running image confirmed valid"),
        Err(e) => warn!("agent: image confirmation failed: {:?}", e),
    }
}

/// Simulation: no rollback machinery on the host.
#[cfg(not(target_os = "espidf"))]
pub fn check_rollback() {
    info!("agent(sim): rollback check skipped");
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
