//! Top-level mode selection: Provisioning vs Operational.
//!
//! On startup the selector probes the stored-credential network join with a
//! short, fixed number of retries. Success hands control to the update
//! session loop; failure (or absent credentials) enters provisioning mode,
//! which blocks until credentials arrive or the attempt ends. A
//! `Provisioned` terminal loops back to the join probe; `TimedOut` and
//! error terminals are surfaced to the caller — the deployment owns the
//! outer provisioning retry policy, since unbounded local retry risks
//! locking the radio out of station mode.

use core::time::Duration;
use std::sync::Arc;

use log::{info, warn};

use crate::config::SystemConfig;
use crate::error::{ProvisioningError, Result};
use crate::provisioning::{
    ProvisioningEvents, ProvisioningOutcome, ProvisioningSession,
};
use crate::session::UpdateSessionOrchestrator;
use crate::session::context::SessionExit;

use super::events::AppEvent;
use super::ports::{
    ClockPort, ControlTransportPort, CredentialStorePort, DeviceIdentity, EventSink, JitterRng,
    ProvisioningProtocolPort, RadioPort, RadioRole, UpdateAgentPort,
};

/// The two top-level operating modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// Broadcasting/accepting configuration to learn network credentials.
    Provisioning,
    /// Credentials exist; maintaining the update control-plane session.
    Operational,
}

/// Chooses the operating mode and loops between provisioning and the
/// operational session until a terminal outcome.
pub struct ModeSelector {
    config: SystemConfig,
}

impl ModeSelector {
    pub fn new(config: SystemConfig) -> Self {
        Self { config }
    }

    /// Run the device's top-level control flow.
    ///
    /// Returns when the update session ends (caller restarts the device) or
    /// when a provisioning attempt ends without credentials. Session
    /// failures fall back to provisioning rather than terminating.
    /// The `radio` parameter satisfies both [`RadioPort`] and
    /// [`ProvisioningProtocolPort`] — the two faces of the single radio.
    pub fn start(
        &mut self,
        identity: &DeviceIdentity,
        orchestrator: &mut UpdateSessionOrchestrator,
        radio: &mut (impl RadioPort + ProvisioningProtocolPort),
        transport: &mut impl ControlTransportPort,
        store: &mut impl CredentialStorePort,
        agent: &mut impl UpdateAgentPort,
        clock: &impl ClockPort,
        rng: &mut impl JitterRng,
        sink: &mut impl EventSink,
        events: &Arc<ProvisioningEvents>,
    ) -> Result<SessionExit> {
        loop {
            if self.join_with_stored_credentials(radio, store, clock) {
                sink.emit(&AppEvent::ModeEntered(DeviceMode::Operational));
                match orchestrator.run(identity, transport, agent, clock, rng, sink) {
                    Ok(exit) => return Ok(exit),
                    Err(e) => {
                        warn!("mode: session failed ({e}) — falling back to provisioning");
                    }
                }
            }

            sink.emit(&AppEvent::ModeEntered(DeviceMode::Provisioning));
            let mut session =
                ProvisioningSession::new(RadioRole::AccessPoint, Arc::clone(events));
            match session.run(radio, store, clock, sink, &self.config)? {
                ProvisioningOutcome::Provisioned => {
                    info!("mode: provisioned — retrying stored-credential join");
                }
                ProvisioningOutcome::TimedOut => {
                    warn!("mode: provisioning timed out; outer policy decides the retry");
                    return Err(ProvisioningError::InactivityTimeout.into());
                }
            }
        }
    }

    /// Probe the stored-credential join: short, fixed retry count, fixed
    /// delay, no backoff, no provisioning fallback inside the probe.
    fn join_with_stored_credentials(
        &self,
        radio: &mut impl RadioPort,
        store: &mut impl CredentialStorePort,
        clock: &impl ClockPort,
    ) -> bool {
        let Some(credentials) = store.load() else {
            info!("mode: no stored credentials");
            return false;
        };

        let timeout = Duration::from_millis(u64::from(self.config.join_timeout_ms));
        let retry_delay = Duration::from_millis(u64::from(self.config.join_retry_delay_ms));

        for attempt in 1..=u32::from(self.config.join_attempts) {
            info!(
                "mode: joining '{}' (attempt {}/{})",
                credentials.ssid, attempt, self.config.join_attempts
            );
            match radio.join(&credentials, timeout) {
                Ok(()) => {
                    info!("mode: joined stored network");
                    return true;
                }
                Err(e) => {
                    warn!("mode: join failed: {e}");
                    if attempt < u32::from(self.config.join_attempts) {
                        clock.sleep(retry_delay);
                    }
                }
            }
        }
        false
    }
}
