//! Update-session orchestration — the reconnection and agent-lifecycle loop.
//!
//! ```text
//!        ┌────────────────────────────────────────────────────────┐
//!        ▼                                                        │
//!  CONNECT (backoff per attempt, bounded) ──exhausted──▶ Err      │
//!        │ ok                                                     │
//!        ▼                                                        │
//!  BIND SESSION (resume if Suspended, else init; reset backoff)   │
//!        ▼                                                        │
//!  MONITOR (poll every 2 s: agent state, image state, link flag,  │
//!           statistics)                                           │
//!        │                                                        │
//!        ├── link lost ──▶ suspend, await Suspended ──────────────┘
//!        │
//!        └── agent Stopped / image Aborted ──▶ graceful shutdown,
//!            disconnect, return (caller restarts the device)
//! ```
//!
//! The loop never acts on the assumption that a suspend completed
//! immediately: the agent may be mid-write to flash when the disconnect
//! lands, so reconnection waits for the confirmed `Suspended` state.
//! Disconnect notifications land on the shared connectivity flag and take
//! effect at the next poll — staleness bounded by one tick.

pub mod context;

use core::time::Duration;

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{
    AgentEvent, AgentState, ClockPort, ConnectParams, ConnectionHandle, ControlTransportPort,
    DeviceIdentity, EventSink, ImageState, JitterRng, UpdateAgentPort,
};
use crate::backoff::{self, RetryContext};
use crate::config::SystemConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Error, Result, SessionError};

use context::{SessionExit, SessionStats, UpdateSessionContext};

/// Why the monitor loop stopped watching the current connection.
enum ExitCondition {
    AgentStopped,
    ImageAborted,
    Disconnected,
}

/// The connection-retry loop, session lifecycle driver, and statistics
/// reporter. Owns the connectivity monitor for the process lifetime.
pub struct UpdateSessionOrchestrator {
    config: SystemConfig,
    monitor: ConnectivityMonitor,
}

impl UpdateSessionOrchestrator {
    pub fn new(config: SystemConfig, monitor: ConnectivityMonitor) -> Self {
        Self { config, monitor }
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// Run the operational session loop until the agent ends or a fatal
    /// error surfaces.
    ///
    /// Internally reconnects across disconnects (suspending the agent in
    /// between). Returns `Ok` when the agent stopped, the image was aborted
    /// or activated — the caller decides whether to restart the device.
    /// Errors that exhaust local recovery (`RetriesExhausted`, suspend or
    /// shutdown timeouts) are propagated, never swallowed.
    pub fn run(
        &mut self,
        identity: &DeviceIdentity,
        transport: &mut impl ControlTransportPort,
        agent: &mut impl UpdateAgentPort,
        clock: &impl ClockPort,
        rng: &mut impl JitterRng,
        sink: &mut impl EventSink,
    ) -> Result<SessionExit> {
        info!(
            "session: FieldLink update core v{} as '{}'",
            env!("CARGO_PKG_VERSION"),
            identity.client_id
        );

        let poll = Duration::from_secs(u64::from(self.config.monitor_poll_secs));

        loop {
            // ── Phase 1: connect ──────────────────────────────
            let handle = self.connect_with_backoff(identity, transport, clock, rng, sink)?;

            // ── Phase 2: bind the session ─────────────────────
            self.monitor.mark_connected();
            let resumed = agent.state() == AgentState::Suspended;
            let bind = if resumed {
                info!("session: resuming suspended agent");
                agent.resume(handle)
            } else {
                agent.init(handle, identity)
            };
            if let Err(e) = bind {
                // The connection must not outlive a session that never
                // bound to it.
                transport.disconnect(handle);
                return Err(e.into());
            }
            let mut ctx = UpdateSessionContext::new(handle, agent.state());
            sink.emit(&AppEvent::ControlConnected { resumed });

            // ── Phase 3: monitor ──────────────────────────────
            let condition = loop {
                clock.sleep(poll);

                if let Some(exit) = self.drain_agent_events(agent, transport, handle)? {
                    sink.emit(&AppEvent::SessionEnded(exit));
                    return Ok(exit);
                }

                ctx.observe(agent.state());
                let stats = SessionStats {
                    state: ctx.agent_state,
                    counters: agent.counters(),
                };
                info!(
                    "session: state={} received={} queued={} processed={} dropped={}",
                    stats.state.name(),
                    stats.counters.received,
                    stats.counters.queued,
                    stats.counters.processed,
                    stats.counters.dropped,
                );
                sink.emit(&AppEvent::SessionStats(stats));

                if ctx.agent_state == AgentState::Stopped {
                    break ExitCondition::AgentStopped;
                }
                if agent.image_state() == ImageState::Aborted {
                    break ExitCondition::ImageAborted;
                }
                if !self.monitor.is_connected() {
                    break ExitCondition::Disconnected;
                }
            };

            // ── Phase 4: exit handling ────────────────────────
            match condition {
                ExitCondition::Disconnected => {
                    let reason = self.monitor.last_disconnect_reason();
                    warn!(
                        "session: connection lost ({}) — suspending agent",
                        reason.name()
                    );
                    sink.emit(&AppEvent::ConnectionLost(reason));
                    self.suspend_and_confirm(agent, clock, poll)?;
                    transport.disconnect(handle);
                    // Back to phase 1 with a fresh retry budget.
                }
                condition @ (ExitCondition::AgentStopped | ExitCondition::ImageAborted) => {
                    let timeout =
                        Duration::from_secs(u64::from(self.config.shutdown_timeout_secs));
                    info!("session: agent done — shutting down (timeout {timeout:?})");
                    let shutdown = agent.shutdown(timeout);
                    transport.disconnect(handle);
                    shutdown.map_err(Error::from)?;

                    let exit = match condition {
                        ExitCondition::ImageAborted => SessionExit::ImageAborted,
                        _ => SessionExit::AgentStopped,
                    };
                    sink.emit(&AppEvent::SessionEnded(exit));
                    info!("session: ended ({exit:?})");
                    return Ok(exit);
                }
            }
        }
    }

    // ── Connect phase ─────────────────────────────────────────

    /// Attempt the control connection, sleeping a jittered backoff between
    /// failures. A fresh `RetryContext` bounds each sequence; success
    /// clears backoff memory.
    fn connect_with_backoff(
        &self,
        identity: &DeviceIdentity,
        transport: &mut impl ControlTransportPort,
        clock: &impl ClockPort,
        rng: &mut impl JitterRng,
        sink: &mut impl EventSink,
    ) -> Result<ConnectionHandle> {
        let params = ConnectParams::build(&self.config, identity);
        let mut retry = RetryContext::from_config(&self.config);

        loop {
            info!(
                "session: connecting to {}:{} (alpn={})",
                params.host, params.port, params.use_alpn
            );
            match transport.connect(&params) {
                Ok(handle) => {
                    retry.reset();
                    info!("session: control connection established");
                    return Ok(handle);
                }
                Err(e) => {
                    warn!("session: connect failed: {e}");
                    match backoff::next_delay(&mut retry, rng) {
                        Ok(delay) => {
                            let delay_ms = delay.as_millis() as u64;
                            info!(
                                "session: retrying in {} ms (attempt {}/{})",
                                delay_ms,
                                retry.attempts_done(),
                                retry.max_attempts()
                            );
                            sink.emit(&AppEvent::ConnectRetryScheduled {
                                attempt: retry.attempts_done(),
                                delay_ms,
                            });
                            clock.sleep(delay);
                        }
                        Err(exhausted) => {
                            warn!("session: {exhausted}; giving up this run");
                            return Err(exhausted.into());
                        }
                    }
                }
            }
        }
    }

    // ── Suspend path ──────────────────────────────────────────

    /// Request suspension and poll until the agent confirms `Suspended`.
    ///
    /// The wait is bounded by `suspend_ack_timeout_secs`; expiry is fatal
    /// for this run — reconnecting while the agent may still be writing to
    /// flash is the failure mode this guards against.
    fn suspend_and_confirm(
        &self,
        agent: &mut impl UpdateAgentPort,
        clock: &impl ClockPort,
        poll: Duration,
    ) -> Result<()> {
        agent.suspend().map_err(Error::from)?;

        let deadline =
            clock.now() + Duration::from_secs(u64::from(self.config.suspend_ack_timeout_secs));
        while agent.state() != AgentState::Suspended {
            if clock.now() >= deadline {
                return Err(SessionError::SuspendTimeout.into());
            }
            clock.sleep(poll);
        }
        info!("session: agent suspend confirmed");
        Ok(())
    }

    // ── Agent completion events ───────────────────────────────

    /// Drain pending completion events. Returns a session exit when an
    /// event ends the session (image activation).
    fn drain_agent_events(
        &self,
        agent: &mut impl UpdateAgentPort,
        transport: &mut impl ControlTransportPort,
        handle: ConnectionHandle,
    ) -> Result<Option<SessionExit>> {
        while let Some(event) = agent.take_event() {
            match event {
                AgentEvent::Activate => {
                    info!("session: update accepted — activating new image");
                    transport.disconnect(handle);
                    // On hardware this resets the device and never returns.
                    agent.activate_image().map_err(Error::from)?;
                    return Ok(Some(SessionExit::ImageActivated));
                }
                AgentEvent::StartTest => {
                    info!("session: new image in self-test — marking accepted");
                    if let Err(e) = agent.set_image_state(ImageState::Accepted) {
                        warn!("session: failed to mark image accepted: {e}");
                    }
                }
                AgentEvent::Fail => {
                    info!("session: update job failed; agent handles cleanup");
                }
            }
        }
        Ok(None)
    }
}
