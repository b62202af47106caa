//! Integration tests for the top-level mode selector: probe → operational,
//! provisioning fallback, and terminal surfacing.

use core::time::Duration;
use std::rc::Rc;
use std::sync::Arc;

use fieldlink::app::events::AppEvent;
use fieldlink::app::mode::{DeviceMode, ModeSelector};
use fieldlink::app::ports::{AgentState, RadioRole};
use fieldlink::config::SystemConfig;
use fieldlink::connectivity::ConnectivityMonitor;
use fieldlink::provisioning::ProvisioningEvents;
use fieldlink::session::UpdateSessionOrchestrator;
use fieldlink::session::context::SessionExit;
use fieldlink::{Error, ProvisioningError};

use crate::mock_ports::{
    CallLog, FakeClock, MemStore, MockAgent, MockRadio, MockTransport, SeqRng, VecSink, creds,
    identity, new_log,
};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

struct Harness {
    clock: Rc<FakeClock>,
    #[allow(dead_code)]
    log: CallLog,
    events: Arc<ProvisioningEvents>,
    radio: MockRadio,
    transport: MockTransport,
    store: MemStore,
    agent: MockAgent,
    sink: VecSink,
    rng: SeqRng,
    orchestrator: UpdateSessionOrchestrator,
    selector: ModeSelector,
}

impl Harness {
    fn new(config: SystemConfig) -> Self {
        let clock = FakeClock::new();
        let log = new_log();
        let events = Arc::new(ProvisioningEvents::new());
        Self {
            radio: MockRadio::new(Arc::clone(&events)),
            transport: MockTransport::new(Rc::clone(&log)),
            store: MemStore::empty(),
            agent: MockAgent::new(Rc::clone(&clock), Rc::clone(&log)),
            sink: VecSink::new(),
            rng: SeqRng::new(&[0]),
            orchestrator:
                UpdateSessionOrchestrator::new(config.clone(), ConnectivityMonitor::new()),
            selector: ModeSelector::new(config),
            clock,
            log,
            events,
        }
    }

    fn start(&mut self) -> Result<SessionExit, Error> {
        self.selector.start(
            &identity(),
            &mut self.orchestrator,
            &mut self.radio,
            &mut self.transport,
            &mut self.store,
            &mut self.agent,
            self.clock.as_ref(),
            &mut self.rng,
            &mut self.sink,
            &self.events,
        )
    }

    fn modes(&self) -> Vec<DeviceMode> {
        self.sink
            .events
            .iter()
            .filter_map(|e| match e {
                AppEvent::ModeEntered(mode) => Some(*mode),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn no_credentials_provisions_then_runs_session() {
    let mut h = Harness::new(SystemConfig::default());

    // Provisioning delivers credentials at t = 1 s; the session then runs
    // until the agent stops.
    let events = Arc::clone(&h.events);
    h.clock.at(secs(1), move || {
        events.notify_credentials(creds("ProvNet"));
    });
    h.agent.schedule_state(secs(30), AgentState::Closing);
    h.agent.schedule_state(secs(32), AgentState::Stopped);

    let exit = h.start().unwrap();

    assert_eq!(exit, SessionExit::AgentStopped);
    assert_eq!(h.modes(), vec![DeviceMode::Provisioning, DeviceMode::Operational]);
    assert_eq!(h.store.persisted.len(), 1);
    assert!(h.radio.joins.get() >= 1, "join retried after provisioning");
    assert_eq!(h.transport.connects.get(), 1);
}

#[test]
fn failed_join_probe_falls_back_to_provisioning() {
    let mut h = Harness::new(SystemConfig::default());
    h.store = MemStore::with(creds("StaleNet"));
    // All three probe attempts fail; the fourth join (post-provisioning)
    // succeeds.
    h.radio.fail_joins(3);

    let events = Arc::clone(&h.events);
    h.clock.at(secs(5), move || {
        events.notify_credentials(creds("FreshNet"));
    });
    h.agent.schedule_state(secs(30), AgentState::Closing);
    h.agent.schedule_state(secs(32), AgentState::Stopped);

    let exit = h.start().unwrap();

    assert_eq!(exit, SessionExit::AgentStopped);
    assert_eq!(h.radio.joins.get(), 4);
    assert_eq!(h.modes(), vec![DeviceMode::Provisioning, DeviceMode::Operational]);
    assert_eq!(h.store.stored.as_ref().unwrap().ssid.as_str(), "FreshNet");
}

#[test]
fn session_failure_falls_back_to_provisioning() {
    let mut config = SystemConfig::default();
    config.provisioning_inactivity_secs = 2;
    let mut h = Harness::new(config);
    h.store = MemStore::with(creds("FieldNet"));
    h.transport.always_fail.set(true);

    let err = h.start().unwrap_err();

    // The session exhausted its retries, fell back to provisioning, and
    // the (credential-less) provisioning attempt timed out.
    assert_eq!(err, Error::Provisioning(ProvisioningError::InactivityTimeout));
    assert_eq!(h.modes(), vec![DeviceMode::Operational, DeviceMode::Provisioning]);
    assert_eq!(h.sink.retry_count(), 5);
}

#[test]
fn role_mismatch_in_provisioning_surfaces() {
    let mut h = Harness::new(SystemConfig::default());
    h.radio.confirm_role.set(Some(RadioRole::Station));

    let err = h.start().unwrap_err();
    assert_eq!(err, Error::Provisioning(ProvisioningError::RoleMismatch));
    assert_eq!(h.modes(), vec![DeviceMode::Provisioning]);
}

#[test]
fn probe_uses_fixed_delay_not_backoff() {
    let mut h = Harness::new(SystemConfig::default());
    h.store = MemStore::with(creds("FieldNet"));
    h.radio.fail_joins(2);

    h.agent.schedule_state(secs(10), AgentState::Closing);
    h.agent.schedule_state(secs(12), AgentState::Stopped);

    let exit = h.start().unwrap();
    assert_eq!(exit, SessionExit::AgentStopped);
    assert_eq!(h.radio.joins.get(), 3);

    // Two fixed inter-attempt delays from the probe, no jitter drawn.
    let delay = Duration::from_millis(u64::from(SystemConfig::default().join_retry_delay_ms));
    let sleeps = h.clock.sleeps();
    assert_eq!(&sleeps[..2], &[delay, delay]);
    assert_eq!(h.sink.retry_count(), 0);
}
