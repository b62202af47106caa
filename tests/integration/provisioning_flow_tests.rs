//! Integration tests for the provisioning state machine: role confirmation,
//! credential delivery, inactivity, and abort paths.

use core::time::Duration;
use std::sync::Arc;

use fieldlink::app::events::AppEvent;
use fieldlink::app::ports::ClockPort;
use fieldlink::app::ports::RadioRole;
use fieldlink::config::SystemConfig;
use fieldlink::provisioning::{
    ProvisioningEvents, ProvisioningOutcome, ProvisioningSession, ProvisioningState,
};
use fieldlink::{CredentialError, Error, ProvisioningError, RadioError};

use crate::mock_ports::{FakeClock, MemStore, MockRadio, VecSink, creds};

struct Harness {
    clock: std::rc::Rc<FakeClock>,
    events: Arc<ProvisioningEvents>,
    radio: MockRadio,
    store: MemStore,
    sink: VecSink,
    config: SystemConfig,
    session: ProvisioningSession,
}

impl Harness {
    fn new() -> Self {
        let events = Arc::new(ProvisioningEvents::new());
        Self {
            clock: FakeClock::new(),
            radio: MockRadio::new(Arc::clone(&events)),
            store: MemStore::empty(),
            sink: VecSink::new(),
            config: SystemConfig::default(),
            session: ProvisioningSession::new(RadioRole::AccessPoint, Arc::clone(&events)),
            events,
        }
    }

    fn run(&mut self) -> Result<ProvisioningOutcome, Error> {
        self.session.run(
            &mut self.radio,
            &mut self.store,
            self.clock.as_ref(),
            &mut self.sink,
            &self.config,
        )
    }

    /// Deliver credentials through the async event cell at fake time `at`.
    fn deliver_credentials_at(&self, at: Duration, ssid: &str) {
        let events = Arc::clone(&self.events);
        let credentials = creds(ssid);
        self.clock.at(at, move || {
            events.notify_credentials(credentials.clone());
        });
    }
}

#[test]
fn provisioned_happy_path() {
    let mut h = Harness::new();
    h.deliver_credentials_at(Duration::from_millis(500), "ProvNet");

    let outcome = h.run().unwrap();

    assert_eq!(outcome, ProvisioningOutcome::Provisioned);
    assert_eq!(h.session.state(), ProvisioningState::Provisioned);
    assert_eq!(h.radio.start_calls.get(), 1);
    assert_eq!(h.store.persisted.len(), 1);
    assert_eq!(h.store.persisted[0].ssid.as_str(), "ProvNet");
}

#[test]
fn transitions_are_emitted_in_order() {
    let mut h = Harness::new();
    h.deliver_credentials_at(Duration::from_millis(200), "ProvNet");
    h.run().unwrap();

    let transitions: Vec<(ProvisioningState, ProvisioningState)> = h
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Provisioning { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();

    assert_eq!(transitions.first(),
        Some(&(ProvisioningState::Idle, ProvisioningState::Starting)));
    assert_eq!(transitions.last(),
        Some(&(ProvisioningState::ProvisioningActive, ProvisioningState::Provisioned)));
}

// ── Scenario E: role mismatch ─────────────────────────────────

#[test]
fn role_mismatch_terminates_without_starting_protocol() {
    let mut h = Harness::new();
    h.radio.confirm_role.set(Some(RadioRole::Station));

    let err = h.run().unwrap_err();

    assert_eq!(err, Error::Provisioning(ProvisioningError::RoleMismatch));
    assert_eq!(h.session.state(), ProvisioningState::RoleMismatch);
    assert_eq!(
        h.radio.start_calls.get(),
        0,
        "provisioning protocol must not start in the wrong role"
    );
}

#[test]
fn role_confirmation_timeout_is_bounded() {
    let mut h = Harness::new();
    h.radio.no_confirm.set(true);

    let err = h.run().unwrap_err();

    assert_eq!(
        err,
        Error::Provisioning(ProvisioningError::RoleConfirmTimeout)
    );
    assert_eq!(h.session.state(), ProvisioningState::Error);
    // Gave up at the configured bound, not before.
    let bound = Duration::from_secs(u64::from(h.config.role_confirm_timeout_secs));
    assert!(h.clock.now() >= bound);
}

// ── Inactivity ────────────────────────────────────────────────

#[test]
fn inactivity_times_out_and_stops_exchange() {
    let mut h = Harness::new();
    h.config.provisioning_inactivity_secs = 2;

    let outcome = h.run().unwrap();

    assert_eq!(outcome, ProvisioningOutcome::TimedOut);
    assert_eq!(h.session.state(), ProvisioningState::TimedOut);
    assert!(h.radio.stop_calls.get() >= 1);
    assert!(h.store.persisted.is_empty());
}

#[test]
fn forwarded_frames_reset_the_inactivity_window() {
    let mut h = Harness::new();
    h.config.provisioning_inactivity_secs = 2;

    // A frame lands at 1.5 s — pushing the deadline to 3.5 s — and the
    // credentials at 3.0 s, which would be past the original window.
    let events = Arc::clone(&h.events);
    h.clock.at(Duration::from_millis(1500), move || {
        assert!(events.push_frame(b"wlan-cfg-frame"));
    });
    h.deliver_credentials_at(Duration::from_secs(3), "LateNet");

    let outcome = h.run().unwrap();

    assert_eq!(outcome, ProvisioningOutcome::Provisioned);
    assert_eq!(h.radio.forwarded.borrow().as_slice(), &[b"wlan-cfg-frame".to_vec()]);
}

// ── Abort paths ───────────────────────────────────────────────

#[test]
fn radio_reset_failure_aborts_immediately() {
    let mut h = Harness::new();
    h.radio
        .reset_results
        .borrow_mut()
        .push_back(Err(RadioError::InitFailed));

    let err = h.run().unwrap_err();

    assert_eq!(err, Error::Radio(RadioError::InitFailed));
    assert_eq!(h.session.state(), ProvisioningState::Error);
    assert_eq!(h.radio.start_calls.get(), 0);
}

#[test]
fn running_exchange_is_stopped_then_reset_retried() {
    let mut h = Harness::new();
    h.radio
        .reset_results
        .borrow_mut()
        .push_back(Err(RadioError::ProvisioningInProgress));
    h.deliver_credentials_at(Duration::from_millis(500), "ProvNet");

    let outcome = h.run().unwrap();

    assert_eq!(outcome, ProvisioningOutcome::Provisioned);
    assert!(h.radio.stop_calls.get() >= 1, "stale exchange must be stopped");
}

#[test]
fn protocol_start_failure_aborts() {
    let mut h = Harness::new();
    h.radio.fail_start.set(true);

    let err = h.run().unwrap_err();

    assert_eq!(err, Error::Radio(RadioError::CommandFailed));
    assert_eq!(h.session.state(), ProvisioningState::Error);
}

#[test]
fn persist_failure_surfaces() {
    let mut h = Harness::new();
    h.store.fail_persist = true;
    h.deliver_credentials_at(Duration::from_millis(300), "ProvNet");

    let err = h.run().unwrap_err();

    assert_eq!(err, Error::Credential(CredentialError::Io));
    assert_eq!(h.session.state(), ProvisioningState::Error);
}
