//! Integration tests for the update-session orchestrator: connect/backoff,
//! suspend/resume across disconnects, graceful exits, and fatal paths.

use core::time::Duration;
use std::rc::Rc;

use fieldlink::app::events::AppEvent;
use fieldlink::app::ports::{AgentEvent, AgentState, ImageState};
use fieldlink::config::SystemConfig;
use fieldlink::connectivity::{ConnectivityMonitor, DisconnectReason};
use fieldlink::session::UpdateSessionOrchestrator;
use fieldlink::session::context::SessionExit;
use fieldlink::{ConnectError, Error, SessionError};

use crate::mock_ports::{
    CallLog, FakeClock, MockAgent, MockTransport, SeqRng, VecSink, identity, new_log,
};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

struct Harness {
    clock: Rc<FakeClock>,
    log: CallLog,
    transport: MockTransport,
    agent: MockAgent,
    sink: VecSink,
    orchestrator: UpdateSessionOrchestrator,
}

impl Harness {
    fn new() -> Self {
        let clock = FakeClock::new();
        let log = new_log();
        Self {
            transport: MockTransport::new(Rc::clone(&log)),
            agent: MockAgent::new(Rc::clone(&clock), Rc::clone(&log)),
            sink: VecSink::new(),
            orchestrator:
                UpdateSessionOrchestrator::new(SystemConfig::default(), ConnectivityMonitor::new()),
            clock,
            log,
        }
    }

    fn run(&mut self, rng: &mut SeqRng) -> Result<SessionExit, Error> {
        self.orchestrator.run(
            &identity(),
            &mut self.transport,
            &mut self.agent,
            self.clock.as_ref(),
            rng,
            &mut self.sink,
        )
    }
}

// ── Scenario A: first-attempt connect, no backoff ─────────────

#[test]
fn clean_session_first_attempt_no_backoff() {
    let mut h = Harness::new();
    h.agent.schedule_state(secs(2), AgentState::Requesting);
    h.agent.schedule_state(secs(4), AgentState::Transferring);
    h.agent.schedule_state(secs(6), AgentState::Closing);
    h.agent.schedule_state(secs(8), AgentState::Stopped);

    let mut rng = SeqRng::new(&[0]);
    let exit = h.run(&mut rng).unwrap();

    assert_eq!(exit, SessionExit::AgentStopped);
    assert_eq!(h.transport.connects.get(), 1);
    assert_eq!(h.sink.retry_count(), 0);
    assert_eq!(rng.calls(), 0, "no backoff delay may be computed");
    // The first monitor tick already observes Requesting.
    assert_eq!(h.sink.stats().first(), Some(&AgentState::Requesting));
    assert!(h.log.borrow().contains(&"shutdown"));
    assert_eq!(h.transport.disconnects.borrow().len(), 1);
}

#[test]
fn stats_emitted_every_tick() {
    let mut h = Harness::new();
    h.agent.schedule_state(secs(2), AgentState::Requesting);
    h.agent.schedule_state(secs(6), AgentState::Closing);
    h.agent.schedule_state(secs(8), AgentState::Stopped);

    let mut rng = SeqRng::new(&[0]);
    h.run(&mut rng).unwrap();

    // Ticks at t = 2, 4, 6, 8 — one stats snapshot each.
    assert_eq!(h.sink.stats().len(), 4);
}

#[test]
fn connect_params_carry_config_and_identity() {
    let mut h = Harness::new();
    h.agent.set_state(AgentState::Stopped);

    let mut rng = SeqRng::new(&[0]);
    // Init on a stopped agent fails; only the params matter here.
    let _ = h.run(&mut rng);

    let params = h.transport.last_params.borrow().clone().unwrap();
    assert_eq!(params.host, SystemConfig::default().broker_host);
    assert_eq!(params.client_id.as_str(), "FL-TEST01");
    assert!(!params.use_alpn);
}

// ── Scenario B: three failures, then success ──────────────────

#[test]
fn backoff_delays_then_successful_session() {
    let mut h = Harness::new();
    h.transport.fail_next(3, ConnectError::Timeout);
    // Windows: 500, 1000, 2000 ms — draws land inside each window.
    let mut rng = SeqRng::new(&[100, 700, 1500]);

    h.agent.schedule_state(secs(5), AgentState::Closing);
    h.agent.schedule_state(secs(6), AgentState::Stopped);

    let exit = h.run(&mut rng).unwrap();

    assert_eq!(exit, SessionExit::AgentStopped);
    assert_eq!(h.transport.connects.get(), 4);
    assert_eq!(rng.calls(), 3, "exactly three backoff delays computed");

    let delays: Vec<u64> = h
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::ConnectRetryScheduled { delay_ms, .. } => Some(*delay_ms),
            _ => None,
        })
        .collect();
    assert_eq!(delays, vec![100, 700, 1500]);

    // The delays were actually slept, in order, before the monitor ticks.
    let sleeps = h.clock.sleeps();
    assert_eq!(
        &sleeps[..3],
        &[
            Duration::from_millis(100),
            Duration::from_millis(700),
            Duration::from_millis(1500)
        ]
    );
}

#[test]
fn retries_exhausted_propagates() {
    let mut h = Harness::new();
    h.transport.always_fail.set(true);

    let mut rng = SeqRng::new(&[42]);
    let err = h.run(&mut rng).unwrap_err();

    assert_eq!(err, Error::RetriesExhausted);
    // max_attempts = 5: the initial attempt plus five retried ones.
    assert_eq!(h.transport.connects.get(), 6);
    assert_eq!(h.sink.retry_count(), 5);
    assert!(!h.log.borrow().contains(&"init"), "no session may start");
}

// ── Scenario C: disconnect mid-session → suspend → reconnect ──

#[test]
fn disconnect_suspends_then_resumes_on_fresh_connection() {
    let mut h = Harness::new();
    h.agent.schedule_state(secs(2), AgentState::Requesting);
    h.agent.schedule_state(secs(4), AgentState::Transferring);
    h.agent.suspend_latency.set(secs(2));

    let handle = h.orchestrator.monitor().handle();
    h.clock.at(secs(5), move || {
        handle.on_disconnect(DisconnectReason::KeepAliveTimeout);
    });

    // After the reconnect the transfer finishes.
    h.agent.schedule_state(secs(20), AgentState::Closing);
    h.agent.schedule_state(secs(21), AgentState::Stopped);

    let mut rng = SeqRng::new(&[0]);
    let exit = h.run(&mut rng).unwrap();

    assert_eq!(exit, SessionExit::AgentStopped);
    assert_eq!(h.transport.connects.get(), 2);
    assert_eq!(rng.calls(), 0, "successful connects leave backoff untouched");

    let log = h.log.borrow().clone();
    let inits = log.iter().filter(|c| **c == "init").count();
    let resumes = log.iter().filter(|c| **c == "resume").count();
    assert_eq!((inits, resumes), (1, 1), "resume, not reinit, after suspend");

    // Suspend must be confirmed before the second connect happens.
    let suspend_pos = log.iter().position(|c| *c == "suspend").unwrap();
    let second_connect_pos = log
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == "connect")
        .map(|(i, _)| i)
        .nth(1)
        .unwrap();
    assert!(suspend_pos < second_connect_pos);

    assert!(h.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::ConnectionLost(DisconnectReason::KeepAliveTimeout)
    )));
    assert!(h
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::ControlConnected { resumed: true })));
}

#[test]
fn suspend_confirmation_timeout_is_fatal() {
    let mut h = Harness::new();
    h.agent.schedule_state(secs(2), AgentState::Transferring);
    // Longer than suspend_ack_timeout_secs (30 s default).
    h.agent.suspend_latency.set(secs(60));

    let handle = h.orchestrator.monitor().handle();
    h.clock.at(secs(3), move || {
        handle.on_disconnect(DisconnectReason::ProtocolError);
    });

    let mut rng = SeqRng::new(&[0]);
    let err = h.run(&mut rng).unwrap_err();
    assert_eq!(err, Error::Session(SessionError::SuspendTimeout));
}

// ── Scenario D: image aborted while connected ─────────────────

#[test]
fn aborted_image_shuts_down_and_exits() {
    let mut h = Harness::new();
    h.agent.schedule_state(secs(2), AgentState::Requesting);
    h.agent.schedule_image(secs(4), ImageState::Aborted);

    let mut rng = SeqRng::new(&[0]);
    let exit = h.run(&mut rng).unwrap();

    assert_eq!(exit, SessionExit::ImageAborted);
    assert_eq!(h.transport.connects.get(), 1, "no reconnect after abort");
    let log = h.log.borrow().clone();
    assert!(log.contains(&"shutdown"));
    assert!(!log.contains(&"suspend"));
    assert_eq!(h.transport.disconnects.borrow().len(), 1);
    assert!(h
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::SessionEnded(SessionExit::ImageAborted))));
}

#[test]
fn shutdown_timeout_is_fatal_but_connection_still_closed() {
    let mut h = Harness::new();
    h.agent.schedule_state(secs(2), AgentState::Closing);
    h.agent.schedule_state(secs(4), AgentState::Stopped);
    h.agent.fail_shutdown.set(true);

    let mut rng = SeqRng::new(&[0]);
    let err = h.run(&mut rng).unwrap_err();

    assert_eq!(err, Error::Session(SessionError::ShutdownTimeout));
    assert_eq!(h.transport.disconnects.borrow().len(), 1);
}

// ── Agent completion events ───────────────────────────────────

#[test]
fn activate_event_closes_connection_then_activates() {
    let mut h = Harness::new();
    h.agent.push_event(AgentEvent::Activate);

    let mut rng = SeqRng::new(&[0]);
    let exit = h.run(&mut rng).unwrap();

    assert_eq!(exit, SessionExit::ImageActivated);
    let log = h.log.borrow().clone();
    let disconnect_pos = log.iter().position(|c| *c == "disconnect").unwrap();
    let activate_pos = log.iter().position(|c| *c == "activate").unwrap();
    assert!(
        disconnect_pos < activate_pos,
        "connection must be closed before activation"
    );
}

#[test]
fn start_test_event_marks_image_accepted() {
    let mut h = Harness::new();
    h.agent.push_event(AgentEvent::StartTest);
    h.agent.schedule_state(secs(4), AgentState::Closing);
    h.agent.schedule_state(secs(6), AgentState::Stopped);

    let mut rng = SeqRng::new(&[0]);
    let exit = h.run(&mut rng).unwrap();

    assert_eq!(exit, SessionExit::AgentStopped);
    assert!(h.log.borrow().contains(&"set_image_state"));
    use fieldlink::app::ports::UpdateAgentPort;
    assert_eq!(h.agent.image_state(), ImageState::Accepted);
}

#[test]
fn fail_event_does_not_end_session() {
    let mut h = Harness::new();
    h.agent.push_event(AgentEvent::Fail);
    h.agent.schedule_state(secs(4), AgentState::Closing);
    h.agent.schedule_state(secs(6), AgentState::Stopped);

    let mut rng = SeqRng::new(&[0]);
    let exit = h.run(&mut rng).unwrap();
    assert_eq!(exit, SessionExit::AgentStopped);
}
