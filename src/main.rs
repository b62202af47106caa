//! FieldLink Firmware — Main Entry Point
//!
//! Hexagonal architecture: every collaborator reaches the core through a
//! port trait, wired up here.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiRadioAdapter   TlsControlTransport   OtaAgentAdapter      │
//! │  (Radio+Provision)  (ControlTransport)    (UpdateAgent)        │
//! │  CredentialStore    Esp32Clock  HardwareRng  LogEventSink      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  ModeSelector (pure logic)                             │    │
//! │  │  Provisioning machine · Update session loop · Backoff  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! When the selector returns — the agent stopped, the image was aborted,
//! or provisioning gave up — the device restarts after a fixed delay
//! rather than spinning; a fresh boot re-enters the whole flow.
#![deny(unused_must_use)]

use core::time::Duration;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use log::{error, info, warn};

use fieldlink::adapters::agent::{self, OtaAgentAdapter};
use fieldlink::adapters::cert_store::CredentialStore;
use fieldlink::adapters::device_id;
use fieldlink::adapters::entropy::HardwareRng;
use fieldlink::adapters::log_sink::LogEventSink;
use fieldlink::adapters::time::Esp32Clock;
use fieldlink::adapters::tls_transport::TlsControlTransport;
use fieldlink::adapters::wifi::WifiRadioAdapter;
use fieldlink::app::mode::ModeSelector;
use fieldlink::app::ports::{ClockPort, ControlTransportPort};
use fieldlink::connectivity::ConnectivityMonitor;
use fieldlink::provisioning::ProvisioningEvents;
use fieldlink::session::UpdateSessionOrchestrator;

/// Delay before the post-session restart.
const RESTART_DELAY_SECS: u64 = 60;

#[allow(unreachable_code)]
fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init().map_err(|e| anyhow!("logger init: {e:?}"))?;

    let identity = device_id::identity();
    info!("╔══════════════════════════════════════╗");
    info!("║  FieldLink v{}  {}        ║", env!("CARGO_PKG_VERSION"), identity.client_id);
    info!("╚══════════════════════════════════════╝");

    // ── 1b. Confirm the running image (post-update boot) ──────
    agent::check_rollback();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut store = CredentialStore::new().map_err(|e| anyhow!("credential store: {e}"))?;
    let config = match store.load_config() {
        Some(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        None => {
            info!("No stored config, using defaults");
            fieldlink::config::SystemConfig::default()
        }
    };

    if store.load_tls_bundle().is_none() {
        // The device can still be Wi-Fi provisioned; the control connection
        // will fail until factory provisioning installs the TLS material.
        warn!("TLS bundle missing — control-plane auth unavailable");
    }

    // ── 3. Wire the adapters ──────────────────────────────────
    let clock = Esp32Clock::new();
    let mut rng = HardwareRng::new();
    let mut sink = LogEventSink::new();

    let monitor = ConnectivityMonitor::new();
    let events = Arc::new(ProvisioningEvents::new());
    let mut radio = WifiRadioAdapter::new(Arc::clone(&events));
    let mut transport = TlsControlTransport::new();
    transport.register_disconnect_handle(monitor.handle());
    let mut agent = OtaAgentAdapter::new();

    let mut orchestrator = UpdateSessionOrchestrator::new(config.clone(), monitor);
    let mut selector = ModeSelector::new(config);

    // ── 4. Run the top-level control flow ─────────────────────
    match selector.start(
        &identity,
        &mut orchestrator,
        &mut radio,
        &mut transport,
        &mut store,
        &mut agent,
        &clock,
        &mut rng,
        &mut sink,
        &events,
    ) {
        Ok(exit) => info!("Core finished: {:?}", exit),
        Err(e) => error!("Core exited with error: {e}"),
    }

    // ── 5. Restart policy ─────────────────────────────────────
    // A stopped/aborted agent and an abandoned provisioning attempt both
    // resolve the same way: timed restart into a clean boot.
    info!("Restarting in {}s", RESTART_DELAY_SECS);
    clock.sleep(Duration::from_secs(RESTART_DELAY_SECS));
    unsafe {
        esp_idf_svc::sys::esp_restart();
    }
    Ok(())
}
