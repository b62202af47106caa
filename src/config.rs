//! System configuration parameters
//!
//! All tunable parameters for the FieldLink connectivity and update core.
//! Values can be overridden via NVS; defaults mirror the deployed fleet
//! profile.

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Control-plane endpoint ---
    /// Broker hostname for the update control connection.
    pub broker_host: heapless::String<64>,
    /// Broker TCP port. Port 443 engages ALPN protocol negotiation.
    pub broker_port: u16,
    /// MQTT keep-alive interval (seconds). The broker drops clients silent
    /// for 1.5× this interval.
    pub keep_alive_secs: u16,
    /// Timeout for a single control-connection attempt (milliseconds).
    pub connect_timeout_ms: u32,

    // --- Connection retry backoff ---
    /// Base backoff interval (milliseconds).
    pub retry_base_interval_ms: u32,
    /// Backoff interval cap (milliseconds).
    pub retry_max_interval_ms: u32,
    /// Connection attempts before the retry sequence reports failure.
    pub retry_max_attempts: u32,

    // --- Session monitoring ---
    /// Cadence of the session monitor loop (seconds).
    pub monitor_poll_secs: u16,
    /// Graceful agent shutdown timeout (seconds).
    pub shutdown_timeout_secs: u16,
    /// Bounded wait for the agent to confirm `Suspended` (seconds).
    pub suspend_ack_timeout_secs: u16,

    // --- Provisioning ---
    /// Provisioning inactivity timeout (seconds).
    pub provisioning_inactivity_secs: u32,
    /// Bounded wait for the radio's role confirmation (seconds).
    pub role_confirm_timeout_secs: u16,

    // --- Stored-credential join probe ---
    /// Fixed number of join attempts before falling back to provisioning.
    pub join_attempts: u8,
    /// Timeout for a single join attempt (milliseconds).
    pub join_timeout_ms: u32,
    /// Fixed delay between join attempts (milliseconds) — no backoff here.
    pub join_retry_delay_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut broker_host = heapless::String::new();
        // Placeholder endpoint — overwritten from NVS on provisioned devices.
        let _ = broker_host.push_str("ota.fieldlink.example.com");

        Self {
            // Control plane
            broker_host,
            broker_port: 8883,
            keep_alive_secs: 120,
            connect_timeout_ms: 2000,

            // Backoff
            retry_base_interval_ms: 500,
            retry_max_interval_ms: 5000,
            retry_max_attempts: 5,

            // Monitoring
            monitor_poll_secs: 2,
            shutdown_timeout_secs: 10,
            suspend_ack_timeout_secs: 30,

            // Provisioning
            provisioning_inactivity_secs: 600,
            role_confirm_timeout_secs: 10,

            // Join probe
            join_attempts: 3,
            join_timeout_ms: 10_000,
            join_retry_delay_ms: 1000,
        }
    }
}
