//! Port traits — the hexagonal boundary between the orchestration core and
//! its collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ModeSelector / session loop (domain)
//! ```
//!
//! Driven adapters (radio, TLS transport, update agent, credential store,
//! clock, RNG, event sink) implement these traits. The domain consumes them
//! via generics, so the core never touches ESP-IDF directly and the whole
//! state machine runs on the host under test.
//!
//! ## Concurrency notes
//!
//! - Port methods are called from the single orchestrator task only.
//! - Collaborators that deliver events from other execution contexts
//!   (driver threads, interrupt-adjacent callbacks) do so through the
//!   lock-free cells in [`connectivity`](crate::connectivity) and
//!   [`provisioning::ProvisioningEvents`](crate::provisioning::ProvisioningEvents),
//!   never by calling back into the domain.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::SystemConfig;
use crate::connectivity::DisconnectHandle;
use crate::error::{ConnectError, CredentialError, RadioError, SessionError};

// ───────────────────────────────────────────────────────────────
// Domain types shared across ports
// ───────────────────────────────────────────────────────────────

/// Radio operating role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioRole {
    /// Client of an existing network.
    Station,
    /// Broadcasting its own network for provisioning.
    AccessPoint,
}

/// Wi-Fi credentials delivered by provisioning and held by the store.
///
/// The core forwards these opaquely — it never interprets their contents
/// beyond emptiness checks in the store adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: heapless::String<32>,
    pub passphrase: heapless::String<64>,
}

/// Stable device identity used as the control-plane client identifier.
///
/// The client id is bounded to 23 bytes — the longest identifier an MQTT
/// 3.1.1 server must accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub client_id: heapless::String<23>,
}

/// Opaque handle to an established control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionHandle(pub u32);

/// Parameters for one control-connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub host: heapless::String<64>,
    pub port: u16,
    pub client_id: heapless::String<23>,
    pub keep_alive_secs: u16,
    pub timeout: Duration,
    /// ALPN protocol negotiation — engaged when connecting on port 443.
    pub use_alpn: bool,
}

impl ConnectParams {
    /// Assemble transport parameters from configuration and identity.
    pub fn build(config: &SystemConfig, identity: &DeviceIdentity) -> Self {
        Self {
            host: config.broker_host.clone(),
            port: config.broker_port,
            client_id: identity.client_id.clone(),
            keep_alive_secs: config.keep_alive_secs,
            timeout: Duration::from_millis(u64::from(config.connect_timeout_ms)),
            use_alpn: config.broker_port == 443,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Radio port (driven adapter: domain → Wi-Fi driver)
// ───────────────────────────────────────────────────────────────

/// Radio control: role switching and station join.
///
/// `request_role` is asynchronous — the driver confirms the role it actually
/// entered through the provisioning role signal, not through the return
/// value. The return value only covers command submission.
pub trait RadioPort {
    /// Reset the radio to its default state. Prerequisite for provisioning.
    ///
    /// Returns [`RadioError::ProvisioningInProgress`] when a provisioning
    /// exchange is still running; the caller stops it and retries.
    fn reset_to_defaults(&mut self) -> Result<(), RadioError>;

    /// Begin asynchronous initialisation into `role`. The actual role the
    /// radio entered arrives on the role-confirmation signal.
    fn request_role(&mut self, role: RadioRole) -> Result<(), RadioError>;

    /// Join the stored network as a station. Blocks up to `timeout`.
    fn join(&mut self, credentials: &WifiCredentials, timeout: Duration) -> Result<(), RadioError>;
}

// ───────────────────────────────────────────────────────────────
// Provisioning protocol port (driven adapter: domain → OOB exchange)
// ───────────────────────────────────────────────────────────────

/// The out-of-band provisioning exchange running on the radio.
///
/// Credential delivery is asynchronous — it arrives on the
/// credential-accepted signal, never through these methods.
pub trait ProvisioningProtocolPort {
    /// Start the provisioning exchange with the given inactivity timeout.
    fn start(&mut self, inactivity_timeout: Duration) -> Result<(), RadioError>;

    /// Stop a running exchange.
    fn stop(&mut self) -> Result<(), RadioError>;

    /// Forward an out-of-band provisioning frame verbatim. The core does
    /// not interpret frame contents.
    fn forward_frame(&mut self, frame: &[u8]) -> Result<(), RadioError>;
}

// ───────────────────────────────────────────────────────────────
// Control transport port (driven adapter: domain → TLS session)
// ───────────────────────────────────────────────────────────────

/// Secure control-plane transport.
///
/// Implementations invoke the registered [`DisconnectHandle`] from their
/// own execution context when the connection drops; the handle write is
/// lock-free and never blocks the driver.
pub trait ControlTransportPort {
    /// Establish the mutually-authenticated control connection.
    fn connect(&mut self, params: &ConnectParams) -> Result<ConnectionHandle, ConnectError>;

    /// Tear down the connection. Safe to call with a stale handle.
    fn disconnect(&mut self, handle: ConnectionHandle);

    /// Register the sink for asynchronous disconnect notifications.
    fn register_disconnect_handle(&mut self, handle: DisconnectHandle);
}

// ───────────────────────────────────────────────────────────────
// Credential store port (driven adapter: domain ↔ NVS)
// ───────────────────────────────────────────────────────────────

/// Persistent credential storage.
///
/// # Security
///
/// Implementations SHOULD keep credentials on the encrypted NVS partition.
/// Writes MUST be atomic — no partial records on power loss. The ESP-IDF
/// NVS API guarantees this natively; the in-memory simulation trivially.
pub trait CredentialStorePort {
    /// Load previously provisioned credentials, if any.
    fn load(&self) -> Option<WifiCredentials>;

    /// Validate and persist new credentials.
    fn persist(&mut self, credentials: &WifiCredentials) -> Result<(), CredentialError>;
}

// ───────────────────────────────────────────────────────────────
// Update agent port (driven adapter: domain → update agent)
// ───────────────────────────────────────────────────────────────

/// Lifecycle states of the update agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Constructed, not yet serving a job.
    Init,
    /// Requesting a job or file blocks from the control plane.
    Requesting,
    /// Receiving and writing file blocks.
    Transferring,
    /// Finalising the received file.
    Closing,
    /// Paused with progress retained; resumable.
    Suspended,
    /// Graceful shutdown in progress.
    ShuttingDown,
    /// Terminal. A stopped agent is never reinitialised in place.
    Stopped,
}

impl AgentState {
    /// Human-readable state name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::Requesting => "Requesting",
            Self::Transferring => "Transferring",
            Self::Closing => "Closing",
            Self::Suspended => "Suspended",
            Self::ShuttingDown => "ShuttingDown",
            Self::Stopped => "Stopped",
        }
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// The two exits out of an active transfer are `Closing` (graceful
    /// shutdown) and `Suspended` (disconnect); `Stopped` is reachable only
    /// through `Closing`/`ShuttingDown`.
    pub fn can_transition_to(self, next: AgentState) -> bool {
        use AgentState::{Closing, Init, Requesting, ShuttingDown, Stopped, Suspended, Transferring};
        matches!(
            (self, next),
            (Init, Requesting)
                | (Requesting, Transferring)
                | (Init | Requesting | Transferring, Closing | Suspended)
                | (Closing, ShuttingDown | Stopped)
                | (ShuttingDown, Stopped)
                | (Suspended, Init)
        ) || self == next
    }
}

/// State of the update image being transferred or tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    /// No image in flight.
    None,
    /// New image booted, pending self-test verdict.
    Testing,
    Accepted,
    Rejected,
    /// Transfer abandoned; the session ends rather than reconnecting.
    Aborted,
}

/// Completion events raised by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEvent {
    /// Update accepted — activate the new image (resets the device).
    Activate,
    /// Update failed. The agent handles its own cleanup.
    Fail,
    /// New image booted in self-test mode; verdict required.
    StartTest,
}

/// Per-connection traffic counters, reported each monitor tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AgentCounters {
    pub received: u32,
    pub queued: u32,
    pub processed: u32,
    pub dropped: u32,
}

/// The update agent collaborator.
///
/// The agent transitions its state internally; the orchestrator observes it
/// through `state()` and drives lifecycle edges through the request
/// methods. Completion notifications are polled with `take_event` —
/// consume-and-clear, single consumer.
pub trait UpdateAgentPort {
    /// Bind the agent to a fresh control connection and start it.
    fn init(&mut self, conn: ConnectionHandle, identity: &DeviceIdentity)
    -> Result<(), SessionError>;

    /// Rebind a suspended agent to a new connection, retaining progress.
    fn resume(&mut self, conn: ConnectionHandle) -> Result<(), SessionError>;

    /// Request suspension. Idempotent: suspending an already-suspended
    /// agent is a no-op returning success. Confirmation is observed via
    /// `state()`.
    fn suspend(&mut self) -> Result<(), SessionError>;

    /// Gracefully stop the agent, blocking up to `timeout`.
    fn shutdown(&mut self, timeout: Duration) -> Result<(), SessionError>;

    fn state(&self) -> AgentState;

    fn image_state(&self) -> ImageState;

    /// Record the self-test verdict for a freshly booted image.
    fn set_image_state(&mut self, state: ImageState) -> Result<(), SessionError>;

    /// Activate the downloaded image. On hardware this resets the device
    /// and does not return; returning is an error.
    fn activate_image(&mut self) -> Result<(), SessionError>;

    fn counters(&self) -> AgentCounters;

    /// Pop the next pending completion event, if any.
    fn take_event(&mut self) -> Option<AgentEvent>;
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: domain → monotonic time)
// ───────────────────────────────────────────────────────────────

/// Monotonic time and cooperative sleep.
///
/// All waits in the core go through this port so tests can run on a fake
/// clock with zero wall time.
pub trait ClockPort {
    /// Monotonic time since boot.
    fn now(&self) -> Duration;

    /// Cooperatively block the calling task for `duration`.
    fn sleep(&self, duration: Duration);
}

// ───────────────────────────────────────────────────────────────
// Jitter RNG port (driven adapter: domain → entropy source)
// ───────────────────────────────────────────────────────────────

/// Entropy for backoff jitter.
///
/// Hardware-seeded on target. Jitter quality matters operationally: a fleet
/// reconnecting after a broker outage must not retry in lock-step.
pub trait JitterRng {
    fn next_u32(&mut self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go (serial log, telemetry
/// uplink, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
