//! Unified error types for the FieldLink firmware.
//!
//! Follows embedded best practice: a single `Error` enum that every subsystem
//! can convert into, keeping the top-level control loop's error handling
//! uniform. All variants are `Copy` so they can be cheaply passed up through
//! the mode selector and session loop without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A single control-connection attempt failed (retried with backoff).
    Connect(ConnectError),
    /// The connection retry budget is spent; surfaced, never retried here.
    RetriesExhausted,
    /// The radio collaborator reported a failure.
    Radio(RadioError),
    /// The provisioning attempt ended in a terminal failure.
    Provisioning(ProvisioningError),
    /// The update session failed in a way the reconnect loop cannot absorb.
    Session(SessionError),
    /// Credential storage failed.
    Credential(CredentialError),
    /// Subsystem initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "connect: {e}"),
            Self::RetriesExhausted => write!(f, "connection retries exhausted"),
            Self::Radio(e) => write!(f, "radio: {e}"),
            Self::Provisioning(e) => write!(f, "provisioning: {e}"),
            Self::Session(e) => write!(f, "session: {e}"),
            Self::Credential(e) => write!(f, "credential store: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Control-connection errors (transient — absorbed by the retry loop)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    /// Endpoint hostname did not resolve.
    DnsFailed,
    /// TCP connection refused or reset during setup.
    Refused,
    /// TLS handshake failed (bad credentials, protocol error).
    TlsHandshake,
    /// The connect attempt did not complete within the configured timeout.
    Timeout,
    /// Socket-level I/O failure.
    Io,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DnsFailed => write!(f, "endpoint did not resolve"),
            Self::Refused => write!(f, "connection refused"),
            Self::TlsHandshake => write!(f, "TLS handshake failed"),
            Self::Timeout => write!(f, "connect timed out"),
            Self::Io => write!(f, "socket I/O error"),
        }
    }
}

impl From<ConnectError> for Error {
    fn from(e: ConnectError) -> Self {
        Self::Connect(e)
    }
}

// ---------------------------------------------------------------------------
// Radio errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// The radio rejected an init or mode command.
    InitFailed,
    /// A provisioning exchange is already running on the radio.
    ProvisioningInProgress,
    /// A radio command returned a failure code.
    CommandFailed,
    /// Joining the stored network failed (auth, not found, DHCP).
    JoinFailed,
    /// Joining the stored network did not complete in time.
    JoinTimeout,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed => write!(f, "radio init failed"),
            Self::ProvisioningInProgress => write!(f, "provisioning already in progress"),
            Self::CommandFailed => write!(f, "radio command failed"),
            Self::JoinFailed => write!(f, "network join failed"),
            Self::JoinTimeout => write!(f, "network join timed out"),
        }
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

// ---------------------------------------------------------------------------
// Provisioning terminal failures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningError {
    /// The radio came up in a role other than the one requested.
    RoleMismatch,
    /// The radio never confirmed its role within the bounded wait.
    RoleConfirmTimeout,
    /// No provisioning activity within the inactivity window.
    InactivityTimeout,
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoleMismatch => write!(f, "radio role mismatch"),
            Self::RoleConfirmTimeout => write!(f, "role confirmation timed out"),
            Self::InactivityTimeout => write!(f, "provisioning inactivity timeout"),
        }
    }
}

impl From<ProvisioningError> for Error {
    fn from(e: ProvisioningError) -> Self {
        Self::Provisioning(e)
    }
}

// ---------------------------------------------------------------------------
// Update-session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The update agent rejected initialisation.
    InitFailed,
    /// The update agent rejected a resume request.
    ResumeFailed,
    /// The update agent rejected a suspend request.
    SuspendFailed,
    /// The agent did not confirm `Suspended` within the bounded wait.
    SuspendTimeout,
    /// Graceful shutdown did not complete within its timeout.
    ShutdownTimeout,
    /// Image activation returned instead of resetting the device.
    ActivateFailed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed => write!(f, "agent init failed"),
            Self::ResumeFailed => write!(f, "agent resume failed"),
            Self::SuspendFailed => write!(f, "agent suspend failed"),
            Self::SuspendTimeout => write!(f, "agent suspend not confirmed in time"),
            Self::ShutdownTimeout => write!(f, "agent shutdown timed out"),
            Self::ActivateFailed => write!(f, "image activation returned"),
        }
    }
}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

// ---------------------------------------------------------------------------
// Credential-store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    /// No stored record for the requested key.
    NotFound,
    /// Stored record failed deserialization.
    Corrupted,
    /// A record failed validation before persistence.
    Invalid(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    Io,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "record not found"),
            Self::Corrupted => write!(f, "record corrupted"),
            Self::Invalid(msg) => write!(f, "validation failed: {msg}"),
            Self::StorageFull => write!(f, "storage full"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl From<CredentialError> for Error {
    fn from(e: CredentialError) -> Self {
        Self::Credential(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
