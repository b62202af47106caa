//! Application layer — mode selection and the hexagonal port boundary.
//!
//! ```text
//!  RadioPort ─────▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  TransportPort ─▶ │  ModeSelector                │
//!  AgentPort ─────▶ │   ├─ ProvisioningSession     │
//!  StorePort ─────▶ │   └─ UpdateSessionOrchestrator│
//!                   └──────────────────────────────┘
//! ```
//!
//! The selector owns the top-level decision: operational mode when a
//! stored-credential join succeeds, provisioning mode otherwise. All I/O
//! flows through the port traits in [`ports`], making the entire layer
//! testable with mock adapters.

pub mod events;
pub mod mode;
pub mod ports;
