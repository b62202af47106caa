//! Session context and statistics types.

use crate::app::ports::{AgentCounters, AgentState, ConnectionHandle};

/// The operational binding between a live control connection and the update
/// agent. At most one exists per device at a time; the session loop is its
/// sole owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSessionContext {
    /// Handle of the control connection this session runs over.
    pub handle: ConnectionHandle,
    /// Agent state as last observed by the monitor loop. Sampled at the
    /// poll cadence — intermediate states may be skipped between ticks.
    pub agent_state: AgentState,
}

impl UpdateSessionContext {
    pub fn new(handle: ConnectionHandle, agent_state: AgentState) -> Self {
        Self { handle, agent_state }
    }

    /// Record the agent state observed on this tick.
    pub fn observe(&mut self, state: AgentState) {
        self.agent_state = state;
    }
}

/// Per-tick statistics snapshot, emitted through the event sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub state: AgentState,
    pub counters: AgentCounters,
}

/// Why a session run ended. The caller decides whether to restart the
/// device — a stopped or aborted agent is never reinitialised in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// The agent reached its terminal `Stopped` state.
    AgentStopped,
    /// The update image was aborted while the connection was still up.
    ImageAborted,
    /// A new image was activated (only observable in simulation — on
    /// hardware activation resets the device).
    ImageActivated,
}
