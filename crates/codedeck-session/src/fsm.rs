//! Authentication session state machine.
//!
//! The session's lifecycle is an explicit finite state machine rather than
//! a set of booleans derived from storage checks.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │ Unauthenticated │ (initial; also reached by logout and failed refresh)
//! └────────┬────────┘
//!          │ BootCheck / CallbackReceived
//!          ▼
//! ┌─────────────────┐   Completed    ┌─────────────────┐
//! │ Authenticating  │ ─────────────► │  Authenticated  │
//! └────────┬────────┘                └────────┬────────┘
//!          │ NoSession / AuthFailed           │ LogoutRequested
//!          ▼                                  ▼
//!  Unauthenticated / Failed            Unauthenticated
//!
//! Failed re-enters Authenticating on the next BootCheck or callback.
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Generates a module `session_machine` with State, Input, and StateMachine.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Unauthenticated)

    Unauthenticated => {
        BootCheck => Authenticating,
        CallbackReceived => Authenticating
    },
    Authenticating => {
        Completed => Authenticated,
        NoSession => Unauthenticated,
        AuthFailed => Failed,
        LogoutRequested => Unauthenticated
    },
    Authenticated => {
        LogoutRequested => Unauthenticated
    },
    Failed => {
        BootCheck => Authenticating,
        CallbackReceived => Authenticating,
        LogoutRequested => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session status for external consumption (route guards, UI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Not logged in.
    Unauthenticated,
    /// Boot check, code exchange, or login submission in flight.
    Authenticating,
    /// Logged in with a token the last check found valid.
    Authenticated,
    /// Last authentication attempt was rejected by the provider.
    Failed,
}

impl SessionStatus {
    /// True only in the Authenticated state.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated)
    }

    /// True while an authentication operation is in flight.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionStatus::Authenticating)
    }
}

impl From<&SessionMachineState> for SessionStatus {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Unauthenticated => SessionStatus::Unauthenticated,
            SessionMachineState::Authenticating => SessionStatus::Authenticating,
            SessionMachineState::Authenticated => SessionStatus::Authenticated,
            SessionMachineState::Failed => SessionStatus::Failed,
        }
    }
}

/// Payload for session state change notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChangedPayload {
    /// New session status.
    pub status: SessionStatus,
    /// User ID when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// User email when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
