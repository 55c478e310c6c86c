//! Session state for the CodeDeck client.
//!
//! This crate provides:
//! - An explicit finite state machine for the authentication lifecycle
//! - A `SessionManager` driving boot validation, callback completion, and
//!   logout, with state-change notifications for UI consumers

mod fsm;
mod session;

pub use fsm::session_machine;
pub use fsm::{
    SessionMachine, SessionMachineInput, SessionMachineState, SessionStatus, StateChangedPayload,
};
pub use session::{CallbackResolution, SessionError, SessionManager, SessionResult, StateCallback};
