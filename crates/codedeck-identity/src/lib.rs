//! Identity provider client for the CodeDeck dashboard.
//!
//! This crate owns every network interaction with the external OAuth-style
//! identity provider:
//! - authorization and signup URL construction with per-call anti-replay state
//! - authorization-code exchange at the token endpoint
//! - current-user profile fetch with a single refresh-and-retry on 401
//! - token refresh, serialized behind one shared in-flight future
//! - provider logout
//!
//! Every provider call is failure-tolerant: an outage degrades to "the user
//! must log in again", never to a panic or an error escaping to UI code.

mod callback;
mod error;
mod provider;
mod state;
mod user;

pub use callback::{BoundCallbackServer, CallbackOutcome, CallbackServer, DEFAULT_CALLBACK_TIMEOUT_SECS};
pub use error::{AuthError, AuthResult};
pub use provider::IdentityClient;
pub use user::{Role, User};
