//! Session manager driving the authentication lifecycle.

use crate::fsm::{
    SessionMachine, SessionMachineInput, SessionStatus, StateChangedPayload,
};
use codedeck_core::Navigator;
use codedeck_identity::{AuthError, CallbackOutcome, IdentityClient, User};
use codedeck_storage::StorageError;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Session error type.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Invalid state transition
    #[error("Invalid session state transition: {0}")]
    InvalidTransition(String),

    /// Identity provider error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;

/// Callback type for session state change notifications.
pub type StateCallback = Box<dyn Fn(StateChangedPayload) + Send + Sync>;

/// Result of consuming an authentication callback.
#[derive(Debug, Clone)]
pub struct CallbackResolution {
    /// Session status after the callback was processed.
    pub status: SessionStatus,
    /// Post-login destination carried by the `state` parameter, when the
    /// callback completed a login. The routing layer consumes this.
    pub destination: Option<String>,
}

/// The process-wide session: authentication status plus a cached user
/// profile, mutated only through the state machine here.
///
/// Token data itself lives in the token store; this type reads through to
/// it and never keeps an independent copy that could drift. Constructed
/// once at boot and passed to consumers (route guards, the request
/// pipeline) explicitly.
pub struct SessionManager {
    identity: IdentityClient,
    navigator: Arc<dyn Navigator>,
    fsm: Mutex<SessionMachine>,
    user: Mutex<Option<User>>,
    last_error: Mutex<Option<String>>,
    /// Serializes boot checks; a second check arriving while one is in
    /// flight is ignored.
    boot_guard: tokio::sync::Mutex<()>,
    state_callback: Mutex<Option<StateCallback>>,
}

impl SessionManager {
    /// Create a session manager over the given identity client.
    pub fn new(identity: IdentityClient, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            identity,
            navigator,
            fsm: Mutex::new(SessionMachine::new()),
            user: Mutex::new(None),
            last_error: Mutex::new(None),
            boot_guard: tokio::sync::Mutex::new(()),
            state_callback: Mutex::new(None),
        }
    }

    /// The identity client this session authenticates through.
    pub fn identity(&self) -> &IdentityClient {
        &self.identity
    }

    /// Set a callback to be notified of session state changes.
    pub fn set_state_callback(&self, callback: StateCallback) {
        *self.state_callback.lock().unwrap() = Some(callback);
    }

    /// Current session status.
    pub fn status(&self) -> SessionStatus {
        SessionStatus::from(self.fsm.lock().unwrap().state())
    }

    /// The cached user profile, when authenticated.
    pub fn current_user(&self) -> Option<User> {
        self.user.lock().unwrap().clone()
    }

    /// Overwrite the cached display name. Client-side only; nothing writes
    /// this back to the provider.
    pub fn set_display_name(&self, display_name: &str) -> bool {
        let mut user = self.user.lock().unwrap();
        match user.as_mut() {
            Some(user) => {
                user.display_name = display_name.to_string();
                true
            }
            None => false,
        }
    }

    /// Error message from the last failed authentication attempt.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    /// Validate the stored session at boot.
    ///
    /// Flow: check the token store; refresh when the record is absent or
    /// expired; fetch the user profile; end `Authenticated` or
    /// `Unauthenticated`. An empty store makes no network calls at all
    /// (there is no refresh token to try). A second boot check arriving
    /// while one is in flight is ignored and observes the current status.
    pub async fn initialize(&self) -> SessionStatus {
        let _guard = match self.boot_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("boot check already in flight, ignoring");
                return self.status();
            }
        };

        if self.transition(&SessionMachineInput::BootCheck).is_err() {
            // Already authenticated; nothing to validate.
            return self.status();
        }

        let record = self.identity.store().load().unwrap_or_default();
        let needs_refresh = match &record {
            Some(record) => record.is_expired(),
            None => true,
        };

        if needs_refresh && self.identity.refresh().await.is_none() {
            debug!("no usable session at boot");
            let _ = self.transition(&SessionMachineInput::NoSession);
            return self.status();
        }

        match self.identity.fetch_current_user(None).await {
            Some(user) => {
                info!(user_id = %user.id, "session validated at boot");
                *self.user.lock().unwrap() = Some(user);
                let _ = self.transition(&SessionMachineInput::Completed);
            }
            None => {
                warn!("profile fetch failed during boot validation");
                let _ = self.transition(&SessionMachineInput::NoSession);
            }
        }
        self.status()
    }

    /// Consume an authentication callback.
    ///
    /// A provider error parameter never reaches the token endpoint; a code
    /// is exchanged after its `state` value (when present) passes the
    /// anti-replay check.
    pub async fn handle_callback(&self, outcome: CallbackOutcome) -> CallbackResolution {
        match outcome {
            CallbackOutcome::Denied { error, description } => {
                warn!(error = %error, "authentication callback denied");
                *self.last_error.lock().unwrap() = Some(description.unwrap_or(error));
                CallbackResolution {
                    status: self.status(),
                    destination: None,
                }
            }
            CallbackOutcome::Code { code, state } => {
                if self
                    .transition(&SessionMachineInput::CallbackReceived)
                    .is_err()
                {
                    debug!("callback ignored in state {:?}", self.status());
                    return CallbackResolution {
                        status: self.status(),
                        destination: None,
                    };
                }

                let destination = match state {
                    Some(raw) => match self.identity.consume_state(&raw) {
                        Some(next) => Some(next),
                        None => {
                            *self.last_error.lock().unwrap() =
                                Some("invalid or replayed state parameter".to_string());
                            let _ = self.transition(&SessionMachineInput::AuthFailed);
                            return CallbackResolution {
                                status: self.status(),
                                destination: None,
                            };
                        }
                    },
                    None => None,
                };

                match self.identity.exchange_code(&code).await {
                    Ok((user, _record)) => {
                        info!(user_id = %user.id, "login completed");
                        *self.user.lock().unwrap() = Some(user);
                        *self.last_error.lock().unwrap() = None;
                        let _ = self.transition(&SessionMachineInput::Completed);
                        CallbackResolution {
                            status: self.status(),
                            destination,
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "code exchange failed");
                        *self.last_error.lock().unwrap() = Some(err.to_string());
                        let _ = self.transition(&SessionMachineInput::AuthFailed);
                        CallbackResolution {
                            status: self.status(),
                            destination: None,
                        }
                    }
                }
            }
        }
    }

    /// Log out.
    ///
    /// Leaves the authenticated state synchronously: the store is cleared
    /// and the cached user dropped before the provider's logout redirect is
    /// issued through the navigator. Idempotent; calling this while already
    /// logged out still clears any stale store entries.
    pub fn logout(&self) -> SessionResult<()> {
        let _ = self.transition(&SessionMachineInput::LogoutRequested);
        *self.user.lock().unwrap() = None;
        *self.last_error.lock().unwrap() = None;
        self.identity.logout(self.navigator.as_ref())?;
        Ok(())
    }

    /// A currently-valid access token, refreshing first when the stored
    /// one is expired. `None` when no token can be produced; callers then
    /// send unauthenticated.
    ///
    /// The request pipeline reads tokens through here rather than from the
    /// store directly, so it always respects the in-flight refresh guard.
    pub async fn fresh_access_token(&self) -> Option<String> {
        if !self.identity.is_expired() {
            return self
                .identity
                .store()
                .load()
                .ok()
                .flatten()
                .map(|record| record.access_token);
        }
        self.identity
            .refresh()
            .await
            .map(|record| record.access_token)
    }

    fn transition(&self, input: &SessionMachineInput) -> SessionResult<SessionStatus> {
        let mut fsm = self.fsm.lock().unwrap();
        let old_status = SessionStatus::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            SessionError::InvalidTransition(format!(
                "cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_status = SessionStatus::from(fsm.state());
        drop(fsm);

        if old_status != new_status {
            debug!(from = ?old_status, to = ?new_status, "session state transition");
            self.notify_state_change(new_status);
        }
        Ok(new_status)
    }

    fn notify_state_change(&self, status: SessionStatus) {
        let callback = self.state_callback.lock().unwrap();
        if let Some(callback) = callback.as_ref() {
            let (user_id, email) = self
                .user
                .lock()
                .unwrap()
                .as_ref()
                .map(|user| (Some(user.id.clone()), Some(user.email.clone())))
                .unwrap_or((None, None));

            callback(StateChangedPayload {
                status,
                user_id,
                email,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codedeck_core::NullNavigator;
    use codedeck_storage::{MemoryStorage, TokenRecord, TokenStore};

    fn manager() -> SessionManager {
        let store = Arc::new(TokenStore::new(Box::new(MemoryStorage::new())));
        let identity = IdentityClient::new(
            "https://auth.test",
            "http://localhost:9847/auth/callback",
            "http://localhost:9847",
            store,
        );
        SessionManager::new(identity, Arc::new(NullNavigator))
    }

    #[test]
    fn test_initial_status() {
        let manager = manager();
        assert_eq!(manager.status(), SessionStatus::Unauthenticated);
        assert!(manager.current_user().is_none());
        assert!(manager.last_error().is_none());
    }

    #[test]
    fn test_logout_when_already_unauthenticated_clears_stale_entries() {
        let manager = manager();

        // Stale tokens left behind by some earlier run.
        manager
            .identity()
            .store()
            .save(&TokenRecord {
                access_token: "stale".to_string(),
                refresh_token: Some("stale-refresh".to_string()),
                expires_at_ms: None,
            })
            .unwrap();

        manager.logout().unwrap();
        assert_eq!(manager.status(), SessionStatus::Unauthenticated);
        assert_eq!(manager.identity().store().load().unwrap(), None);

        // And again, with nothing stored.
        manager.logout().unwrap();
        assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    }

    #[test]
    fn test_set_display_name_requires_user() {
        let manager = manager();
        assert!(!manager.set_display_name("Ada"));
    }

    #[tokio::test]
    async fn test_denied_callback_stays_unauthenticated() {
        let manager = manager();

        let resolution = manager
            .handle_callback(CallbackOutcome::Denied {
                error: "access_denied".to_string(),
                description: Some("User refused".to_string()),
            })
            .await;

        assert_eq!(resolution.status, SessionStatus::Unauthenticated);
        assert_eq!(manager.last_error(), Some("User refused".to_string()));
    }

    #[tokio::test]
    async fn test_callback_with_replayed_state_fails() {
        let manager = manager();

        // A state value this client never issued.
        let resolution = manager
            .handle_callback(CallbackOutcome::Code {
                code: "abc123".to_string(),
                state: Some("bogus".to_string()),
            })
            .await;

        assert_eq!(resolution.status, SessionStatus::Failed);
        assert!(manager.last_error().is_some());
    }

    #[test]
    fn test_state_callback_invoked_on_transition() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let manager = manager();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        manager.set_state_callback(Box::new(move |_payload| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        manager
            .transition(&SessionMachineInput::BootCheck)
            .unwrap();
        manager
            .transition(&SessionMachineInput::NoSession)
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
