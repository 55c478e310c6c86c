//! Navigation capability for browser-bound side effects.
//!
//! The original dashboard drove redirects through `window.location.href`.
//! Here the redirect surface is an injected trait so the auth flow can be
//! exercised without a real browser context.

/// Capability for sending the user to an external URL (provider login,
/// provider logout, the local login surface after a failed refresh).
pub trait Navigator: Send + Sync {
    /// Navigate to the given URL or app-relative path.
    fn navigate(&self, target: &str);
}

/// Navigator that drops all navigation requests.
///
/// Useful for headless flows where no user agent is attached.
#[derive(Debug, Default)]
pub struct NullNavigator;

impl Navigator for NullNavigator {
    fn navigate(&self, target: &str) {
        tracing::debug!(url = %target, "navigation requested with no user agent attached");
    }
}
