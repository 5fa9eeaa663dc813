// Navigation hook for forced re-authentication

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Login entry point the session redirects to on terminal auth failure
pub const LOGIN_ROUTE: &str = "/auth/login";

/// Receives forced navigation requests from the session layer.
///
/// The session never renders anything itself; whatever owns the UI decides
/// what "navigate to the login page" means.
pub trait Navigator: Send + Sync {
    fn redirect(&self, target: &str);
}

/// Navigator for terminal front ends: tells the user to sign in again
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, target: &str) {
        tracing::warn!(route = %target, "Session ended, please log in again");
    }
}

/// Remembers where the session asked to navigate
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    last: Mutex<Option<String>>,
    count: AtomicUsize,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent redirect target
    pub fn last_target(&self) -> Option<String> {
        self.last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of redirects observed
    pub fn redirect_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, target: &str) {
        tracing::debug!(route = %target, "Recording redirect");
        *self
            .last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(target.to_string());
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_navigator() {
        let nav = RecordingNavigator::new();
        assert_eq!(nav.last_target(), None);
        assert_eq!(nav.redirect_count(), 0);

        nav.redirect(LOGIN_ROUTE);
        nav.redirect("/");
        assert_eq!(nav.last_target().as_deref(), Some("/"));
        assert_eq!(nav.redirect_count(), 2);
    }
}
