//! Process-scoped auth event subscription.
//!
//! Identity clients publish sign-in/sign-out transitions on a broadcast hub. A
//! single listener, owned by `AppState`, is started once at application start
//! and torn down on shutdown.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl AuthEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed => "TOKEN_REFRESHED",
            AuthEvent::UserUpdated => "USER_UPDATED",
            AuthEvent::PasswordRecovery => "PASSWORD_RECOVERY",
        }
    }

    /// Page a client should land on after this transition, if any
    pub fn navigation_target(&self) -> Option<&'static str> {
        match self {
            AuthEvent::SignedIn => Some("/"),
            AuthEvent::SignedOut => Some("/auth?action=signin"),
            _ => None,
        }
    }
}

/// Broadcast hub shared by every bound client.
#[derive(Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEvents {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }
}

impl AuthEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: AuthEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }
}

pub struct AuthListener {
    events: AuthEvents,
    started: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AuthListener {
    pub fn new(events: AuthEvents) -> Self {
        Self {
            events,
            started: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    /// Start the subscription once. Returns `false` if it was already started.
    ///
    /// The latch flips before the task is spawned, so two concurrent callers
    /// can never register two subscriptions.
    pub fn ensure_started(&self) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        let mut rx = self.events.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match event.navigation_target() {
                        Some(target) => {
                            info!(event = event.as_str(), target, "Auth state changed")
                        }
                        None => debug!(event = event.as_str(), "Auth state changed"),
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth listener lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        *self.handle.lock() = Some(task);
        true
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Stop the subscription; a later `ensure_started` starts a fresh one
    pub fn shutdown(&self) {
        if let Some(task) = self.handle.lock().take() {
            task.abort();
        }
        self.started.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_started_is_idempotent() {
        let events = AuthEvents::new();
        let listener = AuthListener::new(events.clone());

        assert!(listener.ensure_started());
        assert!(!listener.ensure_started());
        assert!(listener.is_started());
        assert_eq!(events.tx.receiver_count(), 1);

        listener.shutdown();
        assert!(!listener.is_started());
    }

    #[test]
    fn test_navigation_targets() {
        assert_eq!(AuthEvent::SignedIn.navigation_target(), Some("/"));
        assert_eq!(
            AuthEvent::SignedOut.navigation_target(),
            Some("/auth?action=signin")
        );
        assert_eq!(AuthEvent::TokenRefreshed.navigation_target(), None);
    }
}
