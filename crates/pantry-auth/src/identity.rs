//! The "is a user signed in" signal that user-scoped state hangs off.
//!
//! Readers poll it with [`IdentitySignal::is_authenticated`] or watch it via
//! [`IdentitySignal::subscribe`]. Components that must react in the same
//! instant as a login or logout register an [`IdentityObserver`]; observers
//! run synchronously inside `sign_in` / `sign_out`, before those return.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::watch;

use pantry_core::models::identity::Identity;

/// Receives identity transitions.
///
/// Called with the new identity (`None` after logout) only when the session
/// owner actually changes. Implementations must not block.
pub trait IdentityObserver: Send + Sync {
    fn identity_changed(self: Arc<Self>, current: Option<&Identity>);
}

struct SignalInner {
    tx: watch::Sender<Option<Identity>>,
    observers: Mutex<Vec<Weak<dyn IdentityObserver>>>,
}

/// Cloneable handle to the current session identity.
#[derive(Clone)]
pub struct IdentitySignal {
    inner: Arc<SignalInner>,
}

impl IdentitySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(SignalInner {
                tx,
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.tx.borrow().is_some()
    }

    pub fn current(&self) -> Option<Identity> {
        self.inner.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.inner.tx.subscribe()
    }

    /// Register an observer. Dropped observers are pruned on the next transition.
    pub fn observe(&self, observer: Weak<dyn IdentityObserver>) {
        if let Ok(mut observers) = self.inner.observers.lock() {
            observers.push(observer);
        }
    }

    /// Mark `identity` as the signed-in user.
    ///
    /// Returns `true` if this was a transition (nobody signed in before, or a
    /// different account). Signing the same account in again only refreshes
    /// the stored profile.
    pub fn sign_in(&self, identity: Identity) -> bool {
        let mut transition = false;
        self.inner.tx.send_modify(|current| {
            transition = !matches!(current, Some(prev) if prev.same_owner(&identity));
            *current = Some(identity);
        });
        if transition {
            let current = self.current();
            if let Some(user) = &current {
                tracing::info!(user = %user.id, "signed in");
            }
            self.notify(current.as_ref());
        }
        transition
    }

    /// Clear the signed-in user. Returns `true` if someone was signed in.
    pub fn sign_out(&self) -> bool {
        let transition = self.inner.tx.send_if_modified(|current| current.take().is_some());
        if transition {
            tracing::info!("signed out");
            self.notify(None);
        }
        transition
    }

    fn notify(&self, current: Option<&Identity>) {
        let live: Vec<Arc<dyn IdentityObserver>> = match self.inner.observers.lock() {
            Ok(mut observers) => {
                observers.retain(|o| o.strong_count() > 0);
                observers.iter().filter_map(Weak::upgrade).collect()
            }
            Err(_) => {
                tracing::error!("identity observer registry poisoned");
                return;
            }
        };
        for observer in live {
            observer.identity_changed(current);
        }
    }
}

impl Default for IdentitySignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        seen: StdMutex<Vec<Option<String>>>,
    }

    impl IdentityObserver for Recorder {
        fn identity_changed(self: Arc<Self>, current: Option<&Identity>) {
            self.seen
                .lock()
                .unwrap()
                .push(current.map(|i| i.id.0.clone()));
        }
    }

    fn recorder(signal: &IdentitySignal) -> Arc<Recorder> {
        let recorder = Arc::new(Recorder::default());
        let observer: Arc<dyn IdentityObserver> = recorder.clone();
        signal.observe(Arc::downgrade(&observer));
        recorder
    }

    #[test]
    fn test_transitions_are_reported_synchronously() {
        let signal = IdentitySignal::new();
        let rec = recorder(&signal);

        assert!(signal.sign_in(Identity::new("u1", "Asha", "asha@example.com")));
        assert!(signal.is_authenticated());
        assert!(signal.sign_out());
        assert!(!signal.is_authenticated());

        assert_eq!(
            *rec.seen.lock().unwrap(),
            vec![Some("u1".to_string()), None]
        );
    }

    #[test]
    fn test_same_user_is_not_a_transition() {
        let signal = IdentitySignal::new();
        let rec = recorder(&signal);

        signal.sign_in(Identity::new("u1", "Asha", "asha@example.com"));
        let renamed = Identity::new("u1", "Asha K", "asha@example.com");
        assert!(!signal.sign_in(renamed));
        assert_eq!(signal.current().unwrap().name, "Asha K");
        assert_eq!(rec.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_switching_user_is_a_transition() {
        let signal = IdentitySignal::new();
        let rec = recorder(&signal);

        signal.sign_in(Identity::new("u1", "Asha", "asha@example.com"));
        assert!(signal.sign_in(Identity::new("u2", "Ravi", "ravi@example.com")));
        assert_eq!(
            *rec.seen.lock().unwrap(),
            vec![Some("u1".to_string()), Some("u2".to_string())]
        );
    }

    #[test]
    fn test_sign_out_when_anonymous_is_silent() {
        let signal = IdentitySignal::new();
        let rec = recorder(&signal);
        assert!(!signal.sign_out());
        assert!(rec.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dropped_observer_is_skipped() {
        let signal = IdentitySignal::new();
        let rec = recorder(&signal);
        drop(rec);
        signal.sign_in(Identity::new("u1", "Asha", "asha@example.com"));
        assert_eq!(signal.inner.observers.lock().unwrap().len(), 0);
    }
}
