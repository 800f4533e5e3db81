//! Per-command session bookkeeping.
//!
//! A [`SessionStore`] holds ephemeral state keyed by user id, scoped to one
//! command. The engine only ever observes presence; the payload shape and
//! any step advancement inside it belong to the owning command.
//!
//! The only transitions are absent -> present (`set`), present -> present
//! (re-`set`), and present -> absent (`clear`). Absence is indistinguishable
//! from "already cleared", so commands must check `has` before trusting
//! `get`.

use std::collections::HashMap;
use std::sync::Mutex;

use roost_types::UserId;

/// Keyed ephemeral state for one command.
///
/// Updates are last-write-wins per user; collisions on a single
/// (command, user) key are rare enough that no finer discipline is needed.
pub struct SessionStore<S> {
    inner: Mutex<HashMap<UserId, S>>,
}

impl<S: Clone> SessionStore<S> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Create or replace the session for `user`.
    pub fn set(&self, user: UserId, session: S) {
        self.inner.lock().unwrap().insert(user, session);
    }

    /// Snapshot of the session for `user`, if present.
    pub fn get(&self, user: UserId) -> Option<S> {
        self.inner.lock().unwrap().get(&user).cloned()
    }

    /// Remove the session for `user`, returning it if one existed.
    pub fn clear(&self, user: UserId) -> Option<S> {
        self.inner.lock().unwrap().remove(&user)
    }

    /// Whether `user` currently has a session.
    pub fn has(&self, user: UserId) -> bool {
        self.inner.lock().unwrap().contains_key(&user)
    }

    /// Number of active sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only sessions for which the predicate holds. Returns the number
    /// of sessions removed. Used by the supervisor's expiry sweep.
    pub fn retain(&self, mut keep: impl FnMut(&UserId, &S) -> bool) -> usize {
        let mut map = self.inner.lock().unwrap();
        let before = map.len();
        map.retain(|user, session| keep(user, session));
        before - map.len()
    }
}

impl<S: Clone> Default for SessionStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear_lifecycle() {
        let store: SessionStore<u32> = SessionStore::new();
        let user = UserId(1);

        assert!(!store.has(user));
        assert!(store.get(user).is_none());

        store.set(user, 7);
        assert!(store.has(user));
        assert_eq!(store.get(user), Some(7));

        // Re-set replaces the payload.
        store.set(user, 8);
        assert_eq!(store.get(user), Some(8));

        assert_eq!(store.clear(user), Some(8));
        assert!(!store.has(user));
        // Clearing an absent session is a no-op.
        assert_eq!(store.clear(user), None);
    }

    #[test]
    fn sessions_are_scoped_per_user() {
        let store: SessionStore<&'static str> = SessionStore::new();
        store.set(UserId(1), "a");
        store.set(UserId(2), "b");

        assert_eq!(store.get(UserId(1)), Some("a"));
        assert_eq!(store.get(UserId(2)), Some("b"));
        store.clear(UserId(1));
        assert!(!store.has(UserId(1)));
        assert!(store.has(UserId(2)));
    }

    #[test]
    fn retain_reports_removed_count() {
        let store: SessionStore<u32> = SessionStore::new();
        for i in 0..5 {
            store.set(UserId(i), i as u32);
        }
        let removed = store.retain(|_, v| *v % 2 == 0);
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 3);
    }
}
