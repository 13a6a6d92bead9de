// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reference-counted listener registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::ListenerKey;
use crate::error::{Error, Result};

/// Outcome of [`CallbackRegistry::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// The entry is still referenced this many times.
    Remaining(usize),
    /// The last reference was released and the handler was dropped.
    Finalized,
}

struct Entry<H> {
    handler: Arc<H>,
    refs: usize,
}

/// Maps a listener identity to one shared handler.
///
/// Registering the same [`ListenerKey`] again returns the existing handler and
/// bumps its reference count. The handler leaves the registry when the count
/// returns to zero. Find-or-create and the count update happen in one
/// critical section.
///
/// # Examples
///
/// ```
/// use oic_client::subscription::{CallbackRegistry, PresenceListener, Released};
///
/// let registry = CallbackRegistry::new();
/// let key = PresenceListener::new(|_| {}).key();
///
/// let a = registry.acquire(key, || "handler");
/// let b = registry.acquire(key, || unreachable!());
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
///
/// assert_eq!(registry.release(key)?, Released::Remaining(1));
/// assert_eq!(registry.release(key)?, Released::Finalized);
/// assert!(registry.release(key).is_err());
/// # Ok::<(), oic_client::Error>(())
/// ```
pub struct CallbackRegistry<H> {
    entries: Mutex<HashMap<ListenerKey, Entry<H>>>,
}

impl<H> CallbackRegistry<H> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the handler for `key`, creating it with `factory` on first use.
    pub fn acquire<F>(&self, key: ListenerKey, factory: F) -> Arc<H>
    where
        F: FnOnce() -> H,
    {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key).or_insert_with(|| Entry {
            handler: Arc::new(factory()),
            refs: 0,
        });
        entry.refs += 1;
        tracing::debug!(listener = %key, refs = entry.refs, "Listener acquired");
        Arc::clone(&entry.handler)
    }

    /// Drops one reference to `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListenerNotFound`] if `key` is not registered.
    pub fn release(&self, key: ListenerKey) -> Result<Released> {
        let removed = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(&key) else {
                return Err(Error::ListenerNotFound(key));
            };
            entry.refs -= 1;
            if entry.refs > 0 {
                tracing::debug!(listener = %key, refs = entry.refs, "Listener released");
                return Ok(Released::Remaining(entry.refs));
            }
            entries.remove(&key)
        };
        // Dropped outside the lock; the handler may own user state.
        drop(removed);
        tracing::debug!(listener = %key, "Listener finalized");
        Ok(Released::Finalized)
    }

    /// Returns the reference count of `key`, if registered.
    #[must_use]
    pub fn ref_count(&self, key: ListenerKey) -> Option<usize> {
        self.entries.lock().get(&key).map(|e| e.refs)
    }

    /// Returns the number of distinct listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<H> Default for CallbackRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> std::fmt::Debug for CallbackRegistry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("listeners", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::subscription::PresenceListener;

    fn key() -> ListenerKey {
        PresenceListener::new(|_| {}).key()
    }

    #[test]
    fn factory_runs_once_per_identity() {
        let registry = CallbackRegistry::new();
        let created = AtomicUsize::new(0);
        let k = key();

        for _ in 0..3 {
            registry.acquire(k, || created.fetch_add(1, Ordering::SeqCst));
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.ref_count(k), Some(3));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_identities_get_distinct_handlers() {
        let registry = CallbackRegistry::new();
        let a = registry.acquire(key(), || 1);
        let b = registry.acquire(key(), || 2);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn handler_dropped_only_after_last_release() {
        let registry = CallbackRegistry::new();
        let k = key();
        let weak: Weak<String> = Arc::downgrade(&registry.acquire(k, || "h".to_string()));
        registry.acquire(k, || unreachable!());

        assert_eq!(registry.release(k).unwrap(), Released::Remaining(1));
        assert!(weak.upgrade().is_some());

        assert_eq!(registry.release(k).unwrap(), Released::Finalized);
        assert!(weak.upgrade().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn release_unknown_listener_is_an_error() {
        let registry: CallbackRegistry<()> = CallbackRegistry::new();
        let k = key();
        assert!(matches!(registry.release(k), Err(Error::ListenerNotFound(found)) if found == k));
    }

    #[test]
    fn concurrent_acquire_release_balances() {
        let registry = Arc::new(CallbackRegistry::new());
        let k = key();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        registry.acquire(k, || ());
                        registry.release(k).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(registry.ref_count(k), None);
    }
}
