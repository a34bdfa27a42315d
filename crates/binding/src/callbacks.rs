// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-token callbacks dispatched from inside the engine.
//!
//! The engine cannot hold a Rust closure. Instead it calls back with the
//! address of the model handle it is generating for, and the registry maps
//! that address to the closure installed for it:
//!
//! ```text
//! Model::predict ── scoped(id, cb) ──► CallbackRegistry { id → cb }
//!       │                                      ▲
//!       └── engine.predict ── per token ── dispatch(id, bytes)
//! ```
//!
//! Keys are handle addresses used as plain integers and never
//! dereferenced. A single `RwLock` guards the table: dispatch takes the
//! read side, everything else the write side.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A per-token predicate: receives the raw bytes of one generated fragment
/// and returns `true` to continue or `false` to stop generating.
///
/// Fragments are passed exactly as the engine produced them. They are not
/// trimmed and may split a multi-byte UTF-8 sequence.
#[derive(Clone)]
pub struct TokenCallback(Arc<dyn Fn(&[u8]) -> bool + Send + Sync>);

impl TokenCallback {
    /// Wraps a closure as a token callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    /// Invokes the callback.
    pub fn call(&self, token: &[u8]) -> bool {
        (self.0)(token)
    }
}

impl std::fmt::Debug for TokenCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TokenCallback")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// The callbacks installed for one handle.
///
/// A call-scoped callback shadows the persistent one while it is present.
#[derive(Default)]
struct Slots {
    persistent: Option<TokenCallback>,
    call: Option<TokenCallback>,
}

impl Slots {
    fn active(&self) -> Option<&TokenCallback> {
        self.call.as_ref().or(self.persistent.as_ref())
    }

    fn is_empty(&self) -> bool {
        self.persistent.is_none() && self.call.is_none()
    }
}

/// Table of token callbacks keyed by engine handle identity.
///
/// Each identity has two slots. [`register`](Self::register) and
/// [`unregister`](Self::unregister) manage the persistent one, while
/// [`scoped`](Self::scoped) manages the one for a single call. Neither
/// side touches the other's slot.
#[derive(Default)]
pub struct CallbackRegistry {
    table: RwLock<HashMap<usize, Slots>>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry consulted by the exported native trampoline.
    ///
    /// The engine calls a fixed C symbol with no user context, so the
    /// native backend needs one instance reachable from that symbol.
    /// Other backends are free to use their own.
    pub fn global() -> &'static Arc<CallbackRegistry> {
        static GLOBAL: OnceLock<Arc<CallbackRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(CallbackRegistry::new()))
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<usize, Slots>> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<usize, Slots>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs the persistent `callback` for `id`, returning the one it
    /// replaces.
    pub fn register(&self, id: usize, callback: TokenCallback) -> Option<TokenCallback> {
        self.write().entry(id).or_default().persistent.replace(callback)
    }

    /// Removes the persistent callback for `id`. A call-scoped callback
    /// stays in place until its scope ends.
    pub fn unregister(&self, id: usize) -> Option<TokenCallback> {
        let mut table = self.write();
        let slots = table.get_mut(&id)?;
        let removed = slots.persistent.take();
        if slots.is_empty() {
            table.remove(&id);
        }
        removed
    }

    /// Drops every callback for `id`, persistent and call-scoped.
    pub fn clear(&self, id: usize) {
        self.write().remove(&id);
    }

    /// Delivers one token to the callback for `id`.
    ///
    /// A call-scoped callback wins over the persistent one. Returns the
    /// callback's verdict, or `true` (keep going) when nothing is
    /// registered. The lock is released before the callback runs, so a
    /// callback may itself register or unregister.
    pub fn dispatch(&self, id: usize, token: &[u8]) -> bool {
        let callback = self.read().get(&id).and_then(Slots::active).cloned();

        match callback {
            Some(cb) => cb.call(token),
            None => true,
        }
    }

    /// Returns `true` if a callback of either kind is installed for `id`.
    pub fn is_registered(&self, id: usize) -> bool {
        self.read().contains_key(&id)
    }

    /// Returns `true` if a persistent callback is installed for `id`.
    pub fn has_persistent(&self, id: usize) -> bool {
        self.read()
            .get(&id)
            .is_some_and(|slots| slots.persistent.is_some())
    }

    /// Number of identities with at least one callback installed.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if no callbacks are installed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Installs `callback` in the call slot of `id` for the lifetime of
    /// the returned scope.
    ///
    /// When the scope drops, on any exit path, the call slot is put back
    /// the way it was. The persistent slot is never touched, so a
    /// persistent callback installed meanwhile survives. With `None` the
    /// scope does nothing.
    pub fn scoped(&self, id: usize, callback: Option<TokenCallback>) -> CallbackScope<'_> {
        let (active, previous) = match callback {
            Some(cb) => (true, self.write().entry(id).or_default().call.replace(cb)),
            None => (false, None),
        };
        CallbackScope {
            registry: self,
            id,
            previous,
            active,
        }
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

/// Restores a call slot when dropped. See [`CallbackRegistry::scoped`].
#[must_use = "the callback is removed as soon as the scope is dropped"]
pub struct CallbackScope<'a> {
    registry: &'a CallbackRegistry,
    id: usize,
    previous: Option<TokenCallback>,
    active: bool,
}

impl Drop for CallbackScope<'_> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        let mut table = self.registry.write();
        let Some(slots) = table.get_mut(&self.id) else {
            // Cleared by teardown while the scope was alive.
            return;
        };
        slots.call = self.previous.take();
        if slots.is_empty() {
            table.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn counting(counter: &Arc<AtomicUsize>, verdict: bool) -> TokenCallback {
        let counter = Arc::clone(counter);
        TokenCallback::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            verdict
        })
    }

    #[test]
    fn test_dispatch_without_callback_continues() {
        let reg = CallbackRegistry::new();
        assert!(reg.dispatch(0x1000, b"tok"));
    }

    #[test]
    fn test_register_dispatch_unregister() {
        let reg = CallbackRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        reg.register(
            0x1000,
            TokenCallback::new(move |t| {
                sink.lock().unwrap().push(t.to_vec());
                t != b"stop"
            }),
        );

        assert!(reg.dispatch(0x1000, b"hello"));
        assert!(!reg.dispatch(0x1000, b"stop"));
        assert_eq!(*seen.lock().unwrap(), vec![b"hello".to_vec(), b"stop".to_vec()]);

        assert!(reg.unregister(0x1000).is_some());
        assert!(!reg.is_registered(0x1000));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_dispatch_passes_raw_bytes() {
        let reg = CallbackRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        reg.register(1, TokenCallback::new(move |t| {
            sink.lock().unwrap().extend_from_slice(t);
            true
        }));

        // Half of a two-byte UTF-8 sequence, with a leading space.
        reg.dispatch(1, &[b' ', 0xC3]);
        assert_eq!(*seen.lock().unwrap(), vec![b' ', 0xC3]);
    }

    #[test]
    fn test_entries_are_per_identity() {
        let reg = CallbackRegistry::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        reg.register(1, counting(&a, true));
        reg.register(2, counting(&b, false));

        assert!(reg.dispatch(1, b"x"));
        assert!(!reg.dispatch(2, b"x"));
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_scope_removes_on_drop() {
        let reg = CallbackRegistry::new();
        let n = Arc::new(AtomicUsize::new(0));
        {
            let _scope = reg.scoped(7, Some(counting(&n, true)));
            assert!(reg.is_registered(7));
        }
        assert!(!reg.is_registered(7));
    }

    #[test]
    fn test_scope_restores_previous() {
        let reg = CallbackRegistry::new();
        let persistent = Arc::new(AtomicUsize::new(0));
        let temporary = Arc::new(AtomicUsize::new(0));
        reg.register(7, counting(&persistent, true));

        {
            let _scope = reg.scoped(7, Some(counting(&temporary, true)));
            reg.dispatch(7, b"a");
        }
        reg.dispatch(7, b"b");

        assert_eq!(temporary.load(Ordering::SeqCst), 1);
        assert_eq!(persistent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_call_scope_shadows_persistent() {
        let reg = CallbackRegistry::new();
        let persistent = Arc::new(AtomicUsize::new(0));
        let per_call = Arc::new(AtomicUsize::new(0));

        let scope = reg.scoped(7, Some(counting(&per_call, true)));
        // Installed while the call runs: must not displace the call's callback.
        reg.register(7, counting(&persistent, true));
        reg.dispatch(7, b"a");
        drop(scope);

        assert!(reg.has_persistent(7));
        reg.dispatch(7, b"b");
        assert_eq!(per_call.load(Ordering::SeqCst), 1);
        assert_eq!(persistent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_keeps_call_scope() {
        let reg = CallbackRegistry::new();
        let per_call = Arc::new(AtomicUsize::new(0));
        reg.register(4, TokenCallback::new(|_| true));

        let scope = reg.scoped(4, Some(counting(&per_call, false)));
        reg.unregister(4);
        assert!(!reg.dispatch(4, b"x"));
        drop(scope);

        assert!(!reg.is_registered(4));
        assert_eq!(per_call.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_removes_both_slots() {
        let reg = CallbackRegistry::new();
        reg.register(2, TokenCallback::new(|_| false));
        let scope = reg.scoped(2, Some(TokenCallback::new(|_| false)));
        reg.clear(2);
        assert!(reg.dispatch(2, b"x"));
        drop(scope);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_scope_without_callback_is_inert() {
        let reg = CallbackRegistry::new();
        let n = Arc::new(AtomicUsize::new(0));
        reg.register(3, counting(&n, true));
        {
            let _scope = reg.scoped(3, None);
        }
        assert!(reg.is_registered(3));
    }

    #[test]
    fn test_scope_removes_on_panic() {
        let reg = Arc::new(CallbackRegistry::new());
        let r = Arc::clone(&reg);
        let result = std::thread::spawn(move || {
            let _scope = r.scoped(9, Some(TokenCallback::new(|_| true)));
            panic!("engine call blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!reg.is_registered(9));
    }

    #[test]
    fn test_callback_may_reenter_registry() {
        let reg = Arc::new(CallbackRegistry::new());
        let r = Arc::clone(&reg);
        reg.register(
            5,
            TokenCallback::new(move |_| {
                r.unregister(5);
                false
            }),
        );
        assert!(!reg.dispatch(5, b"x"));
        assert!(!reg.is_registered(5));
    }

    #[test]
    fn test_concurrent_register_and_dispatch() {
        let reg = Arc::new(CallbackRegistry::new());
        let hits = Arc::new(AtomicUsize::new(0));
        reg.register(0, counting(&hits, true));

        let mut workers = Vec::new();
        for id in 1..=8usize {
            let reg = Arc::clone(&reg);
            workers.push(std::thread::spawn(move || {
                for _ in 0..500 {
                    let _scope = reg.scoped(id, Some(TokenCallback::new(|_| true)));
                    assert!(reg.dispatch(id, b"t"));
                }
            }));
        }
        for _ in 0..1000 {
            assert!(reg.dispatch(0, b"t"));
        }
        for w in workers {
            w.join().unwrap();
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1000);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_global_is_shared() {
        let a = CallbackRegistry::global();
        let b = CallbackRegistry::global();
        assert!(Arc::ptr_eq(a, b));
    }
}
