//! Cross-thread bookkeeping.
//!
//! Two things are shared between the threads of one collector:
//!
//! - the [`ThreadRegistry`], which hands out [`ThreadHandle`]s and makes sure
//!   at most one thread plays [`ThreadRole::Main`];
//! - the [`SyncLayer`], the native table pairing GLOBAL objects with their
//!   LOCAL copies. This crate only reads it: a worker's pairs are extra
//!   roots of its local collections.
//!
//! [`PairTable`] is a self-contained `SyncLayer` for hosts without a native
//! one. [`NoSync`] is the empty layer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::GcError;
use crate::header::ObjRef;

// ============================================================================
// Thread identity
// ============================================================================

/// Opaque identity of a registered thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadHandle(u64);

impl ThreadHandle {
    /// Numeric id, unique per collector.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// What a thread does for the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadRole {
    /// The bootstrap thread. Owns the demoted list and may write to GLOBAL
    /// objects through the write barrier while not in transactional mode.
    Main,
    /// A transaction worker. Its sync-table pairs are collection roots.
    Worker,
}

/// Every thread currently attached to one collector.
#[derive(Debug)]
pub struct ThreadRegistry {
    next_id: AtomicU64,
    threads: Mutex<HashMap<ThreadHandle, ThreadRole>>,
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            threads: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a thread.
    ///
    /// # Errors
    ///
    /// [`GcError::MainThreadAlreadyRegistered`] if `role` is
    /// [`ThreadRole::Main`] and a main thread is attached already.
    pub fn register(&self, role: ThreadRole) -> Result<ThreadHandle, GcError> {
        let mut threads = self.threads.lock();
        if role == ThreadRole::Main && threads.values().any(|&r| r == ThreadRole::Main) {
            return Err(GcError::MainThreadAlreadyRegistered);
        }
        let handle = ThreadHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        threads.insert(handle, role);
        Ok(handle)
    }

    /// Detach a thread. Unknown handles are ignored.
    pub fn unregister(&self, handle: ThreadHandle) {
        self.threads.lock().remove(&handle);
    }

    /// Role of an attached thread.
    #[must_use]
    pub fn role_of(&self, handle: ThreadHandle) -> Option<ThreadRole> {
        self.threads.lock().get(&handle).copied()
    }

    /// Number of attached threads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.threads.lock().len()
    }

    /// `true` if no thread is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.threads.lock().is_empty()
    }
}

// ============================================================================
// SyncLayer
// ============================================================================

/// The native table of (GLOBAL, LOCAL copy) pairs.
///
/// Every LOCAL copy reported by [`enumerate_pairs`](Self::enumerate_pairs)
/// must carry WAS_COPIED and VISITED with a `GlobalCopy` link to its GLOBAL
/// original, which must carry GLOBAL and WAS_COPIED. Both must have the same
/// type. A collection that finds otherwise fails fatally.
pub trait SyncLayer: Send + Sync {
    /// A thread attached to the collector.
    fn register(&self, handle: ThreadHandle, is_main: bool);

    /// A thread is detaching.
    fn unregister(&self, handle: ThreadHandle);

    /// Call `visit(global, local)` once per pair owned by `handle`.
    fn enumerate_pairs(&self, handle: ThreadHandle, visit: &mut dyn FnMut(ObjRef, ObjRef));
}

/// A sync layer that never knows any pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSync;

impl SyncLayer for NoSync {
    fn register(&self, _handle: ThreadHandle, _is_main: bool) {}

    fn unregister(&self, _handle: ThreadHandle) {}

    fn enumerate_pairs(&self, _handle: ThreadHandle, _visit: &mut dyn FnMut(ObjRef, ObjRef)) {}
}

/// An in-process pair table.
#[derive(Debug, Default)]
pub struct PairTable {
    pairs: Mutex<HashMap<ThreadHandle, Vec<(ObjRef, ObjRef)>>>,
}

impl PairTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `local` is `handle`'s copy of `global`.
    pub fn insert_pair(&self, handle: ThreadHandle, global: ObjRef, local: ObjRef) {
        self.pairs
            .lock()
            .entry(handle)
            .or_default()
            .push((global, local));
    }

    /// Forget and return every pair of `handle`, as a commit or an abort
    /// does.
    pub fn remove_pairs(&self, handle: ThreadHandle) -> Vec<(ObjRef, ObjRef)> {
        self.pairs
            .lock()
            .get_mut(&handle)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Number of pairs recorded for `handle`.
    #[must_use]
    pub fn pair_count(&self, handle: ThreadHandle) -> usize {
        self.pairs.lock().get(&handle).map_or(0, Vec::len)
    }

    /// `true` if `handle` is registered.
    #[must_use]
    pub fn is_registered(&self, handle: ThreadHandle) -> bool {
        self.pairs.lock().contains_key(&handle)
    }
}

impl SyncLayer for PairTable {
    fn register(&self, handle: ThreadHandle, _is_main: bool) {
        self.pairs.lock().entry(handle).or_default();
    }

    fn unregister(&self, handle: ThreadHandle) {
        self.pairs.lock().remove(&handle);
    }

    fn enumerate_pairs(&self, handle: ThreadHandle, visit: &mut dyn FnMut(ObjRef, ObjRef)) {
        // Snapshot so the lock is not held while the collector traces.
        let pairs = self.pairs.lock().get(&handle).cloned().unwrap_or_default();
        for (global, local) in pairs {
            visit(global, local);
        }
    }
}
