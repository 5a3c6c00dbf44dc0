//! Collection statistics.

use std::time::{Duration, Instant};

/// Why a local collection ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum CollectionKind {
    /// No collection has run yet.
    #[default]
    None = 0,
    /// The nursery could not satisfy an allocation.
    NurseryFull = 1,
    /// Requested explicitly through `ThreadGc::collect`.
    Explicit = 2,
    /// First pass of `stop_transaction`.
    EndOfTransaction = 3,
    /// Second pass of `stop_transaction`, run when the first left the
    /// nursery non-empty.
    EndOfTransactionRetry = 4,
}

impl CollectionKind {
    /// `true` for both passes of `stop_transaction`.
    #[must_use]
    pub const fn is_end_of_transaction(self) -> bool {
        matches!(self, Self::EndOfTransaction | Self::EndOfTransactionRetry)
    }
}

/// Statistics from one local collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// Why the collection ran.
    pub kind: CollectionKind,
    /// Young objects copied out of the nursery (shadow slots included).
    pub objects_copied: usize,
    /// Bytes copied out of the nursery.
    pub bytes_copied: usize,
    /// Old objects of the previous generation that survived unmoved.
    pub survivors_in_place: usize,
    /// Old objects freed by the sweep.
    pub objects_freed: usize,
    /// Bytes freed by the sweep.
    pub bytes_freed: usize,
    /// Weak references whose referent died.
    pub weakrefs_cleared: usize,
    /// Weak references rewritten to a moved referent.
    pub weakrefs_updated: usize,
    /// Nursery bytes in use when the collection started.
    pub nursery_bytes: usize,
    /// Time spent on roots and on draining the worklist.
    pub trace_duration: Duration,
    /// Time spent on weak references.
    pub weakref_duration: Duration,
    /// Time spent sweeping the previous generation.
    pub sweep_duration: Duration,
    /// Wall-clock time of the whole collection.
    pub duration: Duration,
}

impl CollectionStats {
    pub(crate) fn new(kind: CollectionKind, nursery_bytes: usize) -> Self {
        Self {
            kind,
            nursery_bytes,
            ..Self::default()
        }
    }
}

/// Times consecutive phases of a collection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PhaseTimer {
    started: Instant,
    current: Instant,
}

impl PhaseTimer {
    pub(crate) fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            current: now,
        }
    }

    /// Time since the previous lap (or since `start`).
    pub(crate) fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now - self.current;
        self.current = now;
        elapsed
    }

    pub(crate) fn total(&self) -> Duration {
        self.started.elapsed()
    }
}
