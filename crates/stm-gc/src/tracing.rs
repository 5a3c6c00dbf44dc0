//! GC tracing support.
//!
//! When the `tracing` feature is enabled, this module provides structured
//! tracing spans and events for local collections and for the transaction
//! lifecycle. Without the feature every entry point is a no-op.

#[cfg(feature = "tracing")]
pub mod internal {
    use std::sync::atomic::{AtomicU64, Ordering};
    use tracing::{span, Level};

    use crate::metrics::{CollectionKind, CollectionStats};

    /// Steps of one local collection, in execution order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum GcPhase {
        /// Stack, sync-table and demoted-list roots.
        Roots,
        /// Draining the pending worklist.
        Trace,
        /// Weak reference fix-up.
        Weakrefs,
        /// Freeing or relinking the previous generation.
        Sweep,
    }

    /// Stable identifier for a local collection.
    ///
    /// Correlates every event emitted by one collection. Monotonically
    /// increasing across all threads, starting at 1.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    static NEXT_GC_ID: AtomicU64 = AtomicU64::new(1);

    /// Generate the next unique GC ID.
    pub fn next_gc_id() -> GcId {
        GcId(NEXT_GC_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Span covering one local collection.
    pub fn trace_local_collection(kind: CollectionKind, gc_id: GcId) -> span::EnteredSpan {
        span!(Level::DEBUG, "gc-local", kind = ?kind, gc_id = gc_id.0).entered()
    }

    /// Log the end of a phase.
    pub fn log_phase_end(phase: GcPhase, objects: usize) {
        tracing::trace!(phase = ?phase, objects, "phase_end");
    }

    /// Log the summary of a finished collection.
    pub fn log_collection_end(stats: &CollectionStats) {
        tracing::debug!(
            objects_copied = stats.objects_copied,
            bytes_copied = stats.bytes_copied,
            survivors_in_place = stats.survivors_in_place,
            objects_freed = stats.objects_freed,
            bytes_freed = stats.bytes_freed,
            weakrefs_cleared = stats.weakrefs_cleared,
            duration_us = u64::try_from(stats.duration.as_micros()).unwrap_or(u64::MAX),
            "collection_end"
        );
    }

    /// Log a transaction lifecycle step on thread `thread`.
    pub fn log_transaction(event: &'static str, thread: u64) {
        tracing::debug!(thread, event, "transaction");
    }

    /// Log the end-of-transaction promotion.
    pub fn log_promotion(objects: usize) {
        tracing::debug!(objects, "promote_locals_to_globals");
    }

    /// Log the main-thread write barrier demoting an object.
    pub fn log_demotion(addr: usize) {
        tracing::trace!(addr, "demote_global");
    }

    /// Log a fatal invariant violation before unwinding.
    pub fn log_fatal(msg: &str) {
        tracing::error!(msg, "stm-gc fatal");
    }
}

#[cfg(not(feature = "tracing"))]
pub mod internal {
    use crate::metrics::CollectionStats;

    /// Stub type when tracing is disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum GcPhase {
        /// Stack, sync-table and demoted-list roots.
        Roots,
        /// Draining the pending worklist.
        Trace,
        /// Weak reference fix-up.
        Weakrefs,
        /// Freeing or relinking the previous generation.
        Sweep,
    }

    /// Stub type when tracing is disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    /// Stub function when tracing is disabled.
    pub const fn next_gc_id() -> GcId {
        GcId(0)
    }

    /// Stub function when tracing is disabled.
    pub const fn log_phase_end(_phase: GcPhase, _objects: usize) {}

    /// Stub function when tracing is disabled.
    pub const fn log_collection_end(_stats: &CollectionStats) {}

    /// Stub function when tracing is disabled.
    pub const fn log_transaction(_event: &'static str, _thread: u64) {}

    /// Stub function when tracing is disabled.
    pub const fn log_promotion(_objects: usize) {}

    /// Stub function when tracing is disabled.
    pub const fn log_demotion(_addr: usize) {}

    /// Stub function when tracing is disabled.
    pub const fn log_fatal(_msg: &str) {}
}

pub use internal::GcId;
