//! Weak reference fix-up.
//!
//! Every LOCAL object whose type has a weak slot is recorded when it is
//! allocated. After tracing, and before the previous generation is swept,
//! each recorded weakref is revisited:
//!
//! - a weakref that was not reached itself is forgotten;
//! - a weakref whose referent died gets its slot cleared and is forgotten;
//! - a weakref whose referent moved gets its slot rewritten;
//! - every other weakref is kept as is.

use crate::error::{fatal_error, gc_assert};
use crate::gc::collect::{LocalCollector, Survival};
use crate::header::{GcFlags, ObjRef};

/// Rebuild `weakrefs` after the tracing part of a collection.
pub(crate) fn update_local_weakrefs(collector: &mut LocalCollector<'_>, weakrefs: &mut Vec<ObjRef>) {
    if weakrefs.is_empty() {
        return;
    }
    let types = collector.types();
    let nursery = collector.nursery();
    let mut kept = Vec::with_capacity(weakrefs.len());

    for mut obj in weakrefs.drain(..) {
        let flags = obj.flags();
        gc_assert!(
            !flags.intersects(GcFlags::GLOBAL | GcFlags::WAS_COPIED),
            "local weakref {obj:?}: bad flags {flags:?}"
        );
        if !flags.contains(GcFlags::VISITED) {
            // The weakref itself dies.
            continue;
        }
        if nursery.contains(obj) {
            obj = obj.moved_to();
        }

        let Some(offset) = types.info(obj.tag()).weak_offset() else {
            fatal_error(format_args!("{obj:?} is tracked as a weakref but has no weak slot"));
        };
        // SAFETY: the offset comes from this object's type descriptor.
        let slot = unsafe { &mut *obj.slot(offset) };
        let Some(target) = *slot else {
            // Nothing to fix up, now or later.
            continue;
        };

        *slot = resolve_weak_target(collector, target);
        if slot.is_some() {
            kept.push(obj);
        }
    }

    *weakrefs = kept;
}

/// Where a weak reference to `target` points once this collection is over:
/// `None` if the target dies, its new address if it moved.
pub(crate) fn resolve_weak_target(
    collector: &mut LocalCollector<'_>,
    target: ObjRef,
) -> Option<ObjRef> {
    match collector.categorize(target, true) {
        Survival::NotSurviving => {
            collector.stats_mut().weakrefs_cleared += 1;
            None
        }
        Survival::SurvivesMoved(moved) => {
            collector.stats_mut().weakrefs_updated += 1;
            Some(moved)
        }
        Survival::SurvivesInPlace => Some(target),
    }
}
