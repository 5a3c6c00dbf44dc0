//! Local mark/copy collection.
//!
//! A local collection only touches the LOCAL objects of one thread:
//!
//! 1. Young objects reached from a root are copied out of the nursery into
//!    the new generation (or into their shadow slot) and forwarded.
//! 2. Old objects of the previous generation that are reached are flagged
//!    VISITED in place.
//! 3. Every copied or flagged object is pushed on the pending [`Worklist`]
//!    and its fields are traced the same way until the worklist is empty.
//! 4. [`mass_free`] then walks the previous generation: VISITED objects are
//!    relinked into the new generation, the rest is freed.
//!
//! GLOBAL objects are never moved, flagged or freed here.

use std::ptr::NonNull;

use crate::error::{fatal_error, gc_assert};
use crate::gc::worklist::Worklist;
use crate::header::{GcFlags, Link, ObjRef};
use crate::layout::TypeRegistry;
use crate::metrics::{CollectionKind, CollectionStats};
use crate::nursery::Nursery;
use crate::shared::LocalAllocator;

/// Flags that decide whether an object survives.
const SURVIVAL_FLAGS: GcFlags = GcFlags::GLOBAL
    .union(GcFlags::WAS_COPIED)
    .union(GcFlags::VISITED);

/// LOCAL copies still paired with their GLOBAL original. Only at the end of
/// a transaction do references to them get redirected to the original.
const DETECT_AT_END_OF_TRANSACTION: GcFlags = GcFlags::WAS_COPIED.union(GcFlags::VISITED);

/// Where an object stands in the collection in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Survival {
    /// Not reached so far.
    NotSurviving,
    /// Survives at its current address.
    SurvivesInPlace,
    /// Survives; references must be rewritten to the given address.
    SurvivesMoved(ObjRef),
}

/// State of one local collection.
///
/// Borrows the parts of the thread state the tracer mutates, so that root
/// sources owned by the same thread can be walked while it runs.
pub struct LocalCollector<'a> {
    types: &'a TypeRegistry,
    nursery: &'a Nursery,
    to_space: &'a mut LocalAllocator,
    pending: Worklist,
    detect: Option<GcFlags>,
    stats: CollectionStats,
}

impl<'a> LocalCollector<'a> {
    /// Start a collection copying into `to_space`.
    pub(crate) fn new(
        types: &'a TypeRegistry,
        nursery: &'a Nursery,
        to_space: &'a mut LocalAllocator,
        kind: CollectionKind,
    ) -> Self {
        Self {
            types,
            nursery,
            to_space,
            pending: Worklist::new(),
            detect: kind
                .is_end_of_transaction()
                .then_some(DETECT_AT_END_OF_TRANSACTION),
            stats: CollectionStats::new(kind, nursery.used()),
        }
    }

    /// Classify `obj`. `can_be_in_nursery` is `false` when the caller
    /// already knows `obj` is old.
    pub(crate) fn categorize(&self, obj: ObjRef, can_be_in_nursery: bool) -> Survival {
        let combo = obj.flags() & SURVIVAL_FLAGS;
        if combo.is_empty() {
            return Survival::NotSurviving;
        }
        if Some(combo) == self.detect {
            return Survival::SurvivesMoved(obj.moved_to());
        }
        if can_be_in_nursery && self.nursery.contains(obj) {
            return Survival::SurvivesMoved(obj.moved_to());
        }
        Survival::SurvivesInPlace
    }

    /// Make the object in `slot` survive, rewriting the slot if it moves.
    pub(crate) fn drag_out(&mut self, slot: &mut ObjRef) {
        let obj = *slot;

        if !self.nursery.contains(obj) {
            match self.categorize(obj, false) {
                Survival::NotSurviving => {
                    obj.insert_flags(GcFlags::VISITED);
                    self.pending.push(obj);
                }
                Survival::SurvivesMoved(target) => *slot = target,
                Survival::SurvivesInPlace => {}
            }
            return;
        }

        let flags = obj.flags();
        if flags.contains(GcFlags::VISITED) {
            *slot = obj.moved_to();
            return;
        }

        let size = obj.size();
        let copy = if flags.contains(GcFlags::HAS_SHADOW) {
            // The shadow keeps its address and its place in its generation;
            // only the content comes from the young object.
            obj.remove_flags(GcFlags::HAS_SHADOW);
            let shadow = match obj.link() {
                Link::Shadow(shadow) => shadow,
                other => fatal_error(format_args!(
                    "{obj:?} has HAS_SHADOW but its link is {other:?}"
                )),
            };
            let saved = shadow.link();
            // SAFETY: the shadow was allocated with this object's size.
            unsafe { obj.copy_to(NonNull::new_unchecked(shadow.as_ptr())) };
            shadow.set_link(saved);
            shadow.set_flags(obj.flags() | GcFlags::VISITED);
            shadow
        } else {
            let ptr = self.to_space.malloc_object(size);
            // SAFETY: `ptr` is a fresh block of `size` bytes.
            let copy = unsafe { obj.copy_to(ptr) };
            // Registering overwrites the link copied from the young object.
            self.to_space.add_regular(copy);
            copy
        };

        obj.insert_flags(GcFlags::VISITED);
        obj.set_link(Link::Forward(copy));
        *slot = copy;
        self.pending.push(copy);

        self.stats.objects_copied += 1;
        self.stats.bytes_copied += size;
    }

    /// Drag out every object referenced from the strong slots of `obj`.
    pub(crate) fn trace_fields(&mut self, obj: ObjRef) {
        let types = self.types;
        let info = types.info(obj.tag());
        for &offset in info.strong_offsets() {
            // SAFETY: the offset comes from this object's type descriptor.
            let slot = unsafe { &mut *obj.slot(offset) };
            if let Some(target) = slot {
                self.drag_out(target);
            }
        }
    }

    /// Trace a (GLOBAL, LOCAL copy) pair reported by the sync layer.
    pub(crate) fn trace_pair(&mut self, global: ObjRef, local: ObjRef) {
        gc_assert!(
            local.link() == Link::GlobalCopy(global),
            "in a root: {local:?} is not the local copy of {global:?}"
        );
        let local_flags = local.flags();
        gc_assert!(
            !local_flags.contains(GcFlags::GLOBAL),
            "in a root: unexpected GLOBAL on {local:?}"
        );
        gc_assert!(
            local_flags.contains(GcFlags::WAS_COPIED),
            "in a root: missing WAS_COPIED on {local:?}"
        );
        gc_assert!(
            local_flags.contains(GcFlags::VISITED),
            "in a root: missing VISITED on {local:?}"
        );
        let global_flags = global.flags();
        gc_assert!(
            global_flags.contains(GcFlags::GLOBAL),
            "in a root: GLOBAL: missing GLOBAL on {global:?}"
        );
        gc_assert!(
            global_flags.contains(GcFlags::WAS_COPIED),
            "in a root: GLOBAL: missing WAS_COPIED on {global:?}"
        );
        gc_assert!(
            !global_flags.contains(GcFlags::VISITED),
            "in a root: GLOBAL: unexpected VISITED on {global:?}"
        );
        gc_assert!(
            local.tag() == global.tag(),
            "in a root: type(LOCAL) != type(GLOBAL) for {local:?}"
        );
        self.trace_fields(local);
    }

    /// Trace every object of the main thread's demoted list.
    pub(crate) fn trace_demoted(&mut self, head: Option<ObjRef>) {
        let mut next = head;
        while let Some(obj) = next {
            let flags = obj.flags();
            gc_assert!(
                !flags.contains(GcFlags::GLOBAL),
                "unexpected GLOBAL in the demoted list: {obj:?}"
            );
            gc_assert!(
                flags.contains(GcFlags::VISITED),
                "missing VISITED in the demoted list: {obj:?}"
            );
            next = match obj.link() {
                Link::Demoted(next) => next,
                other => fatal_error(format_args!(
                    "{obj:?} in the demoted list has link {other:?}"
                )),
            };
            self.trace_fields(obj);
        }
    }

    /// Trace until the pending worklist is empty.
    pub(crate) fn flush_pending(&mut self) {
        while let Some(obj) = self.pending.pop() {
            self.trace_fields(obj);
        }
    }

    pub(crate) const fn types(&self) -> &'a TypeRegistry {
        self.types
    }

    pub(crate) const fn nursery(&self) -> &'a Nursery {
        self.nursery
    }

    pub(crate) fn stats_mut(&mut self) -> &mut CollectionStats {
        &mut self.stats
    }

    /// End the tracing part of the collection.
    pub(crate) fn finish(self) -> CollectionStats {
        gc_assert!(self.pending.is_empty(), "collection finished with pending objects");
        self.stats
    }
}

/// Sweep the previous generation into `to_space`.
pub(crate) fn mass_free(
    previous: &mut LocalAllocator,
    to_space: &mut LocalAllocator,
    stats: &mut CollectionStats,
) {
    for obj in previous.discard_all() {
        if obj.flags().contains(GcFlags::VISITED) {
            obj.remove_flags(GcFlags::VISITED);
            to_space.add_regular(obj);
            stats.survivors_in_place += 1;
        } else {
            stats.objects_freed += 1;
            stats.bytes_freed += obj.size();
            // SAFETY: unreached, and no longer linked anywhere.
            unsafe { previous.free_object(obj) };
        }
    }
}
