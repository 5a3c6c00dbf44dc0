//! LOCAL → GLOBAL promotion and the main thread's demotions.

use crate::error::{fatal_error, gc_assert};
use crate::header::{GcFlags, Link, ObjRef};
use crate::nursery::Nursery;
use crate::shared::LocalAllocator;

/// Flip every object of the current generation to GLOBAL and empty the
/// generation. Returns the number of promoted objects.
pub(crate) fn promote_locals_to_globals(nursery: &Nursery, local: &mut LocalAllocator) -> usize {
    gc_assert!(nursery.is_empty(), "nursery must be empty before promotion");
    let mut promoted = 0;
    for obj in local.discard_all() {
        let flags = obj.flags();
        gc_assert!(!flags.contains(GcFlags::GLOBAL), "already GLOBAL: {obj:?}");
        gc_assert!(
            !flags.contains(GcFlags::VISITED),
            "unexpected VISITED at promotion: {obj:?}"
        );
        obj.insert_flags(GcFlags::GLOBAL);
        obj.set_link(Link::Empty);
        promoted += 1;
    }
    promoted
}

/// Turn a GLOBAL object back into a LOCAL one and push it on the demoted
/// list headed by `head`.
pub(crate) fn demote(obj: ObjRef, head: &mut Option<ObjRef>) {
    let flags = obj.flags();
    gc_assert!(flags.contains(GcFlags::GLOBAL), "demoting non-GLOBAL {obj:?}");
    gc_assert!(
        !flags.contains(GcFlags::VISITED),
        "write in main thread: unexpected VISITED on {obj:?}"
    );
    obj.set_flags(flags.without(GcFlags::GLOBAL) | GcFlags::VISITED);
    obj.set_link(Link::Demoted(*head));
    *head = Some(obj);
}

/// Make every object of a demoted list GLOBAL again. Returns how many.
pub(crate) fn restore_demoted(head: Option<ObjRef>) -> usize {
    let mut restored = 0;
    let mut next = head;
    while let Some(obj) = next {
        next = match obj.link() {
            Link::Demoted(next) => next,
            other => fatal_error(format_args!(
                "{obj:?} in the demoted list has link {other:?}"
            )),
        };
        let flags = obj.flags();
        gc_assert!(!flags.contains(GcFlags::GLOBAL), "already GLOBAL [demoted]: {obj:?}");
        gc_assert!(flags.contains(GcFlags::VISITED), "missing VISITED [demoted]: {obj:?}");
        obj.set_flags(flags.without(GcFlags::VISITED) | GcFlags::GLOBAL);
        obj.set_link(Link::Empty);
        restored += 1;
    }
    restored
}
