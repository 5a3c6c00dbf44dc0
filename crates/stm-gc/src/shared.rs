//! Shared-area allocation for objects that leave the nursery.
//!
//! [`SharedArea`] is process-wide and hands out individually freeable,
//! 16-byte aligned blocks. Each thread allocates through a
//! [`LocalAllocator`], which additionally keeps a *generation*: the sweep
//! list of OLD LOCAL objects, linked through their headers
//! ([`Link::Chain`]). A local collection opens a fresh generation, moves the
//! survivors of the previous one into it and frees the rest.

use std::alloc::{self, Layout};
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{fatal_error, gc_assert};
use crate::header::{GcFlags, Link, ObjRef, HEADER_SIZE, OBJECT_ALIGNMENT};

// ============================================================================
// SharedArea
// ============================================================================

/// Backing store for every object outside the nurseries.
#[derive(Debug, Default)]
pub struct SharedArea {
    live_objects: AtomicUsize,
    live_bytes: AtomicUsize,
}

impl SharedArea {
    /// Create an empty area.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            live_objects: AtomicUsize::new(0),
            live_bytes: AtomicUsize::new(0),
        }
    }

    fn layout(size: usize) -> Layout {
        Layout::from_size_align(size, OBJECT_ALIGNMENT)
            .unwrap_or_else(|_| fatal_error(format_args!("invalid object size {size}")))
    }

    /// Allocate `size` zeroed bytes. Aborts through
    /// [`handle_alloc_error`](alloc::handle_alloc_error) on exhaustion.
    pub(crate) fn allocate(&self, size: usize) -> NonNull<u8> {
        gc_assert!(size >= HEADER_SIZE, "object of {size} bytes is smaller than its header");
        let layout = Self::layout(size);
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            alloc::handle_alloc_error(layout);
        };
        self.live_objects.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(size, Ordering::Relaxed);
        ptr
    }

    /// Release the block holding `obj`.
    ///
    /// # Safety
    ///
    /// `obj` must come from [`allocate`](Self::allocate) on this area, with
    /// its header size intact, and must not be used afterwards.
    pub(crate) unsafe fn deallocate(&self, obj: ObjRef) {
        let size = obj.size();
        let layout = Self::layout(size);
        // SAFETY: guaranteed by the caller.
        unsafe { alloc::dealloc(obj.as_ptr(), layout) };
        self.live_objects.fetch_sub(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(size, Ordering::Relaxed);
    }

    /// Release a GLOBAL object. This crate never frees GLOBAL objects; an
    /// outer major collector that proved `obj` unreachable from every thread
    /// calls this.
    ///
    /// # Safety
    ///
    /// `obj` must be a GLOBAL object of this area that no thread can still
    /// reach.
    pub unsafe fn free_global(&self, obj: ObjRef) {
        gc_assert!(obj.is_global(), "free_global on non-GLOBAL object {obj:?}");
        // SAFETY: guaranteed by the caller.
        unsafe { self.deallocate(obj) };
    }

    /// Objects currently allocated in the area, across all threads.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.live_objects.load(Ordering::Relaxed)
    }

    /// Bytes currently allocated in the area, across all threads.
    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Relaxed)
    }
}

// ============================================================================
// LocalAllocator
// ============================================================================

/// One thread's view of the shared area, plus its current generation.
pub struct LocalAllocator {
    area: Arc<SharedArea>,
    head: Option<ObjRef>,
    len: usize,
}

impl LocalAllocator {
    pub(crate) const fn new(area: Arc<SharedArea>) -> Self {
        Self {
            area,
            head: None,
            len: 0,
        }
    }

    /// A fresh, empty generation over the same area.
    pub(crate) fn fresh(&self) -> Self {
        Self::new(Arc::clone(&self.area))
    }

    /// Allocate `size` zeroed bytes. The block is not part of the
    /// generation until [`add_regular`](Self::add_regular).
    pub(crate) fn malloc_object(&self, size: usize) -> NonNull<u8> {
        self.area.allocate(size)
    }

    /// Free an object allocated through this area.
    ///
    /// # Safety
    ///
    /// `obj` must come from [`malloc_object`](Self::malloc_object), must not
    /// be linked in any generation and must not be used afterwards.
    pub(crate) unsafe fn free_object(&self, obj: ObjRef) {
        // SAFETY: guaranteed by the caller.
        unsafe { self.area.deallocate(obj) };
    }

    /// Register `obj` in this generation. Overwrites its link word.
    pub(crate) fn add_regular(&mut self, obj: ObjRef) {
        obj.set_link(Link::Chain(self.head));
        self.head = Some(obj);
        self.len += 1;
    }

    /// Walk the generation.
    #[must_use]
    pub fn iter(&self) -> Chain<'_> {
        Chain::new(self.head)
    }

    /// Forget every registration, yielding each object once. The caller
    /// takes over the objects; the iterator reads each link before yielding
    /// so the yielded object may be relinked or freed.
    pub(crate) fn discard_all(&mut self) -> Chain<'static> {
        self.len = 0;
        Chain::new(self.head.take())
    }

    /// Free every object of the generation.
    pub(crate) fn free_and_clear(&mut self) {
        for obj in self.discard_all() {
            // SAFETY: `obj` was registered here and is no longer linked.
            unsafe { self.free_object(obj) };
        }
    }

    /// Number of objects in the generation.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// `true` if the generation is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `true` if any object of the generation carries `flags`.
    pub(crate) fn any_flagged(&self, flags: GcFlags) -> bool {
        self.iter().any(|obj| obj.flags().intersects(flags))
    }
}

impl std::fmt::Debug for LocalAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAllocator")
            .field("head", &self.head)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Iterator over a generation's sweep list.
pub struct Chain<'a> {
    next: Option<ObjRef>,
    _marker: PhantomData<&'a LocalAllocator>,
}

impl Chain<'_> {
    const fn new(head: Option<ObjRef>) -> Self {
        Self {
            next: head,
            _marker: PhantomData,
        }
    }
}

impl Iterator for Chain<'_> {
    type Item = ObjRef;

    fn next(&mut self) -> Option<ObjRef> {
        let obj = self.next?;
        self.next = match obj.link() {
            Link::Chain(next) => next,
            other => fatal_error(format_args!(
                "{obj:?} in a generation has link {other:?}"
            )),
        };
        Some(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::TypeTag;

    fn alloc(local: &LocalAllocator, size: usize) -> ObjRef {
        let ptr = local.malloc_object(size);
        unsafe { ObjRef::init(ptr, TypeTag::new(0), size) }
    }

    #[test]
    fn test_allocate_accounts_and_aligns() {
        let area = Arc::new(SharedArea::new());
        let local = LocalAllocator::new(Arc::clone(&area));
        let obj = alloc(&local, 64);
        assert_eq!(obj.addr() % OBJECT_ALIGNMENT, 0);
        assert_eq!(area.live_objects(), 1);
        assert_eq!(area.live_bytes(), 64);
        unsafe { local.free_object(obj) };
        assert_eq!(area.live_objects(), 0);
        assert_eq!(area.live_bytes(), 0);
    }

    #[test]
    fn test_generation_is_lifo() {
        let area = Arc::new(SharedArea::new());
        let mut local = LocalAllocator::new(area);
        let a = alloc(&local, 32);
        let b = alloc(&local, 32);
        local.add_regular(a);
        local.add_regular(b);
        assert_eq!(local.len(), 2);
        assert_eq!(local.iter().collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(a.link(), Link::Chain(None));
        assert_eq!(b.link(), Link::Chain(Some(a)));
        local.free_and_clear();
    }

    #[test]
    fn test_discard_all_allows_relinking() {
        let area = Arc::new(SharedArea::new());
        let mut old = LocalAllocator::new(Arc::clone(&area));
        for _ in 0..5 {
            let obj = alloc(&old, 48);
            old.add_regular(obj);
        }
        let mut young = old.fresh();
        let mut seen = 0;
        for obj in old.discard_all() {
            young.add_regular(obj);
            seen += 1;
        }
        assert_eq!(seen, 5);
        assert!(old.is_empty());
        assert_eq!(young.len(), 5);
        assert_eq!(young.iter().count(), 5);
        young.free_and_clear();
        assert_eq!(area.live_objects(), 0);
    }

    #[test]
    fn test_any_flagged() {
        let area = Arc::new(SharedArea::new());
        let mut local = LocalAllocator::new(area);
        let obj = alloc(&local, 32);
        local.add_regular(obj);
        assert!(!local.any_flagged(GcFlags::VISITED));
        obj.insert_flags(GcFlags::VISITED);
        assert!(local.any_flagged(GcFlags::VISITED));
        local.free_and_clear();
    }

    #[test]
    #[should_panic(expected = "in a generation has link")]
    fn test_broken_chain_is_fatal() {
        let area = Arc::new(SharedArea::new());
        let mut local = LocalAllocator::new(area);
        let obj = alloc(&local, 32);
        local.add_regular(obj);
        obj.set_link(Link::Empty);
        let _ = local.iter().count();
    }

    #[test]
    #[should_panic(expected = "free_global on non-GLOBAL")]
    fn test_free_global_requires_global() {
        let area = SharedArea::new();
        let ptr = area.allocate(32);
        let obj = unsafe { ObjRef::init(ptr, TypeTag::new(0), 32) };
        unsafe { area.free_global(obj) };
    }
}
