//! The collector and its per-thread state.
//!
//! [`StmGc`] is shared by every thread of one heap: configuration, type
//! registry, shared area, sync layer and the thread registry. Each thread
//! then creates its own [`ThreadGc`], which owns a nursery, a generation of
//! OLD LOCAL objects, its shadow stack and the per-transaction lists.
//!
//! # Transaction lifecycle
//!
//! ```text
//!            start_transaction()
//! DISABLED ─────────────────────▶ ACTIVE ──┐ allocate / collect
//!    ▲                              │   ◀──┘
//!    └──────────────────────────────┘
//!            stop_transaction()
//! ```
//!
//! `stop_transaction` runs an end-of-transaction collection, promotes every
//! survivor to GLOBAL and disables allocation. An aborted transaction simply
//! calls `start_transaction` again, which discards what was left.
//!
//! The main thread additionally brackets the parallel section with
//! [`enter_transactional_mode`](ThreadGc::enter_transactional_mode) and
//! [`leave_transactional_mode`](ThreadGc::leave_transactional_mode), and is
//! the only thread allowed to use [`write_barrier`](ThreadGc::write_barrier).

use std::any::type_name;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::config::GcConfig;
use crate::error::{fatal_error, gc_assert, GcError};
use crate::gc::collect::{mass_free, LocalCollector};
use crate::gc::promote::{demote, promote_locals_to_globals, restore_demoted};
use crate::header::{GcFlags, Link, ObjRef};
use crate::layout::{ObjectLayout, TypeInfo, TypeRegistry, TypeTag};
use crate::metrics::{CollectionKind, CollectionStats, PhaseTimer};
use crate::nursery::Nursery;
use crate::roots::{RootIndex, ShadowStack};
use crate::shared::{Chain, LocalAllocator, SharedArea};
use crate::sync::{NoSync, SyncLayer, ThreadHandle, ThreadRegistry, ThreadRole};
use crate::tracing::internal::{
    log_collection_end, log_demotion, log_phase_end, log_promotion, log_transaction, GcPhase,
};
use crate::weakref::{resolve_weak_target, update_local_weakrefs};

// ============================================================================
// StmGc
// ============================================================================

/// State shared by every thread of one STM heap.
pub struct StmGc {
    config: GcConfig,
    types: TypeRegistry,
    shared: Arc<SharedArea>,
    sync: Arc<dyn SyncLayer>,
    threads: ThreadRegistry,
}

impl StmGc {
    /// Create a collector without a sync layer.
    ///
    /// # Errors
    ///
    /// Returns [`GcError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: GcConfig, types: TypeRegistry) -> Result<Arc<Self>, GcError> {
        Self::with_sync_layer(config, types, Arc::new(NoSync))
    }

    /// Create a collector that consults `sync` for (GLOBAL, LOCAL) pairs.
    ///
    /// # Errors
    ///
    /// Returns [`GcError::InvalidConfig`] if `config` does not validate.
    pub fn with_sync_layer(
        config: GcConfig,
        types: TypeRegistry,
        sync: Arc<dyn SyncLayer>,
    ) -> Result<Arc<Self>, GcError> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            types,
            shared: Arc::new(SharedArea::new()),
            sync,
            threads: ThreadRegistry::new(),
        }))
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &GcConfig {
        &self.config
    }

    /// The type registry.
    #[must_use]
    pub const fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// The shared area all threads allocate old objects from.
    #[must_use]
    pub fn shared_area(&self) -> &SharedArea {
        &self.shared
    }

    /// The sync layer.
    #[must_use]
    pub fn sync_layer(&self) -> &dyn SyncLayer {
        &*self.sync
    }

    /// Threads currently attached.
    #[must_use]
    pub const fn threads(&self) -> &ThreadRegistry {
        &self.threads
    }

    fn tag_of<T: ObjectLayout>(&self) -> TypeTag {
        self.types
            .tag_of::<T>()
            .unwrap_or_else(|| fatal_error(format_args!("type {} is not registered", type_name::<T>())))
    }
}

impl std::fmt::Debug for StmGc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StmGc")
            .field("config", &self.config)
            .field("types", &self.types.len())
            .field("threads", &self.threads.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ThreadGc
// ============================================================================

/// One thread's GC state.
///
/// Not `Send`: a `ThreadGc` lives and dies on the thread that created it.
/// Dropping it tears the thread down: leftover LOCAL objects are freed,
/// the thread is unregistered and the nursery is unmapped.
pub struct ThreadGc {
    gc: Arc<StmGc>,
    handle: ThreadHandle,
    role: ThreadRole,
    nursery: Nursery,
    local: LocalAllocator,
    /// LOCAL copies of GLOBAL objects made during this transaction.
    copied_local_objects: Vec<ObjRef>,
    /// LOCAL objects with a weak slot.
    local_weakrefs: Vec<ObjRef>,
    /// Weak target of a value `alloc` is placing, while the allocation may
    /// collect.
    staged_weak: Option<ObjRef>,
    /// Main thread only: GLOBAL objects turned LOCAL by the write barrier.
    demoted: Option<ObjRef>,
    roots: ShadowStack,
    collections: u64,
    last_collection: Option<CollectionStats>,
    _not_send: PhantomData<*const ()>,
}

impl ThreadGc {
    /// Attach the calling thread to `gc`.
    ///
    /// The thread starts outside any transaction; call
    /// [`start_transaction`](Self::start_transaction) before allocating.
    ///
    /// # Errors
    ///
    /// - [`GcError::NurseryAllocation`] if the nursery cannot be mapped.
    /// - [`GcError::MainThreadAlreadyRegistered`] for a second main thread.
    ///
    /// Nothing stays registered when an error is returned.
    pub fn new(gc: Arc<StmGc>, role: ThreadRole) -> Result<Self, GcError> {
        let nursery = Nursery::new(gc.config.nursery_size, gc.config.decommit_threshold)?;
        let handle = gc.threads.register(role)?;
        gc.sync.register(handle, role == ThreadRole::Main);
        let local = LocalAllocator::new(Arc::clone(&gc.shared));
        Ok(Self {
            gc,
            handle,
            role,
            nursery,
            local,
            copied_local_objects: Vec::new(),
            local_weakrefs: Vec::new(),
            staged_weak: None,
            demoted: None,
            roots: ShadowStack::new(),
            collections: 0,
            last_collection: None,
            _not_send: PhantomData,
        })
    }

    /// The collector this thread belongs to.
    #[must_use]
    pub const fn gc(&self) -> &Arc<StmGc> {
        &self.gc
    }

    /// This thread's identity in the registry and the sync layer.
    #[must_use]
    pub const fn handle(&self) -> ThreadHandle {
        self.handle
    }

    /// This thread's role.
    #[must_use]
    pub const fn role(&self) -> ThreadRole {
        self.role
    }

    /// `true` for the main thread.
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.role == ThreadRole::Main
    }

    /// The shadow stack the collector takes roots from.
    #[must_use]
    pub const fn roots(&self) -> &ShadowStack {
        &self.roots
    }

    /// Mutable access to the shadow stack.
    pub fn roots_mut(&mut self) -> &mut ShadowStack {
        &mut self.roots
    }

    /// Shorthand for `roots_mut().push(obj)`.
    pub fn root(&mut self, obj: ObjRef) -> RootIndex {
        self.roots.push(obj)
    }

    /// Shorthand for `roots().get(index)`.
    #[must_use]
    pub fn rooted(&self, index: RootIndex) -> Option<ObjRef> {
        self.roots.get(index)
    }

    // ------------------------------------------------------------------------
    // Transaction lifecycle
    // ------------------------------------------------------------------------

    /// `true` between `start_transaction` and `stop_transaction`.
    #[must_use]
    pub const fn is_transaction_active(&self) -> bool {
        self.nursery.is_enabled()
    }

    /// Drop whatever a previous, possibly aborted, transaction left behind
    /// and enable allocation into an empty nursery.
    pub fn start_transaction(&mut self) {
        self.cleanup_state();
        self.nursery.enable();
        log_transaction("start", self.handle.id());
    }

    /// Collect, promote every surviving LOCAL object to GLOBAL and disable
    /// allocation.
    pub fn stop_transaction(&mut self) {
        gc_assert!(
            self.nursery.is_enabled(),
            "stop_transaction outside a transaction"
        );
        self.local_collection(CollectionKind::EndOfTransaction);
        if !self.nursery.is_empty() {
            self.local_collection(CollectionKind::EndOfTransactionRetry);
        }
        let promoted = promote_locals_to_globals(&self.nursery, &mut self.local);
        gc_assert!(self.local.is_empty(), "generation not empty after promotion");
        log_promotion(promoted);
        self.nursery.disable();
        log_transaction("stop", self.handle.id());
    }

    /// Main thread, before spawning workers: end the current transaction and
    /// make every demoted object GLOBAL again.
    pub fn enter_transactional_mode(&mut self) {
        self.require_main("enter_transactional_mode");
        self.stop_transaction();
        restore_demoted(self.demoted.take());
        log_transaction("enter_transactional_mode", self.handle.id());
    }

    /// Main thread, once all workers are done: start a new transaction and
    /// demote every GLOBAL object directly referenced from the roots, since
    /// it may be written without another write barrier call.
    pub fn leave_transactional_mode(&mut self) {
        self.require_main("leave_transactional_mode");
        self.start_transaction();
        self.demoted = None;
        let direct: Vec<ObjRef> = self.roots.iter().collect();
        for obj in direct {
            if obj.is_global() {
                self.write_barrier(obj);
            }
        }
        log_transaction("leave_transactional_mode", self.handle.id());
    }

    /// Main thread only: make `obj` writable. A GLOBAL `obj` becomes LOCAL
    /// (and VISITED, to keep it alive) and joins the demoted list. LOCAL
    /// objects are left alone.
    pub fn write_barrier(&mut self, obj: ObjRef) {
        self.require_main("write_barrier");
        if obj.is_global() {
            demote(obj, &mut self.demoted);
            log_demotion(obj.addr());
        }
    }

    fn require_main(&self, what: &str) {
        gc_assert!(
            self.is_main(),
            "{what} called on worker thread {}",
            self.handle.id()
        );
    }

    fn cleanup_state(&mut self) {
        self.local.free_and_clear();
        for obj in self.copied_local_objects.drain(..) {
            // SAFETY: local copies are allocated by `malloc_local_copy` and
            // never linked into a generation.
            unsafe { self.local.free_object(obj) };
        }
        self.local_weakrefs.clear();
    }

    // ------------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------------

    /// Run a local collection now.
    ///
    /// Collecting outside a transaction is fatal.
    pub fn collect(&mut self) -> CollectionStats {
        self.local_collection(CollectionKind::Explicit)
    }

    fn local_collection(&mut self, kind: CollectionKind) -> CollectionStats {
        gc_assert!(
            self.nursery.is_enabled(),
            "local collection while gc not running"
        );
        #[cfg(feature = "tracing")]
        let _span = crate::tracing::internal::trace_local_collection(
            kind,
            crate::tracing::internal::next_gc_id(),
        );

        let mut timer = PhaseTimer::start();
        let fresh = self.local.fresh();
        let mut previous = std::mem::replace(&mut self.local, fresh);

        let Self {
            gc,
            handle,
            role,
            nursery,
            local,
            copied_local_objects,
            local_weakrefs,
            staged_weak,
            demoted,
            roots,
            ..
        } = self;

        let mut collector = LocalCollector::new(&gc.types, nursery, local, kind);
        roots.walk_roots(&mut |slot| collector.drag_out(slot));
        match role {
            ThreadRole::Worker => {
                let mut reported = HashSet::new();
                gc.sync.enumerate_pairs(*handle, &mut |global, copy| {
                    collector.trace_pair(global, copy);
                    reported.insert(copy);
                });
                // Copies the sync layer does not know about are roots too.
                for &copy in copied_local_objects.iter() {
                    if !reported.contains(&copy) {
                        collector.trace_fields(copy);
                    }
                }
            }
            ThreadRole::Main => collector.trace_demoted(*demoted),
        }
        log_phase_end(GcPhase::Roots, roots.len());
        collector.flush_pending();
        log_phase_end(GcPhase::Trace, collector.stats_mut().objects_copied);
        let trace_duration = timer.lap();

        update_local_weakrefs(&mut collector, local_weakrefs);
        if let Some(target) = *staged_weak {
            *staged_weak = resolve_weak_target(&mut collector, target);
        }
        log_phase_end(GcPhase::Weakrefs, local_weakrefs.len());
        let weakref_duration = timer.lap();

        let mut stats = collector.finish();
        mass_free(&mut previous, local, &mut stats);
        log_phase_end(GcPhase::Sweep, local.len());
        stats.sweep_duration = timer.lap();
        stats.trace_duration = trace_duration;
        stats.weakref_duration = weakref_duration;

        #[cfg(debug_assertions)]
        gc_assert!(
            !local.any_flagged(GcFlags::VISITED),
            "VISITED object left in the generation after a collection"
        );

        nursery.reset();
        stats.duration = timer.total();

        log_collection_end(&stats);
        self.collections += 1;
        self.last_collection = Some(stats);
        stats
    }

    // ------------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------------

    /// Allocate a zeroed object of type `tag` in the nursery, collecting as
    /// often as needed to make room.
    ///
    /// Fatal outside a transaction, or if the object is larger than 7/8 of
    /// the nursery.
    pub fn allocate(&mut self, tag: TypeTag) -> ObjRef {
        let gc = Arc::clone(&self.gc);
        let info = gc.types.info(tag);
        let size = info.total_size();
        let ptr = self.allocate_bump(size);
        // SAFETY: `ptr` is a fresh, zeroed, aligned block of `size` bytes.
        let obj = unsafe { ObjRef::init(ptr, tag, size) };
        if info.weak_offset().is_some() {
            self.local_weakrefs.push(obj);
        }
        obj
    }

    fn allocate_bump(&mut self, size: usize) -> NonNull<u8> {
        if !self.nursery.is_enabled() {
            fatal_error("malloc outside a transaction");
        }
        if size > self.gc.config.max_nursery_object() {
            fatal_error(format_args!(
                "object too large to ever fit in the nursery ({size} bytes)"
            ));
        }
        loop {
            if let Some(ptr) = self.nursery.try_bump(size) {
                return ptr;
            }
            self.local_collection(CollectionKind::NurseryFull);
        }
    }

    /// Allocate an object holding `value`.
    ///
    /// References stored in `value` are kept up to date if the allocation
    /// has to collect.
    pub fn alloc<T: ObjectLayout>(&mut self, mut value: T) -> ObjRef {
        let gc = Arc::clone(&self.gc);
        let tag = gc.tag_of::<T>();
        let info = gc.types.info(tag);

        let obj = if self.nursery.is_enabled() && self.nursery_has_room(info.total_size()) {
            self.allocate(tag)
        } else {
            let base = std::ptr::addr_of_mut!(value).cast::<u8>();
            let rooted = Self::root_slots(&mut self.roots, base, info);
            let weak = info.weak_offset();
            if let Some(offset) = weak {
                // SAFETY: `offset` is the weak slot of `T` inside `value`.
                self.staged_weak = unsafe { *base.add(offset).cast::<Option<ObjRef>>() };
            }
            let obj = self.allocate(tag);
            for (offset, index) in rooted {
                // SAFETY: `offset` is a slot of `T` inside `value`.
                unsafe { *base.add(offset).cast::<Option<ObjRef>>() = self.roots.get(index) };
            }
            self.roots.pop_frame();
            if let Some(offset) = weak {
                // SAFETY: as above.
                unsafe { *base.add(offset).cast::<Option<ObjRef>>() = self.staged_weak.take() };
            }
            obj
        };
        // SAFETY: the payload was sized and aligned for `T`.
        unsafe { obj.payload().cast::<T>().as_ptr().write(value) };
        obj
    }

    /// Push the non-empty strong slots of a not-yet-allocated value as
    /// roots, in a new frame.
    fn root_slots(
        roots: &mut ShadowStack,
        base: *mut u8,
        info: &TypeInfo,
    ) -> Vec<(usize, RootIndex)> {
        roots.push_frame();
        info.strong_offsets()
            .iter()
            .copied()
            .filter_map(|offset| {
                // SAFETY: `offset` is a slot inside the value at `base`.
                let slot = unsafe { *base.add(offset).cast::<Option<ObjRef>>() };
                slot.map(|obj| (offset, roots.push(obj)))
            })
            .collect()
    }

    fn nursery_has_room(&self, size: usize) -> bool {
        self.nursery.capacity() - self.nursery.used() >= size
    }

    /// Allocate an OLD LOCAL copy of the GLOBAL object `global`.
    ///
    /// The copy is flagged WAS_COPIED and VISITED and linked to `global`,
    /// which is flagged WAS_COPIED too. The sync layer is expected to report
    /// the pair from now on; until it does, the copy is traced as a root.
    /// The copy is freed when the next transaction starts.
    ///
    /// Fatal on the main thread, which writes GLOBAL objects in place
    /// through [`write_barrier`](Self::write_barrier).
    pub fn malloc_local_copy(&mut self, global: ObjRef) -> ObjRef {
        gc_assert!(!self.is_main(), "malloc_local_copy called on the main thread");
        gc_assert!(
            self.nursery.is_enabled(),
            "malloc_local_copy outside a transaction"
        );
        gc_assert!(global.is_global(), "local copy of non-GLOBAL {global:?}");
        let ptr = self.local.malloc_object(global.size());
        // SAFETY: `ptr` is a fresh block of `global.size()` bytes.
        let copy = unsafe { global.copy_to(ptr) };
        copy.set_flags(
            global.flags().without(GcFlags::GLOBAL) | GcFlags::WAS_COPIED | GcFlags::VISITED,
        );
        copy.set_link(Link::GlobalCopy(global));
        global.insert_flags(GcFlags::WAS_COPIED);
        self.copied_local_objects.push(copy);
        copy
    }

    /// An address for `obj` that stays valid when the next collection moves
    /// it out of the nursery. For a young object this pre-allocates its old
    /// location (its shadow); any other object is returned unchanged.
    pub fn stable_address(&mut self, obj: ObjRef) -> ObjRef {
        if !self.nursery.contains(obj) {
            return obj;
        }
        let flags = obj.flags();
        if flags.contains(GcFlags::HAS_SHADOW) {
            return match obj.link() {
                Link::Shadow(shadow) => shadow,
                other => fatal_error(format_args!(
                    "{obj:?} has HAS_SHADOW but its link is {other:?}"
                )),
            };
        }
        gc_assert!(
            !flags.contains(GcFlags::VISITED),
            "young object {obj:?} is VISITED outside a collection"
        );
        let size = obj.size();
        let ptr = self.local.malloc_object(size);
        // SAFETY: `ptr` is a fresh block of `size` bytes.
        let shadow = unsafe { ObjRef::init(ptr, obj.tag(), size) };
        self.local.add_regular(shadow);
        obj.insert_flags(GcFlags::HAS_SHADOW);
        obj.set_link(Link::Shadow(shadow));
        shadow
    }

    // ------------------------------------------------------------------------
    // Typed access
    // ------------------------------------------------------------------------

    fn check_type<T: ObjectLayout>(&self, obj: ObjRef) {
        let tag = self.gc.tag_of::<T>();
        gc_assert!(obj.tag() == tag, "{obj:?} is not a {}", type_name::<T>());
    }

    fn check_writable(obj: ObjRef) {
        gc_assert!(
            !obj.is_global(),
            "write to GLOBAL object {obj:?} without the write barrier"
        );
    }

    /// Borrow the payload of `obj` as a `T`.
    ///
    /// `obj` must be live: rooted, or reachable from a root, since the last
    /// collection.
    #[must_use]
    pub fn get<T: ObjectLayout>(&self, obj: ObjRef) -> &T {
        self.check_type::<T>(obj);
        // SAFETY: the tag matches `T`, so the payload holds a `T`.
        unsafe { obj.payload().cast::<T>().as_ref() }
    }

    /// Mutably borrow the payload of a LOCAL `obj` as a `T`.
    ///
    /// Writing a GLOBAL object is fatal; the main thread must call
    /// [`write_barrier`](Self::write_barrier) first.
    pub fn get_mut<T: ObjectLayout>(&mut self, obj: ObjRef) -> &mut T {
        self.check_type::<T>(obj);
        Self::check_writable(obj);
        // SAFETY: as in `get`; `&mut self` keeps collections out while the
        // borrow lives.
        unsafe { obj.payload().cast::<T>().as_mut() }
    }

    fn strong_offset(&self, obj: ObjRef, index: usize) -> usize {
        let info = self.gc.types.info(obj.tag());
        match info.strong_offsets().get(index) {
            Some(&offset) => offset,
            None => fatal_error(format_args!(
                "{} has no strong slot #{index}",
                info.name()
            )),
        }
    }

    /// Read strong slot number `index` of `obj`.
    #[must_use]
    pub fn read_slot(&self, obj: ObjRef, index: usize) -> Option<ObjRef> {
        let offset = self.strong_offset(obj, index);
        // SAFETY: `offset` comes from the type descriptor of `obj`.
        unsafe { *obj.slot(offset) }
    }

    /// Write strong slot number `index` of a LOCAL `obj`.
    pub fn write_slot(&mut self, obj: ObjRef, index: usize, value: Option<ObjRef>) {
        Self::check_writable(obj);
        let offset = self.strong_offset(obj, index);
        // SAFETY: `offset` comes from the type descriptor of `obj`.
        unsafe { *obj.slot(offset) = value };
    }

    /// Current target of the weak slot of `obj`.
    #[must_use]
    pub fn weak_target(&self, obj: ObjRef) -> Option<ObjRef> {
        let info = self.gc.types.info(obj.tag());
        let Some(offset) = info.weak_offset() else {
            fatal_error(format_args!("{} has no weak slot", info.name()));
        };
        // SAFETY: `offset` comes from the type descriptor of `obj`.
        unsafe { *obj.slot(offset) }
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    /// `true` if `obj` is a young object of this thread.
    #[must_use]
    pub fn is_in_nursery(&self, obj: ObjRef) -> bool {
        self.nursery.contains(obj)
    }

    /// `true` if nothing was allocated since the last reset. Fatal outside a
    /// transaction.
    #[must_use]
    pub fn nursery_is_empty(&self) -> bool {
        self.nursery.is_empty()
    }

    /// Nursery bytes in use.
    #[must_use]
    pub fn nursery_used(&self) -> usize {
        self.nursery.used()
    }

    /// Nursery capacity.
    #[must_use]
    pub const fn nursery_capacity(&self) -> usize {
        self.nursery.capacity()
    }

    /// The OLD LOCAL objects of the current generation.
    #[must_use]
    pub fn generation(&self) -> Chain<'_> {
        self.local.iter()
    }

    /// Number of objects in the current generation.
    #[must_use]
    pub const fn generation_len(&self) -> usize {
        self.local.len()
    }

    /// The main thread's demoted objects, most recent first.
    #[must_use]
    pub fn demoted(&self) -> Vec<ObjRef> {
        let mut out = Vec::new();
        let mut next = self.demoted;
        while let Some(obj) = next {
            out.push(obj);
            next = match obj.link() {
                Link::Demoted(next) => next,
                _ => None,
            };
        }
        out
    }

    /// LOCAL copies made during this transaction.
    #[must_use]
    pub fn copied_local_objects(&self) -> &[ObjRef] {
        &self.copied_local_objects
    }

    /// Weak references tracked for the next collection.
    #[must_use]
    pub fn local_weakrefs(&self) -> &[ObjRef] {
        &self.local_weakrefs
    }

    /// Statistics of the most recent collection.
    #[must_use]
    pub const fn last_collection(&self) -> Option<&CollectionStats> {
        self.last_collection.as_ref()
    }

    /// Collections run by this thread.
    #[must_use]
    pub const fn collections(&self) -> u64 {
        self.collections
    }
}

impl Drop for ThreadGc {
    fn drop(&mut self) {
        // After a fatal error the generation may be half rebuilt; leak it
        // rather than walk it.
        if !std::thread::panicking() {
            self.cleanup_state();
        }
        self.gc.sync.unregister(self.handle);
        self.gc.threads.unregister(self.handle);
        log_transaction("teardown", self.handle.id());
    }
}

impl std::fmt::Debug for ThreadGc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadGc")
            .field("handle", &self.handle)
            .field("role", &self.role)
            .field("nursery", &self.nursery)
            .field("generation", &self.local.len())
            .field("collections", &self.collections)
            .finish_non_exhaustive()
    }
}
