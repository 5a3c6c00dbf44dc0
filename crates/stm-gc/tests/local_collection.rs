//! Local collections: nursery evacuation, old generation sweep, worklist depth.

use std::sync::Arc;

use stm_gc::{
    CollectionKind, GcConfig, GcFlags, ObjRef, ObjectLayout, StmGc, ThreadGc, ThreadRole,
    TypeInfo, TypeRegistry, HEADER_SIZE,
};

#[derive(Clone, Copy, ObjectLayout)]
#[repr(C)]
struct Node {
    value: u64,
    #[gc(strong)]
    next: Option<ObjRef>,
}

#[derive(Clone, Copy, ObjectLayout)]
#[repr(C)]
struct Pair {
    #[gc(strong)]
    left: Option<ObjRef>,
    #[gc(strong)]
    right: Option<ObjRef>,
}

fn heap(nursery_size: usize) -> Arc<StmGc> {
    let mut types = TypeRegistry::new();
    types.register::<Node>();
    types.register::<Pair>();
    StmGc::new(GcConfig::default().with_nursery_size(nursery_size), types).unwrap()
}

fn worker(gc: &Arc<StmGc>) -> ThreadGc {
    let mut thread = ThreadGc::new(Arc::clone(gc), ThreadRole::Worker).unwrap();
    thread.start_transaction();
    thread
}

/// Allocate `A -> B -> C` and return `A`.
fn chain(thread: &mut ThreadGc) -> ObjRef {
    let c = thread.alloc(Node { value: 3, next: None });
    let b = thread.alloc(Node { value: 2, next: Some(c) });
    thread.alloc(Node { value: 1, next: Some(b) })
}

fn values(thread: &ThreadGc, head: ObjRef) -> Vec<u64> {
    let mut out = Vec::new();
    let mut next = Some(head);
    while let Some(obj) = next {
        let node = thread.get::<Node>(obj);
        out.push(node.value);
        next = node.next;
    }
    out
}

#[test]
fn test_unreachable_chain_is_dropped() {
    let gc = heap(64 * 1024);
    let mut thread = worker(&gc);
    let _ = chain(&mut thread);

    let stats = thread.collect();
    assert_eq!(stats.kind, CollectionKind::Explicit);
    assert_eq!(stats.objects_copied, 0);
    assert_eq!(thread.generation_len(), 0);
    assert_eq!(gc.shared_area().live_objects(), 0);
    assert!(thread.nursery_is_empty());
}

#[test]
fn test_rooted_chain_is_moved_out() {
    let gc = heap(64 * 1024);
    let mut thread = worker(&gc);
    let a = chain(&mut thread);
    let root = thread.root(a);

    let stats = thread.collect();
    assert_eq!(stats.objects_copied, 3);
    assert_eq!(thread.generation_len(), 3);
    assert_eq!(gc.shared_area().live_objects(), 3);
    assert!(thread.nursery_is_empty());

    let a = thread.rooted(root).unwrap();
    assert_eq!(values(&thread, a), [1, 2, 3]);
    let b = thread.get::<Node>(a).next.unwrap();
    let c = thread.get::<Node>(b).next.unwrap();
    for obj in [a, b, c] {
        assert!(!thread.is_in_nursery(obj));
        assert!(thread.generation().any(|old| old == obj));
    }
}

#[test]
fn test_no_visited_flag_survives_a_collection() {
    let gc = heap(64 * 1024);
    let mut thread = worker(&gc);
    let a = chain(&mut thread);
    thread.root(a);
    thread.collect();
    // Second pass marks the old objects in place.
    let _ = chain(&mut thread);
    thread.collect();

    assert_eq!(thread.generation_len(), 3);
    for obj in thread.generation() {
        assert!(!obj.flags().contains(GcFlags::VISITED), "{obj:?}");
    }
}

#[test]
fn test_old_objects_are_swept_once_unreachable() {
    let gc = heap(64 * 1024);
    let mut thread = worker(&gc);
    let a = chain(&mut thread);
    let root = thread.root(a);
    thread.collect();

    let stats = thread.collect();
    assert_eq!(stats.objects_copied, 0);
    assert_eq!(stats.survivors_in_place, 3);
    assert_eq!(stats.objects_freed, 0);

    thread.roots_mut().set(root, None);
    let stats = thread.collect();
    assert_eq!(stats.objects_freed, 3);
    let node_size = gc.types().info(gc.types().tag_of::<Node>().unwrap()).total_size();
    assert_eq!(stats.bytes_freed, 3 * node_size);
    assert_eq!(thread.generation_len(), 0);
    assert_eq!(gc.shared_area().live_objects(), 0);
}

#[test]
fn test_young_object_reached_twice_is_copied_once() {
    let gc = heap(64 * 1024);
    let mut thread = worker(&gc);
    let shared = thread.alloc(Node { value: 7, next: None });
    let pair = thread.alloc(Pair {
        left: Some(shared),
        right: Some(shared),
    });
    let root = thread.root(pair);

    let stats = thread.collect();
    assert_eq!(stats.objects_copied, 2);
    let pair = thread.rooted(root).unwrap();
    let Pair { left, right } = *thread.get::<Pair>(pair);
    assert_eq!(left, right);
    assert_eq!(thread.get::<Node>(left.unwrap()).value, 7);
}

#[test]
fn test_young_object_referenced_from_old_object() {
    let gc = heap(64 * 1024);
    let mut thread = worker(&gc);
    let old = thread.alloc(Node { value: 1, next: None });
    let root = thread.root(old);
    thread.collect();

    let old = thread.rooted(root).unwrap();
    let young = thread.alloc(Node { value: 2, next: None });
    thread.get_mut::<Node>(old).next = Some(young);
    thread.collect();

    let moved = thread.get::<Node>(old).next.unwrap();
    assert_ne!(moved, young);
    assert!(!thread.is_in_nursery(moved));
    assert_eq!(values(&thread, old), [1, 2]);
    assert_eq!(thread.rooted(root), Some(old));
}

#[test]
fn test_cycles_terminate() {
    let gc = heap(64 * 1024);
    let mut thread = worker(&gc);
    let a = thread.alloc(Node { value: 1, next: None });
    let b = thread.alloc(Node { value: 2, next: Some(a) });
    thread.write_slot(a, 0, Some(b));
    let root = thread.root(a);

    let stats = thread.collect();
    assert_eq!(stats.objects_copied, 2);
    let a = thread.rooted(root).unwrap();
    let b = thread.read_slot(a, 0).unwrap();
    assert_eq!(thread.read_slot(b, 0), Some(a));

    let stats = thread.collect();
    assert_eq!(stats.survivors_in_place, 2);
}

#[test]
fn test_deep_list_does_not_recurse() {
    let gc = heap(4 * 1024 * 1024);
    let mut thread = worker(&gc);
    let mut head = None;
    for value in 0..50_000 {
        head = Some(thread.alloc(Node { value, next: head }));
    }
    let root = thread.root(head.unwrap());
    assert_eq!(thread.collections(), 0);

    let stats = thread.collect();
    assert_eq!(stats.objects_copied, 50_000);
    let head = thread.rooted(root).unwrap();
    let seen = values(&thread, head);
    assert_eq!(seen.len(), 50_000);
    assert_eq!(seen[0], 49_999);
    assert_eq!(seen[49_999], 0);
}

#[test]
fn test_full_nursery_triggers_collection() {
    let gc = heap(16 * 1024);
    let mut thread = worker(&gc);
    let keep = thread.alloc(Node { value: 42, next: None });
    let root = thread.root(keep);

    for value in 0..10_000 {
        let _ = thread.alloc(Node { value, next: None });
    }

    assert!(thread.collections() >= 1);
    assert_eq!(
        thread.last_collection().map(|stats| stats.kind),
        Some(CollectionKind::NurseryFull)
    );
    let keep = thread.rooted(root).unwrap();
    assert_eq!(thread.get::<Node>(keep).value, 42);
    assert_eq!(thread.generation_len(), 1);
}

#[test]
fn test_largest_object_fits_after_collection() {
    let mut types = TypeRegistry::new();
    let config = GcConfig::default().with_nursery_size(16 * 1024);
    let big = types.register_info(TypeInfo::raw("big", config.max_nursery_object() - HEADER_SIZE));
    let gc = StmGc::new(config, types).unwrap();
    let mut thread = worker(&gc);

    let first = thread.allocate(big);
    assert!(thread.is_in_nursery(first));
    assert_eq!(thread.collections(), 0);
    let second = thread.allocate(big);
    assert!(thread.is_in_nursery(second));
    assert_eq!(thread.collections(), 1);
}

#[test]
#[should_panic(expected = "local collection while gc not running")]
fn test_collect_outside_transaction_is_fatal() {
    let gc = heap(16 * 1024);
    let mut thread = ThreadGc::new(gc, ThreadRole::Worker).unwrap();
    thread.collect();
}
