//! Pre-allocated old locations (shadows) of young objects.

use std::sync::Arc;

use stm_gc::{GcConfig, GcFlags, ObjRef, ObjectLayout, StmGc, ThreadGc, ThreadRole, TypeRegistry};

#[derive(Clone, Copy, ObjectLayout)]
#[repr(C)]
struct Node {
    value: u64,
    #[gc(strong)]
    next: Option<ObjRef>,
}

fn worker() -> (Arc<StmGc>, ThreadGc) {
    let mut types = TypeRegistry::new();
    types.register::<Node>();
    let gc = StmGc::new(GcConfig::default().with_nursery_size(64 * 1024), types).unwrap();
    let mut thread = ThreadGc::new(Arc::clone(&gc), ThreadRole::Worker).unwrap();
    thread.start_transaction();
    (gc, thread)
}

#[test]
fn test_stable_address_is_stable() {
    let (_gc, mut thread) = worker();
    let obj = thread.alloc(Node { value: 5, next: None });

    let shadow = thread.stable_address(obj);
    assert_ne!(shadow, obj);
    assert!(!thread.is_in_nursery(shadow));
    assert!(obj.flags().contains(GcFlags::HAS_SHADOW));
    assert_eq!(thread.stable_address(obj), shadow);
}

#[test]
fn test_collection_moves_object_into_its_shadow() {
    let (_gc, mut thread) = worker();
    let tail = thread.alloc(Node { value: 6, next: None });
    let obj = thread.alloc(Node {
        value: 5,
        next: Some(tail),
    });
    let root = thread.root(obj);
    let shadow = thread.stable_address(obj);

    let stats = thread.collect();

    assert_eq!(thread.rooted(root), Some(shadow));
    assert_eq!(thread.get::<Node>(shadow).value, 5);
    let tail = thread.get::<Node>(shadow).next.unwrap();
    assert_eq!(thread.get::<Node>(tail).value, 6);
    assert_eq!(stats.objects_copied, 2);
    assert_eq!(thread.generation_len(), 2);
    assert_eq!(thread.generation().filter(|&old| old == shadow).count(), 1);
    assert!(!shadow.flags().contains(GcFlags::HAS_SHADOW));
}

#[test]
fn test_old_objects_are_their_own_stable_address() {
    let (_gc, mut thread) = worker();
    let obj = thread.alloc(Node { value: 5, next: None });
    let root = thread.root(obj);
    thread.collect();

    let old = thread.rooted(root).unwrap();
    assert_eq!(thread.stable_address(old), old);
}

#[test]
fn test_shadow_of_dead_object_is_freed() {
    let (gc, mut thread) = worker();
    let obj = thread.alloc(Node { value: 5, next: None });
    let _ = thread.stable_address(obj);
    assert_eq!(gc.shared_area().live_objects(), 1);

    let stats = thread.collect();

    assert_eq!(stats.objects_freed, 1);
    assert_eq!(gc.shared_area().live_objects(), 0);
}
