//! Type descriptors for GC-managed objects.
//!
//! The collector is precise: for every object it must know where the
//! reference slots are. A [`TypeInfo`] records the payload size and the byte
//! offsets of its strong slots and of its (at most one) weak slot. Every
//! slot has the type `Option<ObjRef>`.
//!
//! Types are registered once in a [`TypeRegistry`] before the collector is
//! created; the registry is read-only afterwards.

use std::any::TypeId;
use std::collections::HashMap;
use std::mem::{align_of, size_of};

use crate::error::fatal_error;
use crate::header::{align_object_size, ObjRef, HEADER_SIZE, OBJECT_ALIGNMENT};

/// Index of a registered type, stored in every object header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeTag(u32);

impl TypeTag {
    #[must_use]
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Position in the registry.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Layout of one object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    name: &'static str,
    payload_size: usize,
    strong: Vec<usize>,
    weak: Option<usize>,
}

impl TypeInfo {
    /// Describe the payload of the Rust type `T`, with no slots yet.
    ///
    /// # Panics
    ///
    /// Panics if `T` needs more than [`OBJECT_ALIGNMENT`] alignment.
    #[must_use]
    pub fn of<T: 'static>(name: &'static str) -> Self {
        assert!(
            align_of::<T>() <= OBJECT_ALIGNMENT,
            "type {name} needs {}-byte alignment; objects are only {OBJECT_ALIGNMENT}-byte aligned",
            align_of::<T>()
        );
        Self::raw(name, size_of::<T>())
    }

    /// Describe an untyped payload of `payload_size` bytes.
    #[must_use]
    pub const fn raw(name: &'static str, payload_size: usize) -> Self {
        Self {
            name,
            payload_size,
            strong: Vec::new(),
            weak: None,
        }
    }

    /// Add a strong reference slot at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is misaligned or does not fit in the payload.
    #[must_use]
    pub fn with_ref(mut self, offset: usize) -> Self {
        self.check_slot(offset);
        self.strong.push(offset);
        self
    }

    /// Mark the slot at `offset` as the weak reference of this type.
    ///
    /// # Panics
    ///
    /// Panics if a weak slot is already set, or if the slot is misaligned
    /// or does not fit in the payload.
    #[must_use]
    pub fn with_weak(mut self, offset: usize) -> Self {
        assert!(
            self.weak.is_none(),
            "type {} already has a weak slot",
            self.name
        );
        self.check_slot(offset);
        self.weak = Some(offset);
        self
    }

    fn check_slot(&self, offset: usize) {
        assert!(
            offset % align_of::<Option<ObjRef>>() == 0
                && offset + size_of::<Option<ObjRef>>() <= self.payload_size,
            "slot offset {offset} is invalid for type {} ({} payload bytes)",
            self.name,
            self.payload_size
        );
        assert!(
            !self.strong.contains(&offset) && self.weak != Some(offset),
            "slot offset {offset} registered twice for type {}",
            self.name
        );
    }

    /// Type name, for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Payload size in bytes.
    #[must_use]
    pub const fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// Total object size: header plus payload, aligned.
    #[must_use]
    pub const fn total_size(&self) -> usize {
        align_object_size(HEADER_SIZE + self.payload_size)
    }

    /// Offsets of the strong reference slots.
    #[must_use]
    pub fn strong_offsets(&self) -> &[usize] {
        &self.strong
    }

    /// Offset of the weak reference slot, if this is a weakref type.
    #[must_use]
    pub const fn weak_offset(&self) -> Option<usize> {
        self.weak
    }
}

/// A Rust type that can be stored as a GC-managed object.
///
/// Objects are copied byte for byte and freed without running destructors,
/// hence the `Copy` bound.
///
/// # Safety
///
/// [`describe`](Self::describe) **MUST** list every `Option<ObjRef>` field
/// that refers to a GC-managed object, either as strong or as weak slot.
/// A missing slot leaves a dangling reference after the next collection.
///
/// Prefer `#[derive(ObjectLayout)]` instead of a manual implementation.
pub unsafe trait ObjectLayout: Copy + 'static {
    /// Describe this type's layout.
    fn describe() -> TypeInfo;
}

/// All object types known to one collector.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    infos: Vec<TypeInfo>,
    by_type: HashMap<TypeId, TypeTag>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, or return its tag if it is already registered.
    pub fn register<T: ObjectLayout>(&mut self) -> TypeTag {
        if let Some(&tag) = self.by_type.get(&TypeId::of::<T>()) {
            return tag;
        }
        let tag = self.register_info(T::describe());
        self.by_type.insert(TypeId::of::<T>(), tag);
        tag
    }

    /// Register an untyped layout. Every call yields a new tag.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` types are registered.
    pub fn register_info(&mut self, info: TypeInfo) -> TypeTag {
        let index = u32::try_from(self.infos.len()).expect("too many registered types");
        self.infos.push(info);
        TypeTag::new(index)
    }

    /// Tag of a registered Rust type.
    #[must_use]
    pub fn tag_of<T: ObjectLayout>(&self) -> Option<TypeTag> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Layout for `tag`. An unknown tag is fatal: it can only come from a
    /// corrupted header or from another collector's registry.
    #[must_use]
    pub fn info(&self, tag: TypeTag) -> &TypeInfo {
        self.infos
            .get(tag.index())
            .unwrap_or_else(|| fatal_error(format_args!("unknown type tag {}", tag.index())))
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObjectLayout;

    #[derive(Clone, Copy, ObjectLayout)]
    #[repr(C)]
    struct Pair {
        value: u64,
        #[gc(strong)]
        left: Option<ObjRef>,
        #[gc(strong)]
        right: Option<ObjRef>,
    }

    #[derive(Clone, Copy, ObjectLayout)]
    #[repr(C)]
    struct WeakBox {
        #[gc(weak)]
        target: Option<ObjRef>,
    }

    #[test]
    fn test_derived_layout() {
        let info = Pair::describe();
        assert_eq!(info.name(), "Pair");
        assert_eq!(info.payload_size(), 24);
        assert_eq!(info.strong_offsets(), &[8, 16]);
        assert_eq!(info.weak_offset(), None);
        assert_eq!(info.total_size(), HEADER_SIZE + 32);

        let info = WeakBox::describe();
        assert!(info.strong_offsets().is_empty());
        assert_eq!(info.weak_offset(), Some(0));
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = TypeRegistry::new();
        let a = registry.register::<Pair>();
        let b = registry.register::<WeakBox>();
        assert_ne!(a, b);
        assert_eq!(registry.register::<Pair>(), a);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tag_of::<WeakBox>(), Some(b));
        assert_eq!(registry.info(a).name(), "Pair");
    }

    #[test]
    fn test_raw_types_get_fresh_tags() {
        let mut registry = TypeRegistry::new();
        let a = registry.register_info(TypeInfo::raw("blob", 100));
        let b = registry.register_info(TypeInfo::raw("blob", 100));
        assert_ne!(a, b);
        assert_eq!(registry.info(a).total_size(), align_object_size(HEADER_SIZE + 100));
    }

    #[test]
    #[should_panic(expected = "is invalid for type")]
    fn test_slot_outside_payload() {
        let _ = TypeInfo::raw("tiny", 8).with_ref(8);
    }

    #[test]
    #[should_panic(expected = "already has a weak slot")]
    fn test_second_weak_slot() {
        let _ = TypeInfo::raw("two", 16).with_weak(0).with_weak(8);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_slot() {
        let _ = TypeInfo::raw("dup", 16).with_ref(0).with_weak(0);
    }

    #[test]
    #[should_panic(expected = "stm-gc fatal: unknown type tag")]
    fn test_unknown_tag_is_fatal() {
        let registry = TypeRegistry::new();
        let _ = registry.info(TypeTag::new(7));
    }
}
