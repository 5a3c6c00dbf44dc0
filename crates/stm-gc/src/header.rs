//! Object header: flag bits and the phase-dependent link word.
//!
//! Every object managed by this crate starts with an [`ObjectHeader`]:
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬──────────────────────┐
//! │ flags (u32)  │ tag (u32)    │ size (usize) │ link (tag + address) │
//! └──────────────┴──────────────┴──────────────┴──────────────────────┘
//!                                               payload follows at HEADER_SIZE
//! ```
//!
//! The link word means different things depending on where the object is
//! in its lifecycle. Instead of reinterpreting one raw address, [`Link`]
//! names every meaning as its own variant.

use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::ptr::NonNull;

use crate::error::fatal_error;
use crate::layout::TypeTag;

/// Alignment of every object and of every object size.
pub const OBJECT_ALIGNMENT: usize = 16;

/// Size of [`ObjectHeader`]; the payload starts this many bytes in.
pub const HEADER_SIZE: usize = std::mem::size_of::<ObjectHeader>();

const _: () = assert!(HEADER_SIZE % OBJECT_ALIGNMENT == 0);

/// Round an object size up to [`OBJECT_ALIGNMENT`].
#[must_use]
pub const fn align_object_size(size: usize) -> usize {
    (size + OBJECT_ALIGNMENT - 1) & !(OBJECT_ALIGNMENT - 1)
}

// ============================================================================
// GcFlags
// ============================================================================

/// The collector's header flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct GcFlags(u32);

impl GcFlags {
    /// No flag set: a young or old LOCAL object between collections.
    pub const EMPTY: Self = Self(0);
    /// Shared between threads; never moved or freed by a local collection.
    pub const GLOBAL: Self = Self(1 << 0);
    /// Reached by the collection in progress (or pinned by a root list).
    pub const VISITED: Self = Self(1 << 1);
    /// Has both a LOCAL and a GLOBAL copy known to the sync layer.
    pub const WAS_COPIED: Self = Self(1 << 2);
    /// Young object whose old location is pre-allocated.
    pub const HAS_SHADOW: Self = Self(1 << 3);

    const NAMES: [(Self, &'static str); 4] = [
        (Self::GLOBAL, "GLOBAL"),
        (Self::VISITED, "VISITED"),
        (Self::WAS_COPIED, "WAS_COPIED"),
        (Self::HAS_SHADOW, "HAS_SHADOW"),
    ];

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// `true` if every flag of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// `true` if any flag of `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// `true` if no flag is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `self` with the flags of `other` added.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// `self` with the flags of `other` removed.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for GcFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitAnd for GcFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for GcFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("EMPTY");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Link
// ============================================================================

/// The header's link word, one variant per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Link {
    /// Nothing stored. Fresh nursery objects and GLOBAL objects.
    Empty = 0,
    /// Young object already copied out: address of the old copy.
    Forward(ObjRef),
    /// Young object with a pre-allocated old slot.
    Shadow(ObjRef),
    /// Member of a shared-area generation: next object in its sweep list.
    Chain(Option<ObjRef>),
    /// LOCAL copy of a GLOBAL object: the GLOBAL original.
    GlobalCopy(ObjRef),
    /// Main thread only: next entry of the demoted list.
    Demoted(Option<ObjRef>),
}

// ============================================================================
// ObjectHeader / ObjRef
// ============================================================================

/// Header at the start of every object.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ObjectHeader {
    pub(crate) flags: GcFlags,
    pub(crate) tag: TypeTag,
    /// Total size in bytes, header included, aligned.
    pub(crate) size: usize,
    pub(crate) link: Link,
}

impl ObjectHeader {
    pub(crate) const fn new(tag: TypeTag, size: usize) -> Self {
        Self {
            flags: GcFlags::EMPTY,
            tag,
            size,
            link: Link::Empty,
        }
    }
}

/// Address of an object header.
///
/// An `ObjRef` is a plain address: copying it does not keep the object
/// alive, and a local collection may move or free the object it names.
/// Only references stored in rooted slots or in traced fields are updated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjRef(NonNull<ObjectHeader>);

// SAFETY: an `ObjRef` is an address. Which thread may dereference it is
// decided by the LOCAL/GLOBAL discipline, not by the type system.
unsafe impl Send for ObjRef {}
unsafe impl Sync for ObjRef {}

impl ObjRef {
    /// Write a fresh header at `ptr` and return the object.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes of `size` bytes, aligned to
    /// [`OBJECT_ALIGNMENT`], with `size >= HEADER_SIZE`.
    pub(crate) unsafe fn init(ptr: NonNull<u8>, tag: TypeTag, size: usize) -> Self {
        let header = ptr.cast::<ObjectHeader>();
        // SAFETY: guaranteed by the caller.
        unsafe { header.as_ptr().write(ObjectHeader::new(tag, size)) };
        Self(header)
    }

    /// Reinterpret `ptr` as an object whose header is already written.
    ///
    /// # Safety
    ///
    /// `ptr` must point at an initialized [`ObjectHeader`].
    pub(crate) const unsafe fn from_raw(ptr: NonNull<u8>) -> Self {
        Self(ptr.cast::<ObjectHeader>())
    }

    /// Numeric address of the header.
    #[must_use]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Raw pointer to the first header byte.
    #[must_use]
    pub const fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr().cast::<u8>()
    }

    fn header(self) -> *mut ObjectHeader {
        self.0.as_ptr()
    }

    /// Current flags.
    #[must_use]
    pub fn flags(self) -> GcFlags {
        // SAFETY: an `ObjRef` handed out by this crate names a live header.
        unsafe { (*self.header()).flags }
    }

    pub(crate) fn set_flags(self, flags: GcFlags) {
        // SAFETY: see `flags`.
        unsafe { (*self.header()).flags = flags };
    }

    pub(crate) fn insert_flags(self, flags: GcFlags) {
        self.set_flags(self.flags() | flags);
    }

    pub(crate) fn remove_flags(self, flags: GcFlags) {
        self.set_flags(self.flags().without(flags));
    }

    /// `true` if the GLOBAL flag is set.
    #[must_use]
    pub fn is_global(self) -> bool {
        self.flags().contains(GcFlags::GLOBAL)
    }

    /// Type tag recorded at allocation.
    #[must_use]
    pub fn tag(self) -> TypeTag {
        // SAFETY: see `flags`.
        unsafe { (*self.header()).tag }
    }

    /// Total object size, header included.
    #[must_use]
    pub fn size(self) -> usize {
        // SAFETY: see `flags`.
        unsafe { (*self.header()).size }
    }

    /// Current link word.
    #[must_use]
    pub fn link(self) -> Link {
        // SAFETY: see `flags`.
        unsafe { (*self.header()).link }
    }

    pub(crate) fn set_link(self, link: Link) {
        // SAFETY: see `flags`.
        unsafe { (*self.header()).link = link };
    }

    /// Address where the payload begins.
    #[must_use]
    pub fn payload(self) -> NonNull<u8> {
        // SAFETY: every object is at least HEADER_SIZE bytes long.
        unsafe { NonNull::new_unchecked(self.as_ptr().add(HEADER_SIZE)) }
    }

    /// Pointer to the reference slot `offset` bytes into the payload.
    ///
    /// # Safety
    ///
    /// `offset` must come from this object's [`TypeInfo`](crate::TypeInfo).
    pub(crate) unsafe fn slot(self, offset: usize) -> *mut Option<Self> {
        // SAFETY: the caller guarantees the slot lies inside the payload.
        unsafe { self.payload().as_ptr().add(offset).cast::<Option<Self>>() }
    }

    /// Copy the whole object, header included, over `dst`.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for `self.size()` bytes and must not overlap.
    pub(crate) unsafe fn copy_to(self, dst: NonNull<u8>) -> Self {
        // SAFETY: guaranteed by the caller.
        unsafe {
            std::ptr::copy_nonoverlapping(self.as_ptr(), dst.as_ptr(), self.size());
            Self::from_raw(dst)
        }
    }

    /// Extract the target a surviving, moved object now lives at.
    pub(crate) fn moved_to(self) -> Self {
        match self.link() {
            Link::Forward(target) | Link::GlobalCopy(target) => target,
            other => fatal_error(format_args!(
                "{:?} is classified as moved but its link is {:?}",
                self, other
            )),
        }
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({:#x})", self.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        assert_eq!(HEADER_SIZE % OBJECT_ALIGNMENT, 0);
        assert_eq!(std::mem::size_of::<Option<ObjRef>>(), std::mem::size_of::<usize>());
        assert_eq!(align_object_size(1), 16);
        assert_eq!(align_object_size(16), 16);
        assert_eq!(align_object_size(33), 48);
    }

    #[test]
    fn test_flag_set_operations() {
        let flags = GcFlags::WAS_COPIED | GcFlags::VISITED;
        assert!(flags.contains(GcFlags::VISITED));
        assert!(!flags.contains(GcFlags::GLOBAL | GcFlags::VISITED));
        assert!(flags.intersects(GcFlags::GLOBAL | GcFlags::VISITED));
        assert_eq!(flags.without(GcFlags::VISITED), GcFlags::WAS_COPIED);
        assert_eq!(flags & GcFlags::VISITED, GcFlags::VISITED);
        assert!(GcFlags::default().is_empty());
    }

    #[test]
    fn test_flag_debug() {
        assert_eq!(format!("{:?}", GcFlags::EMPTY), "EMPTY");
        assert_eq!(
            format!("{:?}", GcFlags::GLOBAL | GcFlags::HAS_SHADOW),
            "GLOBAL | HAS_SHADOW"
        );
    }

    #[test]
    fn test_header_access() {
        #[repr(C, align(16))]
        struct Buf([u8; 64]);

        let mut buf = Buf([0; 64]);
        let ptr = NonNull::new(buf.0.as_mut_ptr()).unwrap();
        let obj = unsafe { ObjRef::init(ptr, TypeTag::new(3), 64) };

        assert_eq!(obj.flags(), GcFlags::EMPTY);
        assert_eq!(obj.tag(), TypeTag::new(3));
        assert_eq!(obj.size(), 64);
        assert_eq!(obj.link(), Link::Empty);
        assert_eq!(obj.payload().as_ptr() as usize, obj.addr() + HEADER_SIZE);

        obj.insert_flags(GcFlags::VISITED | GcFlags::WAS_COPIED);
        obj.remove_flags(GcFlags::WAS_COPIED);
        assert_eq!(obj.flags(), GcFlags::VISITED);

        obj.set_link(Link::Forward(obj));
        assert_eq!(obj.moved_to(), obj);
    }

    #[test]
    #[should_panic(expected = "classified as moved")]
    fn test_moved_to_requires_forwarding_link() {
        #[repr(C, align(16))]
        struct Buf([u8; 32]);

        let mut buf = Buf([0; 32]);
        let ptr = NonNull::new(buf.0.as_mut_ptr()).unwrap();
        let obj = unsafe { ObjRef::init(ptr, TypeTag::new(0), 32) };
        obj.set_link(Link::Chain(None));
        let _ = obj.moved_to();
    }
}
