//! Per-thread bump-pointer nursery.
//!
//! The nursery is one anonymous mapping owned by its thread. Allocation bumps
//! an offset; nothing is ever freed individually. After each local
//! collection every live object has been copied out and the used prefix is
//! cleared in bulk.
//!
//! Outside a transaction the nursery is DISABLED (`free == None`) and any
//! allocation attempt is fatal. The bytes used by the last transaction are
//! remembered in `pending_clear` and only cleared when the next transaction
//! starts.

use std::ptr::NonNull;

use sys_alloc::{Mmap, MmapOptions, ResetMode};

use crate::error::{fatal_error, gc_assert, GcError};
use crate::header::{ObjRef, OBJECT_ALIGNMENT};

/// A thread's young-object arena.
pub struct Nursery {
    arena: Mmap,
    size: usize,
    /// Offset of the next allocation, or `None` while allocation is disabled.
    free: Option<usize>,
    /// Bytes left dirty by the last transaction.
    pending_clear: usize,
    decommit_threshold: usize,
}

impl Nursery {
    /// Map a new, disabled nursery of `size` bytes.
    pub(crate) fn new(size: usize, decommit_threshold: usize) -> Result<Self, GcError> {
        debug_assert!(size % OBJECT_ALIGNMENT == 0);
        // SAFETY: the mapping is only accessed through this struct, which
        // owns it for its whole lifetime.
        let arena = unsafe { MmapOptions::new().len(size).map_anon() }
            .map_err(|source| GcError::NurseryAllocation { size, source })?;
        Ok(Self {
            arena,
            size,
            free: None,
            pending_clear: 0,
            decommit_threshold,
        })
    }

    /// Capacity in bytes.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.size
    }

    /// `true` while a transaction is running.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.free.is_some()
    }

    /// Bytes allocated since the last reset; 0 while disabled.
    #[must_use]
    pub fn used(&self) -> usize {
        self.free.unwrap_or(0)
    }

    /// `true` if nothing has been allocated since the last reset.
    ///
    /// Asking while disabled is fatal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self.free {
            Some(free) => free == 0,
            None => fatal_error("nursery_is_empty: gc not running"),
        }
    }

    /// `true` if `obj` lives in this nursery. Always `false` while disabled.
    #[must_use]
    pub fn contains(&self, obj: ObjRef) -> bool {
        self.is_enabled() && self.arena.contains(obj.addr())
    }

    /// Bump-allocate `size` bytes, or `None` if they do not fit.
    ///
    /// `size` must already be aligned. The returned memory is zeroed.
    pub(crate) fn try_bump(&mut self, size: usize) -> Option<NonNull<u8>> {
        let Some(free) = self.free else {
            fatal_error("malloc outside a transaction");
        };
        if self.size - free < size {
            return None;
        }
        self.free = Some(free + size);
        // SAFETY: `free + size <= self.size`, so the address is inside the
        // mapping, and a mapping is never null.
        Some(unsafe { NonNull::new_unchecked(self.arena.ptr().add(free)) })
    }

    /// Clear the used prefix and rewind. Called after every collection.
    pub(crate) fn reset(&mut self) {
        let Some(used) = self.free else {
            fatal_error("nursery reset while gc not running");
        };
        self.clear(used);
        self.free = Some(0);
    }

    /// Forbid allocation, remembering what is left to clear.
    pub(crate) fn disable(&mut self) {
        let Some(used) = self.free.take() else {
            fatal_error("disable_mallocs: already disabled");
        };
        self.pending_clear = used;
    }

    /// Allow allocation again, clearing whatever the previous transaction
    /// left behind (the live prefix if it was never stopped).
    pub(crate) fn enable(&mut self) {
        let dirty = self.free.unwrap_or(self.pending_clear);
        self.pending_clear = 0;
        self.clear(dirty);
        self.free = Some(0);
    }

    fn clear(&self, len: usize) {
        gc_assert!(len <= self.size, "nursery clear of {len} bytes exceeds capacity");
        if len == 0 {
            return;
        }
        if len >= self.decommit_threshold && self.arena.reset(0, len, ResetMode::Decommit).is_ok() {
            return;
        }
        if let Err(err) = self.arena.reset(0, len, ResetMode::Zero) {
            fatal_error(format_args!("cannot clear the nursery: {err}"));
        }
    }
}

impl std::fmt::Debug for Nursery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nursery")
            .field("start", &self.arena.ptr())
            .field("size", &self.size)
            .field("free", &self.free)
            .field("pending_clear", &self.pending_clear)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: usize = 64 * 1024;

    fn nursery() -> Nursery {
        let mut nursery = Nursery::new(SIZE, usize::MAX).unwrap();
        nursery.enable();
        nursery
    }

    #[test]
    fn test_bump_allocation() {
        let mut nursery = nursery();
        let a = nursery.try_bump(32).unwrap();
        let b = nursery.try_bump(64).unwrap();
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 32);
        assert_eq!(a.as_ptr() as usize % OBJECT_ALIGNMENT, 0);
        assert_eq!(nursery.used(), 96);
        assert!(!nursery.is_empty());
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let mut nursery = nursery();
        assert!(nursery.try_bump(SIZE - 16).is_some());
        assert!(nursery.try_bump(32).is_none());
        assert!(nursery.try_bump(16).is_some());
        assert!(nursery.try_bump(16).is_none());
    }

    #[test]
    fn test_reset_zeroes_used_prefix() {
        let mut nursery = nursery();
        let ptr = nursery.try_bump(48).unwrap();
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0xAB, 48) };
        nursery.reset();
        assert!(nursery.is_empty());
        let again = nursery.try_bump(48).unwrap();
        assert_eq!(again, ptr);
        let bytes = unsafe { std::slice::from_raw_parts(again.as_ptr(), 48) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_disable_defers_clear_to_enable() {
        let mut nursery = Nursery::new(SIZE, 0).unwrap();
        nursery.enable();
        let ptr = nursery.try_bump(SIZE / 2).unwrap();
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0xCD, SIZE / 2) };

        nursery.disable();
        assert!(!nursery.is_enabled());
        assert_eq!(nursery.used(), 0);
        assert_eq!(nursery.pending_clear, SIZE / 2);

        nursery.enable();
        assert_eq!(nursery.pending_clear, 0);
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), SIZE / 2) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_contains_only_while_enabled() {
        let mut nursery = nursery();
        let ptr = nursery.try_bump(32).unwrap();
        let obj = unsafe { ObjRef::from_raw(ptr) };
        assert!(nursery.contains(obj));
        nursery.disable();
        assert!(!nursery.contains(obj));
    }

    #[test]
    #[should_panic(expected = "stm-gc fatal: malloc outside a transaction")]
    fn test_bump_while_disabled_is_fatal() {
        let mut nursery = Nursery::new(SIZE, usize::MAX).unwrap();
        let _ = nursery.try_bump(16);
    }

    #[test]
    #[should_panic(expected = "already disabled")]
    fn test_double_disable_is_fatal() {
        let mut nursery = nursery();
        nursery.disable();
        nursery.disable();
    }
}
