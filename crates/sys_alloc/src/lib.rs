//! Raw arena primitives.
//!
//! An arena is an anonymous, page-aligned memory mapping. It is created
//! zero-filled by the OS, released when its [`Mmap`] handle is dropped, and
//! can be bulk-cleared in place with [`Mmap::reset`]. Nothing here zeroes
//! memory implicitly: callers choose a [`ResetMode`] when they want it.

use std::io;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as os;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as os;

pub use os::page_size;

/// How [`Mmap::reset`] clears a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Overwrite the range with zero bytes.
    Zero,
    /// Hand the whole pages of the range back to the OS, which supplies
    /// zero-filled pages on the next touch. The unaligned head and tail of
    /// the range are zeroed by hand.
    Decommit,
}

/// A handle to an anonymous memory mapping.
///
/// The region is automatically unmapped when this handle is dropped.
pub struct Mmap {
    inner: os::MmapInner,
}

impl Mmap {
    /// Returns a pointer to the start of the memory mapping.
    pub fn ptr(&self) -> *mut u8 {
        self.inner.ptr()
    }

    /// Returns the length of the memory mapping in bytes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if `addr` lies inside the mapping.
    pub fn contains(&self, addr: usize) -> bool {
        let start = self.ptr() as usize;
        addr >= start && addr < start + self.len()
    }

    /// Clears `len` bytes starting `offset` bytes into the mapping.
    ///
    /// After a successful return the range reads as zero. On error the
    /// range content is unspecified; [`ResetMode::Zero`] never fails.
    ///
    /// # Panics
    ///
    /// Panics if the range is not inside the mapping.
    pub fn reset(&self, offset: usize, len: usize, mode: ResetMode) -> io::Result<()> {
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.len()),
            "reset range {offset}+{len} outside mapping of {} bytes",
            self.len()
        );
        if len == 0 {
            return Ok(());
        }
        // SAFETY: the range was checked against the mapping above.
        let start = unsafe { self.ptr().add(offset) };
        match mode {
            ResetMode::Zero => {
                // SAFETY: `start..start + len` is inside our writable mapping.
                unsafe { std::ptr::write_bytes(start, 0, len) };
                Ok(())
            }
            ResetMode::Decommit => {
                let page = page_size();
                let addr = start as usize;
                let first_page = addr.next_multiple_of(page);
                let last_page = (addr + len) & !(page - 1);
                if first_page >= last_page {
                    // No whole page inside the range.
                    // SAFETY: as above.
                    unsafe { std::ptr::write_bytes(start, 0, len) };
                    return Ok(());
                }
                // SAFETY: head and tail are sub-ranges of the checked range,
                // and the page-aligned middle lies inside the mapping.
                unsafe {
                    std::ptr::write_bytes(start, 0, first_page - addr);
                    std::ptr::write_bytes(last_page as *mut u8, 0, addr + len - last_page);
                    os::decommit(first_page as *mut u8, last_page - first_page)
                }
            }
        }
    }
}

unsafe impl Send for Mmap {}
unsafe impl Sync for Mmap {}

/// Configuration for creating a memory mapping.
#[derive(Debug, Clone)]
pub struct MmapOptions {
    len: usize,
    populate: bool,
    no_reserve: bool,
}

impl MmapOptions {
    /// Creates a new `MmapOptions` with default settings (length 0).
    /// You must set a length before mapping.
    pub fn new() -> Self {
        Self {
            len: 0,
            populate: false,
            no_reserve: false,
        }
    }

    /// Sets the length of the mapping in bytes.
    pub fn len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    /// Sets whether to pre-populate (prefault) the page tables.
    ///
    /// On Linux, this adds `MAP_POPULATE`.
    pub fn populate(mut self, populate: bool) -> Self {
        self.populate = populate;
        self
    }

    /// Sets whether to reserve swap space (on supported platforms).
    ///
    /// On Linux, this adds `MAP_NORESERVE`.
    pub fn no_reserve(mut self, no_reserve: bool) -> Self {
        self.no_reserve = no_reserve;
        self
    }

    /// Creates an anonymous, zero-filled memory map.
    ///
    /// # Safety
    ///
    /// The returned mapping is raw memory. Pointers derived from
    /// [`Mmap::ptr`] are only valid while the `Mmap` is alive.
    pub unsafe fn map_anon(&self) -> io::Result<Mmap> {
        if self.len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "length must be greater than 0",
            ));
        }

        let inner = unsafe { os::MmapInner::map_anon(self.len, self.populate, self.no_reserve)? };

        Ok(Mmap { inner })
    }
}

impl Default for MmapOptions {
    fn default() -> Self {
        Self::new()
    }
}
