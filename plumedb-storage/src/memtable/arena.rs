//! Bump-pointer arena backing all skip list nodes
//!
//! The arena owns one contiguous buffer, allocated up front, and hands out
//! regions by atomically advancing an offset. Individual allocations are
//! never freed; the whole buffer is released when the arena is dropped.
//! Every node in a skip list lives in exactly one arena, and the arena
//! must outlive the list and every handle derived from it.

use crossbeam::utils::CachePadded;
use log::trace;
use plumedb_core::{Error, Result};
use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Every region handed out is aligned to this, because node regions start
/// with atomic pointers.
const ALIGN: usize = std::mem::align_of::<usize>();

fn align_up(n: usize) -> usize {
    (n + ALIGN - 1) & !(ALIGN - 1)
}

/// Fixed-capacity allocator with an atomically advancing offset
///
/// Concurrent callers always receive disjoint regions: the offset is
/// claimed with a compare-and-swap before the region is returned, so two
/// threads can never own overlapping bytes.
///
/// # Thread Safety
///
/// All mutation goes through the atomic offset. The buffer bytes behind a
/// returned region belong exclusively to the caller that claimed them.
pub struct Arena {
    buf: NonNull<u8>,
    capacity: usize,
    offset: CachePadded<AtomicUsize>,
}

impl Arena {
    /// Creates an arena with the given capacity in bytes
    ///
    /// The buffer is zero-initialized so that freshly allocated node
    /// regions start with null forward pointers.
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` is zero or too large for a valid
    /// allocation layout.
    pub fn new(capacity: usize) -> Result<Self> {
        let layout = Layout::from_size_align(capacity, ALIGN)
            .map_err(|e| Error::InvalidConfig(format!("arena capacity {capacity}: {e}")))?;
        if layout.size() == 0 {
            return Err(Error::InvalidConfig(
                "arena capacity must be nonzero".to_string(),
            ));
        }

        // SAFETY: layout has nonzero size and valid alignment; the pointer
        // is checked before use and freed with the same layout in Drop.
        let ptr = unsafe { alloc_zeroed(layout) };
        let buf = NonNull::new(ptr).unwrap_or_else(|| handle_alloc_error(layout));

        Ok(Self {
            buf,
            capacity,
            offset: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    /// Claims a contiguous region of at least `size` bytes
    ///
    /// The size is rounded up so that the next allocation stays
    /// pointer-aligned. The returned region is owned by the arena but
    /// reserved exclusively for the caller until the arena is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArenaExhausted`] when the region does not fit in
    /// the remaining capacity. The arena never recovers from exhaustion.
    pub(crate) fn alloc(&self, size: usize) -> Result<NonNull<u8>> {
        let size = align_up(size);
        let mut current = self.offset.load(Ordering::Relaxed);

        loop {
            let end = match current.checked_add(size) {
                Some(end) if end <= self.capacity => end,
                _ => {
                    trace!(
                        "arena exhausted: requested {} bytes, {} of {} remaining",
                        size,
                        self.capacity - current,
                        self.capacity
                    );
                    return Err(Error::ArenaExhausted {
                        requested: size,
                        remaining: self.capacity - current,
                        capacity: self.capacity,
                    });
                }
            };

            match self.offset.compare_exchange_weak(
                current,
                end,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                // SAFETY: `current` is within the buffer, `current + size`
                // does not exceed capacity, and a successful CAS means no
                // other thread can claim the same range.
                Ok(_) => return Ok(unsafe { NonNull::new_unchecked(self.buf.as_ptr().add(current)) }),
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns the number of bytes handed out so far
    pub fn memory_usage(&self) -> usize {
        self.offset.load(Ordering::Relaxed)
    }

    /// Returns the total capacity of the arena in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: the buffer was allocated in `new` with this exact layout
        // and is freed exactly once.
        unsafe {
            dealloc(
                self.buf.as_ptr(),
                Layout::from_size_align_unchecked(self.capacity, ALIGN),
            );
        }
    }
}

// SAFETY: the buffer pointer is owned by the arena and all offset updates
// are atomic; regions handed to other threads are disjoint by construction.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}
