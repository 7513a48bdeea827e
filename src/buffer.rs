// Allocation strategies for codec buffers.
//
// The codec never owns memory past the end of a call: every buffer it needs
// is obtained from a caller-supplied `BufferAllocator`, and the final output
// is handed back as an owned `Vec`. Hosts with their own memory accounting
// (a database memory context, an arena with a budget) plug in here.

use std::mem;

use thiserror::Error;

/// An allocation request the strategy refused or could not satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("allocation of {requested} bytes failed: {reason}")]
pub struct AllocError {
    /// Size of the failed request in bytes.
    pub requested: usize,
    /// Human-readable cause.
    pub reason: String,
}

impl AllocError {
    pub(crate) fn new(requested: usize, reason: impl Into<String>) -> Self {
        Self {
            requested,
            reason: reason.into(),
        }
    }
}

fn byte_size<T>(len: usize) -> Result<usize, AllocError> {
    len.checked_mul(mem::size_of::<T>())
        .ok_or_else(|| AllocError::new(usize::MAX, "size overflows usize"))
}

/// Injected allocation strategy: fresh-allocate, and grow or shrink in place.
///
/// Buffers are returned zero-filled to their full length. Ownership of the
/// returned `Vec` passes to the caller.
pub trait BufferAllocator {
    /// Allocate a fresh zero-filled buffer of `len` elements.
    fn allocate<T: Copy + Default>(&self, len: usize) -> Result<Vec<T>, AllocError>;

    /// Grow (zero-filling the new tail) or shrink `buf` to `new_len` elements.
    ///
    /// Shrinking releases excess capacity.
    fn resize<T: Copy + Default>(&self, buf: Vec<T>, new_len: usize) -> Result<Vec<T>, AllocError>;
}

impl<A: BufferAllocator> BufferAllocator for &A {
    fn allocate<T: Copy + Default>(&self, len: usize) -> Result<Vec<T>, AllocError> {
        (**self).allocate(len)
    }

    fn resize<T: Copy + Default>(
        &self,
        buf: Vec<T>,
        new_len: usize,
    ) -> Result<Vec<T>, AllocError> {
        (**self).resize(buf, new_len)
    }
}

// ---------------------------------------------------------------------------
// Heap allocator
// ---------------------------------------------------------------------------

/// Global-heap allocator that reports failure instead of aborting.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    fn allocate<T: Copy + Default>(&self, len: usize) -> Result<Vec<T>, AllocError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|e| AllocError::new(byte_size::<T>(len).unwrap_or(usize::MAX), e.to_string()))?;
        buf.resize(len, T::default());
        Ok(buf)
    }

    fn resize<T: Copy + Default>(
        &self,
        mut buf: Vec<T>,
        new_len: usize,
    ) -> Result<Vec<T>, AllocError> {
        if new_len <= buf.len() {
            buf.truncate(new_len);
            buf.shrink_to_fit();
            return Ok(buf);
        }
        let extra = new_len - buf.len();
        buf.try_reserve_exact(extra).map_err(|e| {
            AllocError::new(byte_size::<T>(new_len).unwrap_or(usize::MAX), e.to_string())
        })?;
        buf.resize(new_len, T::default());
        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// Bounded allocator
// ---------------------------------------------------------------------------

/// Heap allocator that refuses any single buffer larger than `limit_bytes`.
#[derive(Debug, Clone, Copy)]
pub struct BoundedAllocator {
    limit_bytes: usize,
}

impl BoundedAllocator {
    pub fn new(limit_bytes: usize) -> Self {
        Self { limit_bytes }
    }

    /// Per-buffer byte budget.
    pub fn limit(&self) -> usize {
        self.limit_bytes
    }

    fn check<T>(&self, len: usize) -> Result<(), AllocError> {
        let bytes = byte_size::<T>(len)?;
        if bytes > self.limit_bytes {
            return Err(AllocError::new(
                bytes,
                format!("exceeds limit of {} bytes", self.limit_bytes),
            ));
        }
        Ok(())
    }
}

impl BufferAllocator for BoundedAllocator {
    fn allocate<T: Copy + Default>(&self, len: usize) -> Result<Vec<T>, AllocError> {
        self.check::<T>(len)?;
        HeapAllocator.allocate(len)
    }

    fn resize<T: Copy + Default>(
        &self,
        buf: Vec<T>,
        new_len: usize,
    ) -> Result<Vec<T>, AllocError> {
        self.check::<T>(new_len)?;
        HeapAllocator.resize(buf, new_len)
    }
}
