use std::cell::UnsafeCell;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("out of host memory")]
    OutOfHostMemory,
}

/// A shared backing allocation that buffers and images bind into.
///
/// Clones share the same block. Resources bound to overlapping regions of
/// the same allocation are not checked against each other; conflicting
/// access must be externally synchronized by the caller.
#[derive(Clone)]
pub struct DeviceMemory {
    block: Arc<MemoryBlock>,
}

struct MemoryBlock {
    data: UnsafeCell<Box<[u8]>>,
    size: u64,
}

// All mutation goes through `slice_mut`, whose exclusivity contract is
// documented there. The block itself carries no other state.
unsafe impl Send for MemoryBlock {}
unsafe impl Sync for MemoryBlock {}

impl DeviceMemory {
    pub fn alloc(size: u64) -> Result<Self, MemoryError> {
        let mut data = Vec::new();
        if data.try_reserve_exact(size as usize).is_err() {
            return Err(MemoryError::OutOfHostMemory);
        }
        data.resize(size as usize, 0);

        Ok(Self {
            block: Arc::new(MemoryBlock {
                data: UnsafeCell::new(data.into_boxed_slice()),
                size,
            }),
        })
    }

    pub fn size(&self) -> u64 {
        self.block.size
    }

    /// Returns the bytes at `[offset, offset + len)`.
    ///
    /// Panics when the range lies outside the allocation.
    pub(crate) fn slice(&self, offset: u64, len: u64) -> &[u8] {
        assert!(
            offset + len <= self.block.size,
            "memory access out of range: {}..{} (size {})",
            offset,
            offset + len,
            self.block.size,
        );

        // SAFETY: The range was checked above. Callers uphold the
        // external-synchronization contract of the allocation.
        unsafe {
            let data = &*self.block.data.get();
            &data[offset as usize..(offset + len) as usize]
        }
    }

    /// Returns the bytes at `[offset, offset + len)` for writing.
    ///
    /// The caller must not hold another slice overlapping this range;
    /// command replay is sequential and takes at most one writable region
    /// per resource at a time, which upholds this.
    #[allow(clippy::mut_from_ref)]
    pub(crate) fn slice_mut(&self, offset: u64, len: u64) -> &mut [u8] {
        assert!(
            offset + len <= self.block.size,
            "memory access out of range: {}..{} (size {})",
            offset,
            offset + len,
            self.block.size,
        );

        // SAFETY: See above.
        unsafe {
            let data = &mut *self.block.data.get();
            &mut data[offset as usize..(offset + len) as usize]
        }
    }
}

impl Debug for DeviceMemory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceMemory")
            .field("size", &self.block.size)
            .finish_non_exhaustive()
    }
}
