//! Buffer resources.

use crate::memory::DeviceMemory;

/// Binds "the rest of the buffer" in a buffer region.
pub const WHOLE_SIZE: u64 = u64::MAX;

/// A linear buffer resource.
///
/// Created unbound; [`Buffer::bind_memory`] attaches the backing storage.
#[derive(Debug)]
pub struct Buffer {
    size: u64,
    memory: Option<(DeviceMemory, u64)>,
}

impl Buffer {
    pub fn new(size: u64) -> Self {
        Self { size, memory: None }
    }

    pub fn bind_memory(&mut self, memory: &DeviceMemory, offset: u64) {
        assert!(
            offset + self.size <= memory.size(),
            "buffer does not fit the bound memory region",
        );
        self.memory = Some((memory.clone(), offset));
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    fn bound(&self) -> (&DeviceMemory, u64) {
        let (memory, offset) = self
            .memory
            .as_ref()
            .expect("buffer is not bound to any memory");
        (memory, *offset)
    }

    /// Bytes at `[offset, offset + len)` within the buffer.
    ///
    /// Panics when the range exceeds the buffer size.
    pub fn data(&self, offset: u64, len: u64) -> &[u8] {
        assert!(
            offset + len <= self.size,
            "buffer access out of range: {}..{} (size {})",
            offset,
            offset + len,
            self.size,
        );
        let (memory, base) = self.bound();
        memory.slice(base + offset, len)
    }

    pub fn data_mut(&self, offset: u64, len: u64) -> &mut [u8] {
        assert!(
            offset + len <= self.size,
            "buffer access out of range: {}..{} (size {})",
            offset,
            offset + len,
            self.size,
        );
        let (memory, base) = self.bound();
        memory.slice_mut(base + offset, len)
    }
}
