use crate::{Addr, MemorySpace};

/// The interpreter's fixed-size user-RAM buffer.
///
/// Program, heap and control stack all live in one `Vec<u8>`; the bounds
/// themselves (`PAGE`, `LOMEM`, `HIMEM`, ...) are tracked by the higher
/// layers (`basic-program`, `basic-heap`, `basic-exec`), not by `UserRam`
/// itself, which only knows how to read and write bytes at an offset.
pub struct UserRam {
    bytes: Vec<u8>,
}

impl UserRam {
    /// Allocate a zero-filled region of `size` bytes.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0u8; size],
        }
    }

    /// Grow the buffer in place to `new_size`, zero-filling the new tail.
    ///
    /// Mirrors the host service `oshwm` (§6.1): on a hosted build we can
    /// always satisfy a growth request up to the process's available
    /// memory, so this never fails; `basic-host::Host::oshwm` is the seam a
    /// future non-growable host would hook into.
    pub fn grow_to(&mut self, new_size: usize) {
        if new_size > self.bytes.len() {
            self.bytes.resize(new_size, 0);
        }
    }

    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.bytes
    }
}

impl MemorySpace for UserRam {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn slice(&self, addr: Addr, len: usize) -> &[u8] {
        let start = addr.as_usize();
        &self.bytes[start..start + len]
    }

    fn slice_mut(&mut self, addr: Addr, len: usize) -> &mut [u8] {
        let start = addr.as_usize();
        &mut self.bytes[start..start + len]
    }
}
