//! The string accumulator (spec §5, §GLOSSARY `accs`): a per-context
//! scratch buffer for transient string results (`STR$`, `CHR$`, `LEFT$`,
//! slicing, concatenation...). It is not part of the shared `MemorySpace`
//! address space — unlike heap strings it has no size-class bookkeeping,
//! since nothing ever frees a piece of it individually; [`Accumulator::clear`]
//! is the only way bytes leave it, and the executor calls that at a
//! statement boundary once nothing live still points into it.

use basic_core::StrRef;
use basic_memory::Addr;

#[derive(Default)]
pub struct Accumulator {
    buf: Vec<u8>,
}

impl Accumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return a `StrRef` pointing at them.
    pub fn store(&mut self, bytes: &[u8]) -> StrRef {
        let addr = Addr::new(self.buf.len() as u32);
        self.buf.extend_from_slice(bytes);
        StrRef::accumulator(addr, bytes.len() as u32)
    }

    /// Read back bytes previously returned by [`Self::store`]. Panics if
    /// `s` doesn't address a live span in this buffer — callers must only
    /// pass a `StrRef` with `owned == false`.
    #[must_use]
    pub fn read(&self, s: StrRef) -> &[u8] {
        let start = s.addr.as_usize();
        &self.buf[start..start + s.len()]
    }

    /// Discard everything accumulated so far. Called at statement
    /// boundaries once no live value still references the accumulator.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_read_round_trips() {
        let mut acc = Accumulator::new();
        let a = acc.store(b"hello");
        let b = acc.store(b"world");
        assert_eq!(acc.read(a), b"hello");
        assert_eq!(acc.read(b), b"world");
    }

    #[test]
    fn clear_resets_the_buffer() {
        let mut acc = Accumulator::new();
        acc.store(b"stale");
        acc.clear();
        let fresh = acc.store(b"fresh");
        assert_eq!(fresh.addr, Addr::new(0));
    }
}
