//! Heap manager for reallocatable BASIC strings (spec §4.B).
//!
//! A bump allocator (`pfree` watermark) fronted by 33 size-class free lists
//! (class `k` holds blocks with payload capacity `2^k - 1`, invariant 4).
//! `allocate` is the single entry point: it releases whatever the caller's
//! old descriptor owned and hands back a block sized to exactly fit the new
//! length, reusing a same-class block in place, swapping with a free block
//! of the right class, growing the most-recently-allocated block if it's
//! still at the top of the heap, or falling back to a fresh bump
//! allocation — in that order, matching the algorithm in the spec.

use basic_core::{BasicError, ErrorCode};
use basic_memory::{Addr, MemorySpace};

/// Bytes reserved before every block for the free-list intrusive pointer.
/// Always present (even on allocated blocks) so even class-0 (0-byte
/// payload) blocks can be threaded onto a free list.
const HEADER_SIZE: u32 = 4;

/// Number of size classes (0..=32), per spec.
pub const NUM_CLASSES: usize = 33;

/// The heap's allocator state: the bump watermark and the 33 free-list
/// heads. The byte storage itself lives in the caller-supplied
/// [`MemorySpace`] (the same `UserRam` the program and control stack share).
pub struct Heap {
    /// Fixed base of the heap region (`LOMEM`, just above the program and
    /// static/fast variable slots).
    lomem: Addr,
    /// Current allocation watermark; grows upward as the heap fills.
    pfree: Addr,
    free_lists: [Addr; NUM_CLASSES],
}

impl Heap {
    #[must_use]
    pub const fn new(lomem: Addr) -> Self {
        Self {
            lomem,
            pfree: lomem,
            free_lists: [Addr::NULL; NUM_CLASSES],
        }
    }

    #[must_use]
    pub const fn lomem(&self) -> Addr {
        self.lomem
    }

    /// Current watermark (`pfree`).
    #[must_use]
    pub const fn pfree(&self) -> Addr {
        self.pfree
    }

    /// Reset to an empty heap at a (possibly new) `LOMEM`, as `CLEAR`/`RUN`
    /// do (spec §3 Lifecycle).
    pub fn reset(&mut self, lomem: Addr) {
        self.lomem = lomem;
        self.pfree = lomem;
        self.free_lists = [Addr::NULL; NUM_CLASSES];
    }

    /// Smallest size class whose payload capacity (`2^k - 1`) holds `len`
    /// bytes.
    #[must_use]
    pub fn class_of(len: usize) -> u8 {
        let mut k: u32 = 0;
        while ((1u64 << k) - 1) < len as u64 {
            k += 1;
        }
        k as u8
    }

    /// Payload capacity of size class `k`.
    #[must_use]
    pub const fn capacity(class: u8) -> usize {
        ((1u64 << class) - 1) as usize
    }

    const fn block_size(class: u8) -> u32 {
        HEADER_SIZE + Self::capacity(class) as u32
    }

    fn read_next(mem: &impl MemorySpace, block: Addr) -> Addr {
        Addr::new(mem.read_u32(block))
    }

    fn write_next(mem: &mut impl MemorySpace, block: Addr, next: Addr) {
        mem.write_u32(block, next.as_u32());
    }

    fn push_free(&mut self, class: u8, block: Addr, mem: &mut impl MemorySpace) {
        Self::write_next(mem, block, self.free_lists[class as usize]);
        self.free_lists[class as usize] = block;
        tracing::trace!(class, ?block, "heap: pushed block to free list");
    }

    fn pop_free(&mut self, class: u8, mem: &impl MemorySpace) -> Option<Addr> {
        let head = self.free_lists[class as usize];
        if head.is_null() {
            return None;
        }
        self.free_lists[class as usize] = Self::read_next(mem, head);
        tracing::trace!(class, block = ?head, "heap: popped block from free list");
        Some(head)
    }

    fn ensure_room(
        &self,
        block: Addr,
        size: u32,
        stack_top: Addr,
        stack_needed: usize,
    ) -> Result<(), BasicError> {
        let end = block.add(size);
        let limit = stack_top.sub(stack_needed as u32);
        if end.diff(limit) > 0 {
            Err(BasicError::new(ErrorCode::NO_ROOM))
        } else {
            Ok(())
        }
    }

    /// Allocate (or reallocate) a string buffer.
    ///
    /// `old` is `Some((payload_addr, old_len))` when replacing an existing
    /// owned string (the spec's `desc`); `None` for a fresh allocation.
    /// `stack_top`/`stack_needed` bound how far the heap may grow before it
    /// would collide with the control stack (spec step 5).
    ///
    /// Returns the address of a writable, exactly-`new_len`-byte-capable
    /// payload region (its *capacity* may be larger, up to the size
    /// class's, but callers only ever read/write `new_len` bytes of it).
    pub fn allocate(
        &mut self,
        mem: &mut impl MemorySpace,
        old: Option<(Addr, usize)>,
        new_len: usize,
        stack_top: Addr,
        stack_needed: usize,
    ) -> Result<Addr, BasicError> {
        let new_class = Self::class_of(new_len);

        if let Some((old_addr, old_len)) = old {
            let old_class = Self::class_of(old_len);
            let old_block = old_addr.sub(HEADER_SIZE);

            if old_class == new_class {
                return Ok(old_addr);
            }

            if let Some(new_block) = self.pop_free(new_class, mem) {
                self.push_free(old_class, old_block, mem);
                return Ok(new_block.add(HEADER_SIZE));
            }

            if old_block.add(Self::block_size(old_class)) == self.pfree {
                let new_size = Self::block_size(new_class);
                self.ensure_room(old_block, new_size, stack_top, stack_needed)?;
                self.pfree = old_block.add(new_size);
                return Ok(old_addr);
            }

            self.push_free(old_class, old_block, mem);
        }

        if let Some(new_block) = self.pop_free(new_class, mem) {
            return Ok(new_block.add(HEADER_SIZE));
        }

        let new_size = Self::block_size(new_class);
        let block = self.pfree;
        self.ensure_room(block, new_size, stack_top, stack_needed)?;
        self.pfree = block.add(new_size);
        Ok(block.add(HEADER_SIZE))
    }

    /// Release an owned string back to its size class's free list.
    pub fn free(&mut self, mem: &mut impl MemorySpace, addr: Addr, len: usize) {
        let class = Self::class_of(len);
        self.push_free(class, addr.sub(HEADER_SIZE), mem);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basic_memory::UserRam;

    fn ram(size: usize) -> UserRam {
        UserRam::new(size)
    }

    #[test]
    fn class_capacities_follow_invariant_4() {
        for k in 0..8u8 {
            assert_eq!(Heap::capacity(k), (1usize << k) - 1);
        }
    }

    #[test]
    fn fresh_allocation_bumps_watermark() {
        let mut mem = ram(1024);
        let mut heap = Heap::new(Addr::new(0));
        let stack_top = Addr::new(1024);
        let a = heap.allocate(&mut mem, None, 5, stack_top, 0).unwrap();
        assert_eq!(a, Addr::new(4)); // past the 4-byte header
        assert!(heap.pfree() > Addr::new(0));
    }

    #[test]
    fn same_class_reuses_block_in_place() {
        let mut mem = ram(1024);
        let mut heap = Heap::new(Addr::new(0));
        let stack_top = Addr::new(1024);
        let a = heap.allocate(&mut mem, None, 3, stack_top, 0).unwrap();
        let watermark_before = heap.pfree();
        let b = heap.allocate(&mut mem, Some((a, 3)), 5, stack_top, 0).unwrap();
        assert_eq!(a, b, "3 and 5 both fit class 3 (capacity 7)");
        assert_eq!(heap.pfree(), watermark_before, "no new space consumed");
    }

    #[test]
    fn growing_the_top_block_extends_in_place() {
        let mut mem = ram(1024);
        let mut heap = Heap::new(Addr::new(0));
        let stack_top = Addr::new(1024);
        let a = heap.allocate(&mut mem, None, 1, stack_top, 0).unwrap(); // class 1, cap 1
        let b = heap.allocate(&mut mem, Some((a, 1)), 10, stack_top, 0).unwrap(); // class 4, cap 15
        assert_eq!(a, b, "top-of-heap block grows in place without moving");
    }

    #[test]
    fn freed_block_is_reused_by_next_same_class_allocation() {
        let mut mem = ram(1024);
        let mut heap = Heap::new(Addr::new(0));
        let stack_top = Addr::new(1024);
        let a = heap.allocate(&mut mem, None, 3, stack_top, 0).unwrap();
        // Allocate something else on top so `a`'s block is no longer at the watermark.
        let _b = heap.allocate(&mut mem, None, 3, stack_top, 0).unwrap();
        heap.free(&mut mem, a, 3);
        let watermark_before = heap.pfree();
        let c = heap.allocate(&mut mem, None, 3, stack_top, 0).unwrap();
        assert_eq!(a, c, "freed block reused instead of bumping pfree");
        assert_eq!(heap.pfree(), watermark_before);
    }

    #[test]
    fn running_into_the_stack_fails_with_no_room() {
        let mut mem = ram(64);
        let mut heap = Heap::new(Addr::new(0));
        let stack_top = Addr::new(8); // almost no room at all
        let err = heap.allocate(&mut mem, None, 100, stack_top, 0).unwrap_err();
        assert_eq!(err.code, ErrorCode::NO_ROOM);
    }

    proptest::proptest! {
        #[test]
        fn allocate_then_free_never_panics(len in 0usize..200) {
            let mut mem = ram(4096);
            let mut heap = Heap::new(Addr::new(0));
            let stack_top = Addr::new(4096);
            let addr = heap.allocate(&mut mem, None, len, stack_top, 0).unwrap();
            heap.free(&mut mem, addr, len);
        }
    }
}
