//! Free-list sub-allocator over a fixed-size linear range (a GPU buffer's
//! byte span, typically). Ported from the original engine's
//! `GPUFreeListAllocator` (`utils/memory_allocators/gpu_free_list_allocator.hpp`):
//! a singly linked list of free blocks plus a map from allocation offset to
//! an `AllocationHeader` recording how much padding was inserted before the
//! block so it could satisfy an alignment requirement.
//!
//! The original operates on raw pointers; this port operates on `u64`
//! offsets relative to `begin_offset`, since the owning buffer (see
//! [`crate::vulkano_objects::managed_buffer`]) is the thing that turns an
//! offset into a real GPU address.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementPolicy {
    FindFirst,
    FindBest,
}

#[derive(Debug, Clone, Copy)]
struct FreeBlock {
    offset: u64,
    block_size: u64,
}

#[derive(Debug, Clone, Copy)]
struct AllocationHeader {
    block_size: u64,
    padding: u64,
}

/// Size of an `AllocationHeader`-equivalent bookkeeping entry. A leftover
/// smaller than this after carving an allocation out of a free block isn't
/// worth tracking as its own free node (spec §4.2: "splits the found block
/// if leftover ≥ header size"); it is folded into the allocation's padding
/// instead, consuming the whole block.
const HEADER_SIZE: u64 = std::mem::size_of::<AllocationHeader>() as u64;

#[derive(Debug)]
pub struct FreeListAllocator {
    total_size: u64,
    begin_offset: u64,
    placement_policy: PlacementPolicy,
    free_list: Vec<FreeBlock>,
    allocated: HashMap<u64, AllocationHeader>,
}

impl FreeListAllocator {
    pub fn new(total_size: u64, begin_offset: u64, placement_policy: PlacementPolicy) -> Self {
        let mut allocator = Self {
            total_size,
            begin_offset,
            placement_policy,
            free_list: Vec::new(),
            allocated: HashMap::new(),
        };
        allocator.reset();
        allocator
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Extends the allocator's managed range, folding the new capacity in as
    /// an additional free block at the tail. Used when a backing GPU buffer
    /// is grown in place (see `ManagedBuffer::resize`); existing allocation
    /// offsets are untouched since they all lie within the old, smaller
    /// range.
    pub fn grow_total_size(&mut self, new_total_size: u64) {
        assert!(new_total_size >= self.total_size, "free list cannot shrink via grow_total_size");
        let added = new_total_size - self.total_size;
        if added == 0 {
            return;
        }
        let tail_offset = self.begin_offset + self.total_size;
        self.total_size = new_total_size;

        if let Some(last) = self.free_list.last_mut() {
            if last.offset + last.block_size == tail_offset {
                last.block_size += added;
                return;
            }
        }
        self.free_list.push(FreeBlock {
            offset: tail_offset,
            block_size: added,
        });
    }

    /// Resets the allocator to a single free block spanning the whole range.
    pub fn reset(&mut self) {
        self.free_list.clear();
        self.allocated.clear();
        self.free_list.push(FreeBlock {
            offset: self.begin_offset,
            block_size: self.total_size,
        });
    }

    /// Allocates `size` bytes aligned to `alignment` (0 or 1 means
    /// unaligned). Returns the offset of the usable region, or `None` if no
    /// free block is large enough.
    pub fn allocate(&mut self, size: u64, alignment: u64) -> Option<u64> {
        if size == 0 {
            return None;
        }
        let (index, padding) = self.find(size, alignment)?;
        let block = self.free_list[index];
        let aligned_offset = block.offset + padding;
        let required = size + padding;

        let remaining = block.block_size - required;
        let header = if remaining >= HEADER_SIZE {
            // Leftover is big enough to track as its own free node: split.
            self.free_list[index] = FreeBlock {
                offset: block.offset + required,
                block_size: remaining,
            };
            AllocationHeader { block_size: required, padding }
        } else {
            // Leftover too small to bother tracking: fold it into this
            // allocation's padding and consume the whole block.
            self.free_list.remove(index);
            AllocationHeader { block_size: block.block_size, padding: block.block_size - size }
        };

        self.allocated.insert(aligned_offset, header);
        Some(aligned_offset)
    }

    /// Frees the allocation that was returned as `offset` by [`Self::allocate`].
    /// Coalesces with neighbouring free blocks afterwards.
    pub fn free(&mut self, offset: u64) {
        let Some(header) = self.allocated.remove(&offset) else {
            return;
        };
        let block_offset = offset - header.padding;
        let insert_at = self
            .free_list
            .iter()
            .position(|b| b.offset > block_offset)
            .unwrap_or(self.free_list.len());
        self.free_list.insert(
            insert_at,
            FreeBlock {
                offset: block_offset,
                block_size: header.block_size,
            },
        );
        self.coalescence();
    }

    /// Returns whether `offset` with `size` bytes is currently a live
    /// allocation exactly matching that span (padding included).
    pub fn allocated(&self, offset: u64, size: u64) -> bool {
        match self.allocated.get(&offset) {
            Some(header) => header.block_size - header.padding == size,
            None => false,
        }
    }

    /// Returns whether `[offset, offset + size)` lies entirely within some
    /// live allocation's usable span. Unlike [`Self::allocated`], `offset`
    /// need not be the allocation's own base offset: this is the check a
    /// sub-range write into an allocated block (e.g. one uniform within a
    /// UBO allocation) needs, where `allocated` would reject anything past
    /// the first sub-range.
    pub fn contains_range(&self, offset: u64, size: u64) -> bool {
        if size == 0 {
            return false;
        }
        let end = offset + size;
        self.allocated.iter().any(|(&base, header)| {
            let usable_size = header.block_size - header.padding;
            offset >= base && end <= base + usable_size
        })
    }

    fn find(&self, size: u64, alignment: u64) -> Option<(usize, u64)> {
        match self.placement_policy {
            PlacementPolicy::FindFirst => self.find_first(size, alignment),
            PlacementPolicy::FindBest => self.find_best(size, alignment),
        }
    }

    fn find_first(&self, size: u64, alignment: u64) -> Option<(usize, u64)> {
        for (i, block) in self.free_list.iter().enumerate() {
            let padding = padding_for(block.offset, alignment);
            if block.block_size >= size + padding {
                return Some((i, padding));
            }
        }
        None
    }

    fn find_best(&self, size: u64, alignment: u64) -> Option<(usize, u64)> {
        let mut best: Option<(usize, u64, u64)> = None;
        for (i, block) in self.free_list.iter().enumerate() {
            let padding = padding_for(block.offset, alignment);
            let required = size + padding;
            if block.block_size < required {
                continue;
            }
            let waste = block.block_size - required;
            if best.map_or(true, |(_, _, best_waste)| waste < best_waste) {
                best = Some((i, padding, waste));
            }
        }
        best.map(|(i, padding, _)| (i, padding))
    }

    /// Merges adjacent free blocks. The free list is kept sorted by offset
    /// (maintained by `free`'s insertion point), so coalescence only ever
    /// needs to look at immediate neighbours.
    fn coalescence(&mut self) {
        let mut i = 0;
        while i + 1 < self.free_list.len() {
            let a = self.free_list[i];
            let b = self.free_list[i + 1];
            if a.offset + a.block_size == b.offset {
                self.free_list[i].block_size += b.block_size;
                self.free_list.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }
}

fn padding_for(offset: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return 0;
    }
    let remainder = offset % alignment;
    if remainder == 0 {
        0
    } else {
        alignment - remainder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A leftover smaller than `HEADER_SIZE` is folded into the
    /// allocation's padding rather than kept as its own free node (spec
    /// §4.2: "splits the found block if leftover ≥ header size").
    #[test]
    fn tiny_leftover_is_folded_into_padding_not_split() {
        let total = 100 + HEADER_SIZE - 1;
        let mut alloc = FreeListAllocator::new(total, 0, PlacementPolicy::FindFirst);
        let a = alloc.allocate(100, 0).unwrap();
        assert_eq!(a, 0);
        // the whole block was consumed (leftover < HEADER_SIZE), so the
        // free list should be empty rather than holding a tiny fragment.
        assert!(alloc.free_list.is_empty());
        alloc.free(a);
        // freeing reconstructs the full original block, fragment included.
        assert_eq!(alloc.free_list.len(), 1);
        assert_eq!(alloc.free_list[0].block_size, total);
    }

    #[test]
    fn allocate_and_free_round_trip() {
        let mut alloc = FreeListAllocator::new(1024, 0, PlacementPolicy::FindFirst);
        let a = alloc.allocate(256, 0).expect("alloc a");
        let b = alloc.allocate(256, 0).expect("alloc b");
        assert_ne!(a, b);
        assert!(alloc.allocated(a, 256));
        alloc.free(a);
        assert!(!alloc.allocated(a, 256));
        // after freeing a, a block of 256 should still be satisfiable.
        let c = alloc.allocate(256, 0).expect("alloc c");
        assert_eq!(c, a);
        alloc.free(b);
        alloc.free(c);
        // everything freed: allocator should coalesce back to one full block.
        let whole = alloc.allocate(1024, 0).expect("alloc whole");
        assert_eq!(whole, 0);
    }

    #[test]
    fn exhausts_when_oversized() {
        let mut alloc = FreeListAllocator::new(128, 0, PlacementPolicy::FindFirst);
        assert!(alloc.allocate(256, 0).is_none());
        assert!(alloc.allocate(128, 0).is_some());
        assert!(alloc.allocate(1, 0).is_none());
    }

    #[test]
    fn respects_alignment() {
        let mut alloc = FreeListAllocator::new(1024, 0, PlacementPolicy::FindFirst);
        let _ = alloc.allocate(17, 0).unwrap();
        let aligned = alloc.allocate(64, 64).unwrap();
        assert_eq!(aligned % 64, 0);
    }

    #[test]
    fn find_best_picks_tightest_block() {
        let mut alloc = FreeListAllocator::new(1024, 0, PlacementPolicy::FindBest);
        let a = alloc.allocate(100, 0).unwrap();
        let _b = alloc.allocate(50, 0).unwrap();
        alloc.free(a);
        // free list now has a 100-byte hole at offset 0 and a tail block.
        let fit = alloc.allocate(90, 0).unwrap();
        assert_eq!(fit, a);
    }

    #[test]
    fn grow_extends_usable_range() {
        let mut alloc = FreeListAllocator::new(128, 0, PlacementPolicy::FindFirst);
        let _ = alloc.allocate(128, 0).unwrap();
        assert!(alloc.allocate(64, 0).is_none());
        alloc.grow_total_size(256);
        let grown = alloc.allocate(128, 0).unwrap();
        assert_eq!(grown, 128);
    }

    /// The literal alloc/free scenario from the spec's property tests:
    /// total=1024, FirstFit. a=alloc(100,8)=>0; b=alloc(200,8); free(a);
    /// c=alloc(50,8)=>0; free(b); free(c) => single free block {0, 1024}.
    ///
    /// spec.md's §8 scenario states `b=100`, but the only free block once
    /// `a` is carved out starts at offset 100, and `100 mod 8 != 0`: aligning
    /// to 8 requires 4 bytes of padding, so `b=104`. This is what property 1
    /// ("every oᵢ mod aᵢ == 0") actually demands; the spec's literal value is
    /// inconsistent with its own invariant, so the code follows the
    /// invariant and this test asserts 104, not the literal 100.
    #[test]
    fn literal_alloc_free_scenario() {
        let mut alloc = FreeListAllocator::new(1024, 0, PlacementPolicy::FindFirst);
        let a = alloc.allocate(100, 8).unwrap();
        assert_eq!(a, 0);
        let b = alloc.allocate(200, 8).unwrap();
        assert_eq!(b, 104);
        assert_eq!(b % 8, 0);
        alloc.free(a);
        let c = alloc.allocate(50, 8).unwrap();
        assert_eq!(c, 0);
        alloc.free(b);
        alloc.free(c);
        assert_eq!(alloc.free_list.len(), 1);
        assert_eq!(alloc.free_list[0].offset, 0);
        assert_eq!(alloc.free_list[0].block_size, 1024);
    }

    #[test]
    fn coalesces_adjacent_frees() {
        let mut alloc = FreeListAllocator::new(300, 0, PlacementPolicy::FindFirst);
        let a = alloc.allocate(100, 0).unwrap();
        let b = alloc.allocate(100, 0).unwrap();
        let c = alloc.allocate(100, 0).unwrap();
        alloc.free(a);
        alloc.free(b);
        alloc.free(c);
        let whole = alloc.allocate(300, 0).unwrap();
        assert_eq!(whole, 0);
    }
}
