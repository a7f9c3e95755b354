#![no_std]

//! A first-fit memory allocator with eager coalescing, managing a growable
//! heap arena obtained from a single heap-extension primitive.
//!
//! The heap is a byte arena supplied by a [`HeapSource`], and every
//! allocation is addressed by a `usize` offset into that arena. Each block is
//! a fixed-size header followed by its payload. Free blocks are threaded on a
//! doubly linked free list in insertion order, allocation is a first-fit walk
//! of that list with block splitting, and releasing a block eagerly merges it
//! with free physical neighbors, so no two adjacent blocks are ever both
//! free.
//!
//! The allocator itself is single-threaded: a [`Heap`] must not be shared
//! between threads without external synchronization. The [`LockedHeap`]
//! wrapper (behind the default `spin` feature) serializes all operations with
//! a spinlock.
//!
//! ## Usage
//!
//! ```
//! use first_fit_allocator::{Heap, VecSource};
//!
//! let mut heap = Heap::new(VecSource::new());
//!
//! let ptr = heap.allocate(64).unwrap();
//! heap.payload_mut(ptr).fill(7);
//! assert_eq!(heap.payload(ptr)[0], 7);
//!
//! heap.release(Some(ptr));
//!
//! // the freed block is reused for the next fitting request.
//! assert_eq!(heap.allocate(64), Some(ptr));
//! ```
//!
//! ## Failure model
//!
//! No operation panics on ordinary failure. A request of size 0 and a request
//! the source cannot satisfy both come back as `None`, and the heap is left
//! exactly as it was. Releasing or resizing an offset that was never returned
//! from this heap is out of contract and is not detected.

extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate std;

mod block;
mod source;

#[cfg(test)]
mod tests;

use core::fmt;

use block::Block;
pub use block::HEADER_SIZE;
pub use source::{FixedSource, HeapSource, VecSource};

/// A first-fit heap allocator over a growable byte arena.
///
/// All heap state lives in this value: the heap start, the ends of the free
/// list, and the physically last block. Independent heaps are fully isolated
/// from each other.
pub struct Heap<S: HeapSource> {
    source: S,
    /// Offset of the first block ever created, fixed once observed.
    start: Option<usize>,
    free_head: Option<Block>,
    free_tail: Option<Block>,
    /// The most recently grown block, seeds the physical predecessor link of
    /// the next grown block. Moves backward when the last block is absorbed
    /// by a merge or replaced by a split remainder.
    last_physical: Option<Block>,
}

impl<S: HeapSource> Heap<S> {
    /// Creates a heap that draws memory from the given source.
    pub const fn new(source: S) -> Self {
        Self {
            source,
            start: None,
            free_head: None,
            free_tail: None,
            last_physical: None,
        }
    }

    /// Allocates `size` bytes and returns the payload offset.
    ///
    /// A request of size 0 returns `None` without touching the heap. Returns
    /// `None` when no free block fits and the source cannot grow; existing
    /// allocations are unaffected in that case.
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        if size == 0 {
            return None;
        }

        if let Some(block) = self.first_fit(size) {
            self.split(block, size);
            self.unlink(block);
            block.set_used(self.source.bytes_mut(), true);
            return Some(block.payload_offset());
        }

        self.grow(size).map(Block::payload_offset)
    }

    /// Allocates `count * elem_size` bytes and zero-fills the whole region.
    ///
    /// Propagates `None` from the underlying allocation. Overflow of the byte
    /// count is not checked.
    pub fn allocate_zeroed(&mut self, count: usize, elem_size: usize) -> Option<usize> {
        let total = count.wrapping_mul(elem_size);
        let ptr = self.allocate(total)?;
        self.source.bytes_mut()[ptr..ptr + total].fill(0);
        Some(ptr)
    }

    /// Releases a previously allocated payload offset.
    ///
    /// `None` is a no-op. The freed block goes to the tail of the free list
    /// and is immediately merged with free physical neighbors.
    pub fn release(&mut self, ptr: Option<usize>) {
        let ptr = match ptr {
            Some(ptr) => ptr,
            None => return,
        };

        let block = Block::from_payload(ptr);
        block.set_used(self.source.bytes_mut(), false);
        self.push_back(block);
        self.coalesce(block);
    }

    /// Resizes an allocation to at least `new_size` bytes, preserving its
    /// prior content.
    ///
    /// A `None` pointer behaves as a fresh [`allocate`](Heap::allocate). When
    /// the block's current size already covers `new_size`, the same offset is
    /// returned and the block is not shrunk or split. When growing, the block
    /// is moved: on success the old offset has been released and must not be
    /// used again; on failure `None` is returned and the original block and
    /// its contents are untouched.
    pub fn resize(&mut self, ptr: Option<usize>, new_size: usize) -> Option<usize> {
        let ptr = match ptr {
            Some(ptr) => ptr,
            None => return self.allocate(new_size),
        };

        let block = Block::from_payload(ptr);
        let old_size = block.size(self.source.bytes());
        if old_size >= new_size {
            return Some(ptr);
        }

        let new_ptr = self.allocate(new_size)?;
        self.source
            .bytes_mut()
            .copy_within(ptr..ptr + old_size, new_ptr);
        self.release(Some(ptr));
        Some(new_ptr)
    }

    /// The payload bytes of an allocated block.
    pub fn payload(&self, ptr: usize) -> &[u8] {
        let arena = self.source.bytes();
        let size = Block::from_payload(ptr).size(arena);
        &arena[ptr..ptr + size]
    }

    /// Mutable access to the payload bytes of an allocated block.
    pub fn payload_mut(&mut self, ptr: usize) -> &mut [u8] {
        let arena = self.source.bytes_mut();
        let size = Block::from_payload(ptr).size(arena);
        &mut arena[ptr..ptr + size]
    }

    /// The current payload capacity of an allocated block.
    ///
    /// May exceed the requested size, either because a fitting free block was
    /// too small to split or because the block was resized downward, which
    /// never shrinks it.
    pub fn capacity_of(&self, ptr: usize) -> usize {
        Block::from_payload(ptr).size(self.source.bytes())
    }

    /// The offset of the first block in the heap, if any block was created.
    pub fn start(&self) -> Option<usize> {
        self.start
    }

    /// The current heap boundary. The heap only grows.
    pub fn heap_end(&self) -> usize {
        self.source.bytes().len()
    }

    /// Walks all blocks in physical (address) order.
    pub fn blocks(&self) -> Blocks<'_> {
        let heap_end = self.heap_end();
        Blocks {
            arena: self.source.bytes(),
            cursor: self.start.unwrap_or(heap_end),
            heap_end,
        }
    }

    /// Walks the free list in list order, head to tail.
    pub fn free_blocks(&self) -> FreeBlocks<'_> {
        FreeBlocks {
            arena: self.source.bytes(),
            cursor: self.free_head,
        }
    }

    /// Walks the free list from the head and returns the first block large
    /// enough for the request. List order breaks ties.
    fn first_fit(&self, size: usize) -> Option<Block> {
        let arena = self.source.bytes();
        let mut cursor = self.free_head;
        while let Some(block) = cursor {
            if block.size(arena) >= size {
                return Some(block);
            }
            cursor = block.free_next(arena);
        }
        None
    }

    /// Carves the tail of a fitting free block into a new free remainder and
    /// shrinks the block to exactly `requested` bytes.
    ///
    /// The remainder goes to the head of the free list. When the leftover is
    /// too small to carry a header and at least one payload byte, the block
    /// is left whole and its extra capacity stays with the allocation.
    fn split(&mut self, block: Block, requested: usize) {
        let leftover = block.size(self.source.bytes()) - requested;
        if leftover <= HEADER_SIZE {
            return;
        }

        let remainder = Block::at(block.payload_offset() + requested);
        let arena = self.source.bytes_mut();
        remainder.init(arena, leftover - HEADER_SIZE, false, Some(block));
        block.set_size(arena, requested);

        // the remainder now owns the boundary that used to be the block's
        // end, so the physical successor must point back at it.
        let end = remainder.end_offset(self.source.bytes());
        self.fix_boundary_after(end, remainder);
        self.push_front(remainder);
    }

    /// Grows the heap by one block worth of memory and appends the block to
    /// the physical chain, marked used.
    fn grow(&mut self, size: usize) -> Option<Block> {
        let boundary = self.source.extend(HEADER_SIZE + size)?;
        if self.start.is_none() {
            self.start = Some(boundary);
        }

        let block = Block::at(boundary);
        let phys_prev = self.last_physical;
        block.init(self.source.bytes_mut(), size, true, phys_prev);
        self.last_physical = Some(block);
        Some(block)
    }

    /// Merges a just-freed block with its free physical neighbors.
    ///
    /// Forward first: the neighbor is absorbed into `block`. Then backward:
    /// the (possibly grown) `block` is absorbed into its predecessor. Merging
    /// is eager, so one pass over the two neighbors is always enough.
    fn coalesce(&mut self, block: Block) {
        let heap_end = self.heap_end();

        let forward = {
            let arena = self.source.bytes();
            block
                .next_physical(arena, heap_end)
                .filter(|forward| !forward.is_used(arena))
        };
        if let Some(forward) = forward {
            self.unlink(forward);
            let arena = self.source.bytes_mut();
            let merged = block.size(arena) + HEADER_SIZE + forward.size(arena);
            block.set_size(arena, merged);
            forward.clear(arena);
            let end = block.end_offset(self.source.bytes());
            self.fix_boundary_after(end, block);
        }

        let backward = {
            let arena = self.source.bytes();
            block
                .phys_prev(arena)
                .filter(|backward| !backward.is_used(arena))
        };
        if let Some(backward) = backward {
            self.unlink(block);
            let arena = self.source.bytes_mut();
            let merged = backward.size(arena) + HEADER_SIZE + block.size(arena);
            backward.set_size(arena, merged);
            block.clear(arena);
            let end = backward.end_offset(self.source.bytes());
            self.fix_boundary_after(end, backward);
        }
    }

    /// Repairs the physical chain after a block boundary moved to `end`.
    ///
    /// When a block starts at `end`, its predecessor link is retargeted to
    /// `pred`. When `end` is the heap boundary, `pred` became the physically
    /// last block.
    fn fix_boundary_after(&mut self, end: usize, pred: Block) {
        if end < self.heap_end() {
            Block::at(end).set_phys_prev(self.source.bytes_mut(), Some(pred));
        } else {
            self.last_physical = Some(pred);
        }
    }

    /// Inserts a free block at the head of the free list.
    fn push_front(&mut self, block: Block) {
        let head = self.free_head;
        let arena = self.source.bytes_mut();
        block.set_free_prev(arena, None);
        block.set_free_next(arena, head);
        match head {
            Some(head) => head.set_free_prev(arena, Some(block)),
            None => self.free_tail = Some(block),
        }
        self.free_head = Some(block);
    }

    /// Inserts a free block at the tail of the free list.
    fn push_back(&mut self, block: Block) {
        let tail = self.free_tail;
        let arena = self.source.bytes_mut();
        block.set_free_next(arena, None);
        block.set_free_prev(arena, tail);
        match tail {
            Some(tail) => tail.set_free_next(arena, Some(block)),
            None => self.free_head = Some(block),
        }
        self.free_tail = Some(block);
    }

    /// Removes a block from the free list and clears its list links.
    fn unlink(&mut self, block: Block) {
        let arena = self.source.bytes_mut();
        let prev = block.free_prev(arena);
        let next = block.free_next(arena);

        match (prev, next) {
            // sole element
            (None, None) => {
                self.free_head = None;
                self.free_tail = None;
            }
            // head, but not tail
            (None, Some(next)) => {
                next.set_free_prev(arena, None);
                self.free_head = Some(next);
            }
            // tail, but not head
            (Some(prev), None) => {
                prev.set_free_next(arena, None);
                self.free_tail = Some(prev);
            }
            // interior element
            (Some(prev), Some(next)) => {
                prev.set_free_next(arena, Some(next));
                next.set_free_prev(arena, Some(prev));
            }
        }

        block.set_free_next(arena, None);
        block.set_free_prev(arena, None);
    }
}

impl<S: HeapSource> fmt::Debug for Heap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-- start of heap ({:?}) --", self.start)?;
        for block in self.blocks() {
            writeln!(
                f,
                "block at {}: payload={}, size={}, used={}",
                block.payload - HEADER_SIZE,
                block.payload,
                block.size,
                block.used
            )?;
        }
        write!(f, "-- end of heap ({}) --", self.heap_end())
    }
}

/// A snapshot of one block, yielded by [`Heap::blocks`] and
/// [`Heap::free_blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset of the block's payload within the arena.
    pub payload: usize,
    /// Payload size in bytes.
    pub size: usize,
    /// Whether the block is currently allocated.
    pub used: bool,
}

/// Iterator over all blocks in physical order. See [`Heap::blocks`].
pub struct Blocks<'a> {
    arena: &'a [u8],
    cursor: usize,
    heap_end: usize,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        if self.cursor >= self.heap_end {
            return None;
        }
        let block = Block::at(self.cursor);
        self.cursor = block.end_offset(self.arena);
        Some(BlockInfo {
            payload: block.payload_offset(),
            size: block.size(self.arena),
            used: block.is_used(self.arena),
        })
    }
}

/// Iterator over the free list in list order. See [`Heap::free_blocks`].
pub struct FreeBlocks<'a> {
    arena: &'a [u8],
    cursor: Option<Block>,
}

impl Iterator for FreeBlocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let block = self.cursor?;
        self.cursor = block.free_next(self.arena);
        Some(BlockInfo {
            payload: block.payload_offset(),
            size: block.size(self.arena),
            used: block.is_used(self.arena),
        })
    }
}

/// A spin locked heap that can be shared between threads.
///
/// This is the explicit concurrency extension over the single-threaded
/// [`Heap`]: every operation takes the lock for its full duration.
#[cfg(feature = "spin")]
pub struct LockedHeap<S: HeapSource>(spin::Mutex<Heap<S>>);

#[cfg(feature = "spin")]
impl<S: HeapSource> LockedHeap<S> {
    /// Creates a locked heap that draws memory from the given source.
    pub const fn new(source: S) -> Self {
        Self(spin::Mutex::new(Heap::new(source)))
    }

    /// See [`Heap::allocate`].
    pub fn allocate(&self, size: usize) -> Option<usize> {
        self.0.lock().allocate(size)
    }

    /// See [`Heap::allocate_zeroed`].
    pub fn allocate_zeroed(&self, count: usize, elem_size: usize) -> Option<usize> {
        self.0.lock().allocate_zeroed(count, elem_size)
    }

    /// See [`Heap::release`].
    pub fn release(&self, ptr: Option<usize>) {
        self.0.lock().release(ptr)
    }

    /// See [`Heap::resize`].
    pub fn resize(&self, ptr: Option<usize>, new_size: usize) -> Option<usize> {
        self.0.lock().resize(ptr, new_size)
    }

    /// Runs a closure with exclusive access to the heap, for payload access
    /// and introspection under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut Heap<S>) -> R) -> R {
        f(&mut self.0.lock())
    }
}
