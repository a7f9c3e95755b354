mod realloc_tests;

use std::vec::Vec;

use super::*;
use crate::block::Block;

fn new_heap() -> Heap<VecSource> {
    Heap::new(VecSource::new())
}

fn bounded_heap(limit: usize) -> Heap<FixedSource> {
    Heap::new(FixedSource::with_limit(limit))
}

/// Collects `(payload offset, size)` for every free list entry, in list
/// order.
fn free_list<S: HeapSource>(heap: &Heap<S>) -> Vec<(usize, usize)> {
    heap.free_blocks()
        .map(|block| (block.payload, block.size))
        .collect()
}

/// Checks the structural invariants of the whole heap:
///
///  - the physical walk partitions `start..heap_end` with no gaps or
///    overlaps,
///  - no two physically adjacent blocks are both free,
///  - a block is free exactly when the free list reaches it, and the back
///    links of the list mirror the forward links,
///  - every physical predecessor link points at the block directly before it,
///    and the recorded physically-last block really is last.
fn assert_heap_consistent<S: HeapSource>(heap: &Heap<S>) {
    let blocks: Vec<BlockInfo> = heap.blocks().collect();

    let mut cursor = heap.start().unwrap_or(heap.heap_end());
    for block in &blocks {
        assert_eq!(block.payload - HEADER_SIZE, cursor, "gap or overlap");
        cursor = block.payload + block.size;
    }
    assert_eq!(cursor, heap.heap_end(), "blocks don't reach the heap end");

    for pair in blocks.windows(2) {
        assert!(
            pair[0].used || pair[1].used,
            "two adjacent free blocks at {} and {}",
            pair[0].payload,
            pair[1].payload
        );
    }

    let listed: Vec<usize> = heap.free_blocks().map(|block| block.payload).collect();
    for block in &blocks {
        assert_eq!(
            !block.used,
            listed.contains(&block.payload),
            "free flag and free list disagree for block at {}",
            block.payload
        );
    }
    assert_eq!(
        listed.len(),
        blocks.iter().filter(|block| !block.used).count()
    );

    let arena = heap.source.bytes();

    let mut backward: Vec<usize> = Vec::new();
    let mut tail_cursor = heap.free_tail;
    while let Some(block) = tail_cursor {
        backward.push(block.payload_offset());
        tail_cursor = block.free_prev(arena);
    }
    backward.reverse();
    assert_eq!(listed, backward, "free list back links are broken");

    let mut prev: Option<Block> = None;
    let mut cursor = heap.start().unwrap_or(heap.heap_end());
    while cursor < heap.heap_end() {
        let block = Block::at(cursor);
        assert_eq!(
            block.phys_prev(arena),
            prev,
            "bad physical predecessor link at {}",
            cursor
        );
        prev = Some(block);
        cursor = block.end_offset(arena);
    }
    assert_eq!(heap.last_physical, prev);
}

#[cfg(feature = "spin")]
#[test]
fn locked_heap_round_trip() {
    let heap = LockedHeap::new(VecSource::new());

    let ptr = heap.allocate(32).unwrap();
    heap.with(|heap| heap.payload_mut(ptr).fill(3));
    assert_eq!(heap.with(|heap| heap.payload(ptr)[31]), 3);

    heap.release(Some(ptr));
    assert_eq!(heap.allocate(32), Some(ptr));
}

#[test]
fn independent_heaps_share_nothing() {
    let mut first = new_heap();
    let mut second = new_heap();

    let p = first.allocate(48).unwrap();
    assert_eq!(second.heap_end(), 0);

    // the same offset comes back from the second heap, they are separate
    // arenas.
    let q = second.allocate(48).unwrap();
    assert_eq!(p, q);

    first.payload_mut(p).fill(1);
    second.payload_mut(q).fill(2);
    assert!(first.payload(p).iter().all(|&b| b == 1));
    assert!(second.payload(q).iter().all(|&b| b == 2));
}
