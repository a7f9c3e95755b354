use super::*;

#[test]
fn resize_of_null_behaves_as_allocate() {
    let mut heap = new_heap();

    let ptr = heap.resize(None, 64).unwrap();
    assert_eq!(ptr, HEADER_SIZE);
    assert_eq!(heap.capacity_of(ptr), 64);
    assert_heap_consistent(&heap);
}

#[test]
fn resize_smaller_returns_the_same_offset_without_shrinking() {
    let mut heap = new_heap();

    let p = heap.allocate(100).unwrap();
    heap.payload_mut(p).fill(0x42);

    let heap_end = heap.heap_end();
    assert_eq!(heap.resize(Some(p), 40), Some(p));

    // no shrink, no split: the block keeps its full capacity and nothing
    // was freed.
    assert_eq!(heap.capacity_of(p), 100);
    assert!(free_list(&heap).is_empty());
    assert_eq!(heap.heap_end(), heap_end);
    assert!(heap.payload(p).iter().all(|&b| b == 0x42));
    assert_heap_consistent(&heap);
}

#[test]
fn resize_within_spare_capacity_keeps_the_block() {
    let mut heap = new_heap();

    // produce a block whose capacity exceeds the requested size: the freed
    // 100-byte block is handed out whole for an 80-byte request because the
    // leftover cannot hold a header.
    let p = heap.allocate(100).unwrap();
    heap.release(Some(p));
    let q = heap.allocate(80).unwrap();
    assert_eq!(q, p);
    assert_eq!(heap.capacity_of(q), 100);

    assert_eq!(heap.resize(Some(q), 95), Some(q));
    assert_eq!(heap.capacity_of(q), 100);
    assert_heap_consistent(&heap);
}

#[test]
fn resize_larger_moves_the_block_and_preserves_content() {
    let mut heap = new_heap();

    let p = heap.allocate(16).unwrap();
    for (i, byte) in heap.payload_mut(p).iter_mut().enumerate() {
        *byte = i as u8 + 1;
    }
    let _barrier = heap.allocate(16).unwrap();

    let q = heap.resize(Some(p), 64).unwrap();
    assert_ne!(q, p);
    assert_eq!(heap.capacity_of(q), 64);

    // the first 16 bytes moved with the block.
    for (i, &byte) in heap.payload(q)[..16].iter().enumerate() {
        assert_eq!(byte, i as u8 + 1);
    }

    // the old block was released.
    assert_eq!(free_list(&heap), vec![(p, 16)]);
    assert_heap_consistent(&heap);
}

#[test]
fn resize_larger_reuses_a_fitting_free_block() {
    let mut heap = new_heap();

    let p = heap.allocate(16).unwrap();
    heap.payload_mut(p).fill(0x5A);
    let big = heap.allocate(100).unwrap();
    heap.release(Some(big));

    let heap_end = heap.heap_end();
    let q = heap.resize(Some(p), 50).unwrap();

    assert_eq!(q, big);
    assert_eq!(heap.heap_end(), heap_end);
    assert!(heap.payload(q)[..16].iter().all(|&b| b == 0x5A));
    assert_heap_consistent(&heap);
}

#[test]
fn resize_failure_leaves_the_original_block_untouched() {
    let mut heap = bounded_heap(HEADER_SIZE + 16);

    let p = heap.allocate(16).unwrap();
    heap.payload_mut(p).fill(0x77);

    assert_eq!(heap.resize(Some(p), 64), None);

    assert_eq!(heap.capacity_of(p), 16);
    assert!(heap.payload(p).iter().all(|&b| b == 0x77));
    assert!(free_list(&heap).is_empty());
    assert_heap_consistent(&heap);
}
