//! The block header layout and its accessors.
//!
//! Every block in the heap is `[header][payload]`, addressed by the offset of
//! its header within the arena. The header is five machine words: the payload
//! size, the used flag, the two free-list links, and the physical predecessor
//! link. All reads and writes of header fields go through [`read_word`] and
//! [`write_word`], so a bad offset stops at the slice bounds check instead of
//! scribbling over unrelated memory.

pub(crate) const WORD_SIZE: usize = core::mem::size_of::<usize>();

/// The number of bytes a block header occupies in the arena.
pub const HEADER_SIZE: usize = 5 * WORD_SIZE;

/// The encoding of "no block" in a header link field.
const NIL: usize = usize::MAX;

// word indices of the header fields.
const FIELD_SIZE: usize = 0;
const FIELD_USED: usize = 1;
const FIELD_FREE_NEXT: usize = 2;
const FIELD_FREE_PREV: usize = 3;
const FIELD_PHYS_PREV: usize = 4;

fn read_word(arena: &[u8], offset: usize) -> usize {
    let mut bytes = [0u8; WORD_SIZE];
    bytes.copy_from_slice(&arena[offset..offset + WORD_SIZE]);
    usize::from_ne_bytes(bytes)
}

fn write_word(arena: &mut [u8], offset: usize, value: usize) {
    arena[offset..offset + WORD_SIZE].copy_from_slice(&value.to_ne_bytes());
}

/// A block in the heap, identified by the offset of its header in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block(usize);

impl Block {
    /// Returns the block whose header starts at the given arena offset.
    pub fn at(header_offset: usize) -> Block {
        Block(header_offset)
    }

    /// Returns the block whose payload starts at the given arena offset.
    ///
    /// The offset must have been returned from one of the allocation
    /// operations; the header sits immediately before the payload.
    pub fn from_payload(payload_offset: usize) -> Block {
        Block(payload_offset - HEADER_SIZE)
    }

    /// The arena offset where this block's header starts.
    pub fn header_offset(self) -> usize {
        self.0
    }

    /// The arena offset where this block's payload starts.
    pub fn payload_offset(self) -> usize {
        self.0 + HEADER_SIZE
    }

    fn field(self, index: usize) -> usize {
        self.0 + index * WORD_SIZE
    }

    /// The payload size of this block, excluding the header.
    pub fn size(self, arena: &[u8]) -> usize {
        read_word(arena, self.field(FIELD_SIZE))
    }

    pub fn set_size(self, arena: &mut [u8], size: usize) {
        write_word(arena, self.field(FIELD_SIZE), size);
    }

    /// Is this block currently allocated?
    pub fn is_used(self, arena: &[u8]) -> bool {
        read_word(arena, self.field(FIELD_USED)) != 0
    }

    pub fn set_used(self, arena: &mut [u8], used: bool) {
        write_word(arena, self.field(FIELD_USED), used as usize);
    }

    /// The next free block in the free list, if any.
    ///
    /// Only meaningful while this block is free.
    pub fn free_next(self, arena: &[u8]) -> Option<Block> {
        decode_link(read_word(arena, self.field(FIELD_FREE_NEXT)))
    }

    pub fn set_free_next(self, arena: &mut [u8], link: Option<Block>) {
        write_word(arena, self.field(FIELD_FREE_NEXT), encode_link(link));
    }

    /// The previous free block in the free list, if any.
    ///
    /// Only meaningful while this block is free.
    pub fn free_prev(self, arena: &[u8]) -> Option<Block> {
        decode_link(read_word(arena, self.field(FIELD_FREE_PREV)))
    }

    pub fn set_free_prev(self, arena: &mut [u8], link: Option<Block>) {
        write_word(arena, self.field(FIELD_FREE_PREV), encode_link(link));
    }

    /// The block immediately before this one in address order, or `None` if
    /// this block starts at the beginning of the heap.
    pub fn phys_prev(self, arena: &[u8]) -> Option<Block> {
        decode_link(read_word(arena, self.field(FIELD_PHYS_PREV)))
    }

    pub fn set_phys_prev(self, arena: &mut [u8], link: Option<Block>) {
        write_word(arena, self.field(FIELD_PHYS_PREV), encode_link(link));
    }

    /// The arena offset one past the last payload byte of this block.
    ///
    /// This is also the header offset of the physical successor, if one
    /// exists before the heap end.
    pub fn end_offset(self, arena: &[u8]) -> usize {
        self.payload_offset() + self.size(arena)
    }

    /// The block immediately after this one in address order, if this block
    /// is not the last block in the heap.
    pub fn next_physical(self, arena: &[u8], heap_end: usize) -> Option<Block> {
        let end = self.end_offset(arena);
        if end < heap_end {
            Some(Block::at(end))
        } else {
            None
        }
    }

    /// Writes a complete header for a freshly grown block.
    pub fn init(self, arena: &mut [u8], size: usize, used: bool, phys_prev: Option<Block>) {
        self.set_size(arena, size);
        self.set_used(arena, used);
        self.set_free_next(arena, None);
        self.set_free_prev(arena, None);
        self.set_phys_prev(arena, phys_prev);
    }

    /// Clears this block's header after it has been absorbed by a physical
    /// neighbor. An absorbed header is dead space inside the absorbing block
    /// and is never used as a block boundary again.
    pub fn clear(self, arena: &mut [u8]) {
        self.set_size(arena, 0);
        self.set_used(arena, false);
        self.set_free_next(arena, None);
        self.set_free_prev(arena, None);
        self.set_phys_prev(arena, None);
    }
}

fn encode_link(link: Option<Block>) -> usize {
    match link {
        Some(block) => block.header_offset(),
        None => NIL,
    }
}

fn decode_link(word: usize) -> Option<Block> {
    if word == NIL {
        None
    } else {
        Some(Block::at(word))
    }
}
