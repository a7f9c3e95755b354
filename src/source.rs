//! The heap growth primitive and its backends.

use alloc::vec::Vec;

/// The primitive that supplies heap memory to the allocator.
///
/// A source owns a byte arena that only ever grows. The allocator addresses
/// blocks by offsets into that arena, so the arena must be stable: bytes that
/// have been handed out by [`extend`](HeapSource::extend) keep their offsets
/// for the lifetime of the source.
pub trait HeapSource {
    /// Extends the arena by `amount` bytes.
    ///
    /// Returns the offset of the arena boundary *before* the extension, which
    /// is where the newly supplied bytes start. An `amount` of 0 returns the
    /// current boundary without moving it.
    ///
    /// Returns `None` if the source cannot supply more memory. A failed
    /// extension must not grow the arena at all.
    fn extend(&mut self, amount: usize) -> Option<usize>;

    /// The currently extended region. Its length is the current boundary.
    fn bytes(&self) -> &[u8];

    /// Mutable access to the currently extended region.
    fn bytes_mut(&mut self) -> &mut [u8];
}

/// A heap source backed by a `Vec`, growing without bound.
#[derive(Debug, Default)]
pub struct VecSource {
    arena: Vec<u8>,
}

impl VecSource {
    /// Creates an empty source. The arena grows on demand.
    pub const fn new() -> Self {
        Self { arena: Vec::new() }
    }
}

impl HeapSource for VecSource {
    fn extend(&mut self, amount: usize) -> Option<usize> {
        let boundary = self.arena.len();
        self.arena.resize(boundary + amount, 0);
        Some(boundary)
    }

    fn bytes(&self) -> &[u8] {
        &self.arena
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.arena
    }
}

/// A heap source with a hard byte limit.
///
/// Extensions past the limit fail, which makes out-of-memory behavior
/// reproducible in tests.
#[derive(Debug)]
pub struct FixedSource {
    arena: Vec<u8>,
    limit: usize,
}

impl FixedSource {
    /// Creates a source that refuses to grow past `limit` total bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            arena: Vec::with_capacity(limit),
            limit,
        }
    }
}

impl HeapSource for FixedSource {
    fn extend(&mut self, amount: usize) -> Option<usize> {
        let boundary = self.arena.len();
        if amount > self.limit - boundary {
            return None;
        }
        self.arena.resize(boundary + amount, 0);
        Some(boundary)
    }

    fn bytes(&self) -> &[u8] {
        &self.arena
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.arena
    }
}
