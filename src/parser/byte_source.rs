//! Sources of bytes for the [ByteParser](crate::parser::ByteParser).
//!
//! Tree and alignment files of an ecotype analysis comfortably fit into
//! memory, so [InMemoryByteSource] is the only source; the [ByteSource]
//! trait keeps the parsers independent of it.

use std::fs::File;
use std::io::Read;
use std::path::Path;

// =#========================================================================#=
// BYTE SOURCE (Trait)
// =#========================================================================#=
/// Forward-only cursor over a sequence of bytes.
pub trait ByteSource {
    /// Returns the byte under the cursor, `None` at the end of the data.
    fn peek(&self) -> Option<u8>;

    /// Returns the byte under the cursor and moves past it.
    fn next_byte(&mut self) -> Option<u8>;

    /// Returns up to `k` bytes starting at the cursor, without moving it.
    fn peek_slice(&self, k: usize) -> &[u8];

    /// Returns the offset of the cursor from the start of the data.
    fn position(&self) -> usize;

    fn is_eof(&self) -> bool;
}

// =#========================================================================#=
// IN MEMORY BYTE SOURCE
// =#========================================================================$=
/// Byte source over an owned buffer.
pub struct InMemoryByteSource {
    bytes: Vec<u8>,
    cursor: usize,
}

impl InMemoryByteSource {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes, cursor: 0 }
    }

    /// Loads the file at `path` completely.
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<InMemoryByteSource> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        Ok(Self::from_vec(bytes))
    }
}

impl ByteSource for InMemoryByteSource {
    #[inline(always)]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.cursor).copied()
    }

    #[inline(always)]
    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.cursor += 1;
        Some(byte)
    }

    fn peek_slice(&self, k: usize) -> &[u8] {
        let start = self.cursor.min(self.bytes.len());
        let end = self.cursor.saturating_add(k).min(self.bytes.len());
        &self.bytes[start..end]
    }

    #[inline]
    fn position(&self) -> usize {
        self.cursor
    }

    fn is_eof(&self) -> bool {
        self.cursor >= self.bytes.len()
    }
}
