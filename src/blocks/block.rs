use core::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Compressed,
    Uncompressed,
}

impl core::fmt::Display for BlockType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        match self {
            BlockType::Compressed => write!(f, "Compressed"),
            BlockType::Uncompressed => write!(f, "Uncompressed"),
        }
    }
}

/// The location and metadata of one block, as found by the structural scan.
///
/// Nothing in here requires the body to have been read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub index: usize,
    /// Offset of the 4 byte size word
    pub file_offset: u64,
    /// The size word with the uncompressed flag masked out
    pub declared_size: u32,
    pub block_type: BlockType,
    /// Offset of the first body byte
    pub data_offset: u64,
    /// The block checksum stored after the body, if the frame has block checksums
    pub checksum: Option<u32>,
}

impl Block {
    pub fn is_uncompressed(&self) -> bool {
        self.block_type == BlockType::Uncompressed
    }

    pub fn data_len(&self) -> u32 {
        self.declared_size
    }

    /// The body as a range into the whole input.
    pub fn data_range(&self) -> Range<usize> {
        let start = self.data_offset as usize;
        start..start + self.declared_size as usize
    }

    /// Offset of the size word following this block.
    pub fn end_offset(&self) -> u64 {
        let checksum_len = if self.checksum.is_some() { 4 } else { 0 };
        self.data_offset + u64::from(self.declared_size) + checksum_len
    }
}
