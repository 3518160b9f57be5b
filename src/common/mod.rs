//! Values shared between the header parser, the block scan and the decompression phase.

// --- FRAMES ---
/// This magic number is included at the start of a single LZ4 frame
pub const MAGIC_NUM: u32 = 0x184D_2204;
/// Skippable frames carry a magic number in this interval, followed by a 4 byte length
pub const SKIPPABLE_MAGIC_RANGE: core::ops::RangeInclusive<u32> = 0x184D_2A50..=0x184D_2A5F;
/// The only frame version defined so far, stored in the two high bits of FLG
pub const FRAME_VERSION: u8 = 0b01;
/// Magic number, FLG, BD and header checksum
pub const MIN_HEADER_SIZE: usize = 7;
/// Minimal header plus an 8 byte content size and a 4 byte dictionary id
pub const MAX_HEADER_SIZE: usize = MIN_HEADER_SIZE + 8 + 4;

// --- BLOCKS ---
/// The high bit of a block size word marks a block that is stored uncompressed
pub const UNCOMPRESSED_FLAG: u32 = 1 << 31;
/// Every size word, block checksum, end mark and content checksum takes 4 bytes
pub const WORD_SIZE: u64 = 4;
/// Linked blocks may reference at most this much of the previously decoded output
pub const WINDOW_SIZE: usize = 64 * 1024;
/// How many bytes of every block body are kept in the report as a sample
pub const SAMPLE_LEN: usize = 16;
