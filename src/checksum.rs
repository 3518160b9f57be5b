//! The three checksum domains of an LZ4 frame.
//!
//! All of them use XXH32 with a seed of zero:
//! - the header checksum is the second byte of the digest over the frame descriptor and the
//!   optional header fields
//! - a block checksum is the digest over the block data exactly as stored in the frame
//! - the content checksum is the digest over the whole decompressed content
//!
//! <https://github.com/lz4/lz4/blob/dev/doc/lz4_Frame_format.md>

use core::hash::Hasher;
use twox_hash::XxHash32;

const SEED: u32 = 0;

/// The outcome of comparing a stored checksum against the computed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumCheck {
    /// The value stored in the frame
    pub expected: u32,
    /// The value computed from the data
    pub actual: u32,
}

impl ChecksumCheck {
    pub fn passed(&self) -> bool {
        self.expected == self.actual
    }
}

/// Result of one check as it appears in a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The frame does not carry this checksum
    #[default]
    NotPresent,
    /// The checksum is present but could not or should not be verified
    Skipped,
    Checked(ChecksumCheck),
}

impl CheckOutcome {
    pub fn failed(&self) -> bool {
        matches!(self, CheckOutcome::Checked(check) if !check.passed())
    }
}

pub fn digest(bytes: &[u8]) -> u32 {
    XxHash32::oneshot(SEED, bytes)
}

/// Derive the header checksum byte from the descriptor bytes (FLG up to the last optional field).
pub fn header_checksum(descriptor: &[u8]) -> u8 {
    ((digest(descriptor) >> 8) & 0xFF) as u8
}

pub fn verify_header(descriptor: &[u8], stored: u8) -> ChecksumCheck {
    ChecksumCheck {
        expected: u32::from(stored),
        actual: u32::from(header_checksum(descriptor)),
    }
}

pub fn verify_block(index: usize, data: &[u8], stored: u32) -> ChecksumCheck {
    let check = ChecksumCheck {
        expected: stored,
        actual: digest(data),
    };
    if !check.passed() {
        log_warn!(
            "checksum of block {} does not match: stored 0x{:08X}, computed 0x{:08X}",
            index,
            check.expected,
            check.actual
        );
    }
    check
}

pub fn verify_content(content: &[u8], stored: u32) -> ChecksumCheck {
    ChecksumCheck {
        expected: stored,
        actual: digest(content),
    }
}

/// Computes the content checksum incrementally, one block output at a time.
pub struct ContentHasher {
    hasher: XxHash32,
    len: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            hasher: XxHash32::with_seed(SEED),
            len: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.write(data);
        self.len += data.len() as u64;
    }

    /// Amount of content hashed so far
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn verify(&self, stored: u32) -> ChecksumCheck {
        ChecksumCheck {
            expected: stored,
            actual: self.hasher.finish_32(),
        }
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}
