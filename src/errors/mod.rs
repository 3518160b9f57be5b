//! Errors and issues that can be reported while analysing a frame.
//!
//! Two tiers exist. A [`FrameError`] is fatal: the header could not be trusted, or the block
//! sequence was cut short, and nothing after that point can be located. An [`Issue`] is local
//! to one block or one check and is recorded next to the data it concerns while the analysis
//! carries on.

use core::fmt;
use core::time::Duration;
use std::error::Error as StdError;

pub use crate::blocks::block_iter::ScanError;
pub use crate::frame::ReadFrameHeaderError;

/// The part of the frame a read was attempting when the input ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    SkippableFrameSize,
    FrameDescriptor,
    BlockDescriptor,
    ContentSize,
    DictionaryId,
    HeaderChecksum,
    BlockSize { index: usize },
    BlockBody { index: usize },
    BlockChecksum { index: usize },
    ContentChecksum,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::SkippableFrameSize => write!(f, "skippable frame size"),
            Section::FrameDescriptor => write!(f, "frame descriptor (FLG)"),
            Section::BlockDescriptor => write!(f, "block descriptor (BD)"),
            Section::ContentSize => write!(f, "content size"),
            Section::DictionaryId => write!(f, "dictionary id"),
            Section::HeaderChecksum => write!(f, "header checksum"),
            Section::BlockSize { index } => write!(f, "size word of block {index}"),
            Section::BlockBody { index } => write!(f, "body of block {index}"),
            Section::BlockChecksum { index } => write!(f, "checksum of block {index}"),
            Section::ContentChecksum => write!(f, "content checksum"),
        }
    }
}

/// A fatal error. Analysis stops where it occurred, blocks found before it are still reported.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FrameError {
    Header(ReadFrameHeaderError),
    Scan(ScanError),
}

impl FrameError {
    /// True if the input is not an LZ4 data frame at all, as opposed to a frame that is broken.
    pub fn is_not_a_frame(&self) -> bool {
        matches!(
            self,
            FrameError::Header(ReadFrameHeaderError::InvalidMagic { .. })
                | FrameError::Header(ReadFrameHeaderError::SkippableFrame { .. })
        )
    }

    /// The offset reported for a truncated input, if that is what this error is.
    pub fn truncation_offset(&self) -> Option<u64> {
        match self {
            FrameError::Header(ReadFrameHeaderError::UnexpectedEndOfInput { offset, .. })
            | FrameError::Scan(ScanError::UnexpectedEndOfInput { offset, .. }) => Some(*offset),
            _ => None,
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Header(e) => write!(f, "Invalid frame header: {e}"),
            FrameError::Scan(e) => write!(f, "Block sequence broken: {e}"),
        }
    }
}

impl StdError for FrameError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            FrameError::Header(e) => Some(e),
            FrameError::Scan(e) => Some(e),
        }
    }
}

impl From<ReadFrameHeaderError> for FrameError {
    fn from(val: ReadFrameHeaderError) -> Self {
        Self::Header(val)
    }
}

impl From<ScanError> for FrameError {
    fn from(val: ScanError) -> Self {
        Self::Scan(val)
    }
}

/// Why the decompression capability could not produce a block's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecompressionFailureReason {
    /// The compressed data is malformed, the message comes from the decompressor
    Corrupted(String),
    /// The block took longer than the configured per-block budget
    Timeout { elapsed: Duration, limit: Duration },
}

impl fmt::Display for DecompressionFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecompressionFailureReason::Corrupted(msg) => write!(f, "corrupted data: {msg}"),
            DecompressionFailureReason::Timeout { elapsed, limit } => write!(
                f,
                "timed out after {}ms (limit {}ms)",
                elapsed.as_millis(),
                limit.as_millis()
            ),
        }
    }
}

/// The analysis phase a cancellation interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scan,
    Decompression,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Scan => write!(f, "scan"),
            Phase::Decompression => write!(f, "decompression"),
        }
    }
}

/// A non-fatal finding. Each one is local to a block or a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Issue {
    OversizedBlock {
        index: usize,
        size: u32,
        max: usize,
    },
    DecompressionFailure {
        index: usize,
        reason: DecompressionFailureReason,
    },
    BlockChecksumMismatch {
        index: usize,
        expected: u32,
        actual: u32,
    },
    ContentChecksumMismatch {
        expected: u32,
        actual: u32,
    },
    ContentSizeMismatch {
        declared: u64,
        actual: u64,
    },
    TrailingData {
        offset: u64,
        len: u64,
    },
    Cancelled {
        phase: Phase,
        next_block: usize,
    },
}

impl Issue {
    /// The block this issue belongs to, if it is local to one.
    pub fn block_index(&self) -> Option<usize> {
        match self {
            Issue::OversizedBlock { index, .. }
            | Issue::DecompressionFailure { index, .. }
            | Issue::BlockChecksumMismatch { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::OversizedBlock { index, size, max } => write!(
                f,
                "Block {index} is bigger than the maximum block size. Is: {size}, Should be at most: {max}"
            ),
            Issue::DecompressionFailure { index, reason } => {
                write!(f, "Block {index} could not be decompressed: {reason}")
            }
            Issue::BlockChecksumMismatch {
                index,
                expected,
                actual,
            } => write!(
                f,
                "Checksum of block {index} does not match. Stored: 0x{expected:08X}, Computed: 0x{actual:08X}"
            ),
            Issue::ContentChecksumMismatch { expected, actual } => write!(
                f,
                "Content checksum does not match. Stored: 0x{expected:08X}, Computed: 0x{actual:08X}"
            ),
            Issue::ContentSizeMismatch { declared, actual } => write!(
                f,
                "Decompressed size does not match the header. Declared: {declared}, Actual: {actual}"
            ),
            Issue::TrailingData { offset, len } => {
                write!(f, "{len} bytes of trailing data after the frame at offset {offset}")
            }
            Issue::Cancelled { phase, next_block } => {
                write!(f, "Cancelled during {phase} before block {next_block}")
            }
        }
    }
}
