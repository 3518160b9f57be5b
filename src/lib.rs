//! A structural validator and diagnostic decoder for the LZ4 frame format.
//!
//! The crate walks an LZ4 frame the same way a decoder would, but instead of only producing the
//! decompressed bytes it produces a [`DiagnosticReport`]: the parsed header, a table of every
//! block with its offsets and checksum/decompression verdicts, aggregate size statistics and an
//! overall [`Verdict`].
//!
//! The actual LZ4 block decompression is delegated to a [`BlockDecompressor`], by default
//! [`Lz4BlockDecompressor`] which is backed by the `lz4_flex` crate.
//!
//! # Example
//! ```
//! use lz4scan::{FrameAnalyzer, Verdict};
//!
//! let frame: &[u8] = &[
//!     0x04, 0x22, 0x4D, 0x18, // magic
//!     0x60, 0x40, 0x82, // FLG, BD, header checksum
//!     0x05, 0x00, 0x00, 0x80, b'h', b'e', b'l', b'l', b'o', // one uncompressed block
//!     0x00, 0x00, 0x00, 0x00, // end mark
//! ];
//! let report = FrameAnalyzer::new().analyze(frame);
//! assert_eq!(report.verdict, Verdict::Ok);
//! assert_eq!(report.blocks.len(), 1);
//! ```
#![deny(trivial_casts, trivial_numeric_casts, rust_2018_idioms)]

// Without the `tracing` feature the arguments are still type checked but never formatted
macro_rules! log_debug {
    ($($x:tt)*) => {
        #[cfg(feature = "tracing")]
        tracing::debug!($($x)*);
        #[cfg(not(feature = "tracing"))]
        if false {
            let _ = format_args!($($x)*);
        }
    }
}

macro_rules! log_warn {
    ($($x:tt)*) => {
        #[cfg(feature = "tracing")]
        tracing::warn!($($x)*);
        #[cfg(not(feature = "tracing"))]
        if false {
            let _ = format_args!($($x)*);
        }
    }
}

pub mod blocks;
pub mod checksum;
pub mod common;
pub mod decoding;
pub mod errors;
pub mod frame;
pub mod io;
pub mod report;
#[cfg(test)]
mod tests;

pub use blocks::block::Block;
pub use blocks::block_iter::BlockIter;
pub use decoding::block_decoder::{BlockDecompressor, Lz4BlockDecompressor};
pub use decoding::frame_analyzer::{AnalyzerOptions, CancelFlag, FrameAnalyzer};
pub use errors::{FrameError, Issue};
pub use frame::{read_frame_header, FrameDescriptor, FrameHeader};
pub use report::{DiagnosticReport, Verdict};
