//! Structures and utilities used for decoding the blocks of a scanned frame
//! and assembling the diagnostics.

pub mod block_decoder;
pub mod frame_analyzer;
