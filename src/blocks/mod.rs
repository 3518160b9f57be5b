//! In a frame the header is followed by a sequence of blocks, each prefixed by a 4 byte size
//! word and optionally followed by a 4 byte checksum. A zero size word ends the sequence.
//!
//! This module contains the types describing a block and the iterator finding them.

pub mod block;
pub mod block_iter;
