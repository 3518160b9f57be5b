use crate::blocks::block::Block;
use crate::errors::{DecompressionFailureReason, Issue};
use std::time::{Duration, Instant};

/// The capability that turns one compressed LZ4 block back into its content.
///
/// The frame layer (sizes, flags, checksums) is handled by this crate; an implementation only
/// needs to understand the LZ4 block format.
pub trait BlockDecompressor: Sync {
    /// Decompress `compressed`, producing at most `max_output` bytes.
    ///
    /// `history` is the output preceding this block that matches may refer to: the previous
    /// blocks of a linked frame and/or the dictionary. It is empty for a plain independent block.
    fn decompress(
        &self,
        compressed: &[u8],
        history: &[u8],
        max_output: usize,
    ) -> Result<Vec<u8>, DecompressionFailureReason>;
}

/// A single byte of an LZ4 block never expands to more than this many bytes of output
const MAX_EXPANSION: usize = 255;

/// [`BlockDecompressor`] backed by the block API of `lz4_flex`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4BlockDecompressor;

impl BlockDecompressor for Lz4BlockDecompressor {
    fn decompress(
        &self,
        compressed: &[u8],
        history: &[u8],
        max_output: usize,
    ) -> Result<Vec<u8>, DecompressionFailureReason> {
        let bound = compressed.len().saturating_mul(MAX_EXPANSION).saturating_add(16);
        let mut output = vec![0u8; max_output.min(bound)];
        let written = if history.is_empty() {
            lz4_flex::block::decompress_into(compressed, &mut output)
        } else {
            lz4_flex::block::decompress_into_with_dict(compressed, &mut output, history)
        }
        .map_err(|e| DecompressionFailureReason::Corrupted(e.to_string()))?;
        output.truncate(written);
        output.shrink_to_fit();
        Ok(output)
    }
}

/// The limits a block is decoded under, derived from the frame header and the options.
#[derive(Debug, Clone, Copy)]
pub struct BlockLimits {
    pub max_block_size: usize,
    /// Reject blocks whose declared size is bigger than `max_block_size`
    pub strict_block_size: bool,
    pub timeout: Option<Duration>,
}

/// Produce the content of one block.
///
/// Uncompressed blocks are copied as they are, compressed blocks are handed to the
/// decompressor with `max_block_size` as the output bound.
pub fn decompress_block(
    block: &Block,
    body: &[u8],
    history: &[u8],
    limits: &BlockLimits,
    decompressor: &impl BlockDecompressor,
) -> Result<Vec<u8>, Issue> {
    if limits.strict_block_size && block.declared_size as usize > limits.max_block_size {
        return Err(Issue::OversizedBlock {
            index: block.index,
            size: block.declared_size,
            max: limits.max_block_size,
        });
    }

    if block.is_uncompressed() {
        return Ok(body.to_vec());
    }

    let start = Instant::now();
    let result = decompressor.decompress(body, history, limits.max_block_size);
    let elapsed = start.elapsed();

    let reason = match (result, limits.timeout) {
        (_, Some(limit)) if elapsed > limit => DecompressionFailureReason::Timeout { elapsed, limit },
        (Ok(output), _) => return Ok(output),
        (Err(reason), _) => reason,
    };
    log_warn!("block {} could not be decompressed: {}", block.index, reason);
    Err(Issue::DecompressionFailure {
        index: block.index,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::block::BlockType;

    fn block(index: usize, declared_size: u32, block_type: BlockType) -> Block {
        Block {
            index,
            file_offset: 0,
            declared_size,
            block_type,
            data_offset: 4,
            checksum: None,
        }
    }

    const LIMITS: BlockLimits = BlockLimits {
        max_block_size: 64 * 1024,
        strict_block_size: true,
        timeout: None,
    };

    #[test]
    fn uncompressed_is_identity() {
        let out = decompress_block(
            &block(0, 5, BlockType::Uncompressed),
            b"hello",
            &[],
            &LIMITS,
            &Lz4BlockDecompressor,
        )
        .unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn compressed_round_trip() {
        let data: Vec<u8> = b"abcabcabcabc".iter().cycle().take(5000).copied().collect();
        let compressed = lz4_flex::block::compress(&data);
        let out = decompress_block(
            &block(0, compressed.len() as u32, BlockType::Compressed),
            &compressed,
            &[],
            &LIMITS,
            &Lz4BlockDecompressor,
        )
        .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn output_bound_is_enforced() {
        let data = vec![0u8; 70 * 1024];
        let compressed = lz4_flex::block::compress(&data);
        let err = decompress_block(
            &block(2, compressed.len() as u32, BlockType::Compressed),
            &compressed,
            &[],
            &LIMITS,
            &Lz4BlockDecompressor,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Issue::DecompressionFailure {
                index: 2,
                reason: DecompressionFailureReason::Corrupted(_)
            }
        ));
    }

    #[test]
    fn oversized_uncompressed_block() {
        let body = vec![1u8; 64 * 1024 + 1];
        let err = decompress_block(
            &block(1, body.len() as u32, BlockType::Uncompressed),
            &body,
            &[],
            &LIMITS,
            &Lz4BlockDecompressor,
        )
        .unwrap_err();
        assert_eq!(
            err,
            Issue::OversizedBlock {
                index: 1,
                size: 64 * 1024 + 1,
                max: 64 * 1024
            }
        );

        let lenient = BlockLimits {
            strict_block_size: false,
            ..LIMITS
        };
        let out = decompress_block(
            &block(1, body.len() as u32, BlockType::Uncompressed),
            &body,
            &[],
            &lenient,
            &Lz4BlockDecompressor,
        )
        .unwrap();
        assert_eq!(out.len(), body.len());
    }

    #[test]
    fn garbage_is_reported_not_panicked() {
        let body = [0xF0u8, 0xFF, 0xFF, 0xFF, 0x01];
        let err = decompress_block(
            &block(0, body.len() as u32, BlockType::Compressed),
            &body,
            &[],
            &LIMITS,
            &Lz4BlockDecompressor,
        )
        .unwrap_err();
        assert!(matches!(err, Issue::DecompressionFailure { index: 0, .. }));
    }

    #[test]
    fn output_does_not_keep_the_bound() {
        let out = Lz4BlockDecompressor
            .decompress(&[0x10, b'a'], &[], 4 * 1024 * 1024)
            .unwrap();
        assert_eq!(out, b"a");
        assert!(out.capacity() < 1024);
    }

    #[test]
    fn history_is_used_for_back_references() {
        let dict = b"the quick brown fox jumps over the lazy dog".to_vec();
        let data = b"the lazy dog jumps over the quick brown fox".to_vec();
        let compressed = lz4_flex::block::compress_with_dict(&data, &dict);
        let decompressor = Lz4BlockDecompressor;
        assert_eq!(
            decompressor
                .decompress(&compressed, &dict, LIMITS.max_block_size)
                .unwrap(),
            data
        );
    }

    struct Slow;

    impl BlockDecompressor for Slow {
        fn decompress(
            &self,
            compressed: &[u8],
            _history: &[u8],
            _max_output: usize,
        ) -> Result<Vec<u8>, DecompressionFailureReason> {
            std::thread::sleep(Duration::from_millis(20));
            Ok(compressed.to_vec())
        }
    }

    #[test]
    fn timeout_is_a_decompression_failure() {
        let limits = BlockLimits {
            timeout: Some(Duration::from_millis(1)),
            ..LIMITS
        };
        let err = decompress_block(
            &block(4, 3, BlockType::Compressed),
            b"abc",
            &[],
            &limits,
            &Slow,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Issue::DecompressionFailure {
                index: 4,
                reason: DecompressionFailureReason::Timeout { .. }
            }
        ));
    }
}
