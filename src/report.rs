//! The read-only summary of one analysis.

use crate::blocks::block::Block;
use crate::checksum::CheckOutcome;
use crate::common::SAMPLE_LEN;
use crate::decoding::frame_analyzer::{DecodeOutcome, ScanOutcome};
use crate::errors::{FrameError, Issue, Phase, ReadFrameHeaderError};
use crate::frame::FrameHeader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecompressionOutcome {
    /// Decompression was disabled, or the analysis was cancelled before this block
    NotAttempted,
    Decompressed { size: usize },
    /// Either an `OversizedBlock` or a `DecompressionFailure`
    Failed(Issue),
}

/// The overall result, the worst outcome observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    /// The frame structure is intact but some checks failed or were cut short
    PartiallyValid(Vec<Issue>),
    Invalid(FrameError),
}

impl Verdict {
    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Ok)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Verdict::Invalid(_))
    }
}

/// One row of the block table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReport {
    pub block: Block,
    pub checksum: CheckOutcome,
    pub decompression: DecompressionOutcome,
    /// The first bytes of the body as stored
    pub sample: Vec<u8>,
}

impl BlockReport {
    pub fn decompressed_size(&self) -> Option<usize> {
        match self.decompression {
            DecompressionOutcome::Decompressed { size } => Some(size),
            _ => None,
        }
    }

    /// Decompressed size divided by the stored size.
    pub fn ratio(&self) -> Option<f64> {
        let size = self.decompressed_size()?;
        if self.block.declared_size == 0 {
            return None;
        }
        Some(size as f64 / f64::from(self.block.declared_size))
    }

    /// The best ratio a compressed block of this size could have, given the maximum block size.
    pub fn max_ratio(&self, max_block_size: usize) -> Option<f64> {
        if self.block.is_uncompressed() || self.block.declared_size == 0 {
            return None;
        }
        Some(max_block_size as f64 / f64::from(self.block.declared_size))
    }
}

/// Aggregates over the stored block sizes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockStats {
    pub count: usize,
    pub compressed: usize,
    pub uncompressed: usize,
    pub total_size: u64,
    pub min_size: Option<u32>,
    pub max_size: Option<u32>,
    /// Sum of the outputs of all blocks that were decompressed successfully
    pub decompressed_total: u64,
}

impl BlockStats {
    fn from_blocks(blocks: &[BlockReport]) -> Self {
        let mut stats = BlockStats::default();
        for report in blocks {
            let size = report.block.declared_size;
            stats.count += 1;
            if report.block.is_uncompressed() {
                stats.uncompressed += 1;
            } else {
                stats.compressed += 1;
            }
            stats.total_size += u64::from(size);
            stats.min_size = Some(stats.min_size.map_or(size, |min| min.min(size)));
            stats.max_size = Some(stats.max_size.map_or(size, |max| max.max(size)));
            stats.decompressed_total += report.decompressed_size().unwrap_or(0) as u64;
        }
        stats
    }

    pub fn average_size(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total_size as f64 / self.count as f64)
        }
    }
}

/// Everything an analysis found out about one input.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticReport {
    pub input_len: u64,
    pub magic_valid: bool,
    /// `None` if the header could not be parsed
    pub header: Option<FrameHeader>,
    pub blocks: Vec<BlockReport>,
    pub stats: BlockStats,
    /// Offset where the frame ends, if the scan reached the end mark
    pub frame_end: Option<u64>,
    /// Total size of the decompressed content, if every block could be decompressed
    pub decompressed_size: Option<u64>,
    pub content_checksum: CheckOutcome,
    /// The decompressed content, if requested and available
    pub content: Option<Vec<u8>>,
    /// Every non-fatal finding, in the order they were found
    pub issues: Vec<Issue>,
    pub verdict: Verdict,
}

impl DiagnosticReport {
    pub fn declared_content_size(&self) -> Option<u64> {
        self.header.as_ref().and_then(FrameHeader::content_size)
    }

    pub fn fatal_error(&self) -> Option<&FrameError> {
        match &self.verdict {
            Verdict::Invalid(e) => Some(e),
            _ => None,
        }
    }

    /// Decompressed size divided by the input size.
    pub fn compression_ratio(&self) -> Option<f64> {
        ratio(self.decompressed_size?, self.input_len)
    }

    /// The size declared in the header divided by the input size.
    pub fn declared_ratio(&self) -> Option<f64> {
        ratio(self.declared_content_size()?, self.input_len)
    }
}

fn ratio(content: u64, input_len: u64) -> Option<f64> {
    if input_len == 0 {
        None
    } else {
        Some(content as f64 / input_len as f64)
    }
}

/// Summarize the results of both phases. This never fails, it only reports what the phases
/// found, also if they stopped early.
pub fn build_report(input: &[u8], scan: ScanOutcome, decoded: DecodeOutcome) -> DiagnosticReport {
    let input_len = input.len() as u64;
    let magic_valid = !matches!(
        scan.fatal,
        Some(FrameError::Header(ReadFrameHeaderError::InvalidMagic { .. }))
            | Some(FrameError::Header(ReadFrameHeaderError::SkippableFrame { .. }))
    );

    let mut issues = Vec::new();
    let (header, blocks, frame_end) = match scan.frame {
        Some(frame) => {
            let blocks: Vec<BlockReport> = frame
                .blocks
                .iter()
                .zip(decoded.blocks)
                .map(|(block, outcome)| {
                    let start = block.data_offset as usize;
                    let end = (start + SAMPLE_LEN.min(block.declared_size as usize)).min(input.len());
                    BlockReport {
                        block: *block,
                        checksum: outcome.checksum,
                        decompression: outcome.decompression,
                        sample: input.get(start..end).unwrap_or(&[]).to_vec(),
                    }
                })
                .collect();
            (Some(frame.header), blocks, frame.end_offset)
        }
        None => (None, Vec::new(), None),
    };

    for report in &blocks {
        if let DecompressionOutcome::Failed(issue) = &report.decompression {
            issues.push(issue.clone());
        }
        if let CheckOutcome::Checked(check) = report.checksum {
            if !check.passed() {
                issues.push(Issue::BlockChecksumMismatch {
                    index: report.block.index,
                    expected: check.expected,
                    actual: check.actual,
                });
            }
        }
    }

    if let CheckOutcome::Checked(check) = decoded.content_checksum {
        if !check.passed() {
            issues.push(Issue::ContentChecksumMismatch {
                expected: check.expected,
                actual: check.actual,
            });
        }
    }

    let declared = header.as_ref().and_then(FrameHeader::content_size);
    if let (Some(declared), Some(actual)) = (declared, decoded.decompressed_size) {
        if declared != actual {
            issues.push(Issue::ContentSizeMismatch { declared, actual });
        }
    }

    if let Some(end) = frame_end {
        if end < input_len {
            issues.push(Issue::TrailingData {
                offset: end,
                len: input_len - end,
            });
        }
    }

    if let Some(next_block) = scan.cancelled_at {
        issues.push(Issue::Cancelled {
            phase: Phase::Scan,
            next_block,
        });
    } else if let Some(next_block) = decoded.cancelled_at {
        issues.push(Issue::Cancelled {
            phase: Phase::Decompression,
            next_block,
        });
    }

    let verdict = match scan.fatal {
        Some(fatal) => Verdict::Invalid(fatal),
        None if !issues.is_empty() => Verdict::PartiallyValid(issues.clone()),
        None => Verdict::Ok,
    };

    let stats = BlockStats::from_blocks(&blocks);
    log_debug!(
        "analysed {} bytes: {} blocks, {} issues, ok: {}",
        input_len,
        stats.count,
        issues.len(),
        verdict.is_ok()
    );

    DiagnosticReport {
        input_len,
        magic_valid,
        header,
        blocks,
        stats,
        frame_end,
        decompressed_size: decoded.decompressed_size,
        content_checksum: decoded.content_checksum,
        content: decoded.content,
        issues,
        verdict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::block::BlockType;

    fn block_report(index: usize, declared_size: u32, block_type: BlockType, out: usize) -> BlockReport {
        BlockReport {
            block: Block {
                index,
                file_offset: 0,
                declared_size,
                block_type,
                data_offset: 4,
                checksum: None,
            },
            checksum: CheckOutcome::NotPresent,
            decompression: DecompressionOutcome::Decompressed { size: out },
            sample: Vec::new(),
        }
    }

    #[test]
    fn stats_over_blocks() {
        let blocks = [
            block_report(0, 100, BlockType::Compressed, 400),
            block_report(1, 50, BlockType::Uncompressed, 50),
            block_report(2, 300, BlockType::Compressed, 1000),
        ];
        let stats = BlockStats::from_blocks(&blocks);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.compressed, 2);
        assert_eq!(stats.uncompressed, 1);
        assert_eq!(stats.total_size, 450);
        assert_eq!(stats.min_size, Some(50));
        assert_eq!(stats.max_size, Some(300));
        assert_eq!(stats.average_size(), Some(150.0));
        assert_eq!(stats.decompressed_total, 1450);

        assert_eq!(BlockStats::from_blocks(&[]).average_size(), None);
    }

    #[test]
    fn block_ratios() {
        let compressed = block_report(0, 100, BlockType::Compressed, 400);
        assert_eq!(compressed.ratio(), Some(4.0));
        assert_eq!(compressed.max_ratio(65536), Some(655.36));

        let uncompressed = block_report(1, 50, BlockType::Uncompressed, 50);
        assert_eq!(uncompressed.ratio(), Some(1.0));
        assert_eq!(uncompressed.max_ratio(65536), None);
    }

    #[test]
    fn header_failure_report() {
        let scan = ScanOutcome {
            frame: None,
            fatal: Some(FrameError::Header(ReadFrameHeaderError::InvalidMagic {
                found: None,
            })),
            cancelled_at: None,
        };
        let report = build_report(&[], scan, DecodeOutcome::default());
        assert!(!report.magic_valid);
        assert!(report.header.is_none());
        assert!(report.blocks.is_empty());
        assert!(report.verdict.is_invalid());
        assert_eq!(report.compression_ratio(), None);
        assert_eq!(report.stats, BlockStats::default());
    }
}
