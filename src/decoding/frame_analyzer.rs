//! Drives the two phases of an analysis.
//!
//! 1. The structural scan parses the header and walks the block sequence. It is sequential
//!    because every block's offset depends on the size of the one before it.
//! 2. The decode phase verifies block checksums and decompresses every block found, even if the
//!    scan stopped early. With independent blocks this runs on the rayon pool, linked blocks are
//!    decoded in order because each one may refer to the output of its predecessors.

use crate::blocks::block::Block;
use crate::blocks::block_iter::BlockIter;
use crate::checksum::{self, CheckOutcome, ContentHasher};
use crate::common::WINDOW_SIZE;
use crate::decoding::block_decoder::{
    decompress_block, BlockDecompressor, BlockLimits, Lz4BlockDecompressor,
};
use crate::errors::FrameError;
use crate::frame::{read_frame_header, Frame};
use crate::io::Cursor;
use crate::report::{build_report, DecompressionOutcome, DiagnosticReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Lets a caller stop an analysis at the next block boundary.
///
/// Clones share the same flag, so one clone can be handed to the analyzer and another kept
/// by whoever decides to cancel.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Controls what an analysis does beyond the structural scan.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Decompress every block. Without this only the structure and block checksums are checked.
    pub decompress: bool,
    /// Verify block and content checksums where the frame carries them
    pub verify_checksums: bool,
    /// Report blocks bigger than the frame's maximum block size as `OversizedBlock`
    pub strict_block_size: bool,
    /// Decode independent blocks on the rayon pool. Ignored without the `parallel` feature.
    pub parallel: bool,
    pub block_timeout: Option<Duration>,
    /// Content preceding the first block, for frames compressed with a dictionary
    pub dictionary: Option<Vec<u8>>,
    /// Keep the decompressed content in the report
    pub keep_content: bool,
    pub cancel: Option<CancelFlag>,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            decompress: true,
            verify_checksums: true,
            strict_block_size: true,
            parallel: true,
            block_timeout: None,
            dictionary: None,
            keep_content: false,
            cancel: None,
        }
    }
}

impl AnalyzerOptions {
    pub fn with_decompression(mut self, decompress: bool) -> Self {
        self.decompress = decompress;
        self
    }

    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn with_strict_block_size(mut self, strict: bool) -> Self {
        self.strict_block_size = strict;
        self
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = Some(timeout);
        self
    }

    pub fn with_dictionary(mut self, dictionary: Vec<u8>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn with_content(mut self, keep: bool) -> Self {
        self.keep_content = keep;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// What the structural scan found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// `None` if the header could not be parsed
    pub frame: Option<Frame>,
    pub fatal: Option<FrameError>,
    /// Index of the first block that was not scanned because the analysis was cancelled
    pub cancelled_at: Option<usize>,
}

/// The decode phase result for a single block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    pub checksum: CheckOutcome,
    pub decompression: DecompressionOutcome,
    output: Option<Vec<u8>>,
}

impl BlockOutcome {
    fn not_attempted(block: &Block) -> Self {
        BlockOutcome {
            checksum: if block.checksum.is_some() {
                CheckOutcome::Skipped
            } else {
                CheckOutcome::NotPresent
            },
            decompression: DecompressionOutcome::NotAttempted,
            output: None,
        }
    }
}

/// What the decode phase found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOutcome {
    /// One entry per scanned block, in block order
    pub blocks: Vec<BlockOutcome>,
    pub content_checksum: CheckOutcome,
    /// Sum of all block outputs, only if every block was decompressed
    pub decompressed_size: Option<u64>,
    pub content: Option<Vec<u8>>,
    /// Index of the first block skipped because the analysis was cancelled
    pub cancelled_at: Option<usize>,
}

/// Blocks per rayon thread decoded before their outputs are hashed and dropped
#[cfg(feature = "parallel")]
const PARALLEL_WINDOW_PER_THREAD: usize = 4;

/// Receives block outputs in block order and folds them into the content checksum.
struct ContentSink {
    hasher: ContentHasher,
    /// Only kept if requested, dropped as soon as a block has no output
    content: Option<Vec<u8>>,
    /// Every block so far produced output
    complete: bool,
}

impl ContentSink {
    fn new(keep_content: bool) -> Self {
        ContentSink {
            hasher: ContentHasher::new(),
            content: keep_content.then(Vec::new),
            complete: true,
        }
    }

    /// Takes the output out of `outcome`.
    fn absorb(&mut self, outcome: &mut BlockOutcome) {
        match outcome.output.take() {
            Some(output) if self.complete => {
                self.hasher.update(&output);
                if let Some(content) = &mut self.content {
                    content.extend_from_slice(&output);
                }
            }
            Some(_) => {}
            None => {
                self.complete = false;
                self.content = None;
            }
        }
    }
}

/// Analyses LZ4 frames and produces a [`DiagnosticReport`] for each.
///
/// # Examples
/// ```
/// use lz4scan::{AnalyzerOptions, FrameAnalyzer, Verdict};
///
/// let analyzer = FrameAnalyzer::with_options(AnalyzerOptions::default().with_content(true));
/// let frame: &[u8] = &[
///     0x04, 0x22, 0x4D, 0x18, 0x60, 0x40, 0x82,
///     0x03, 0x00, 0x00, 0x80, b'a', b'b', b'c',
///     0x00, 0x00, 0x00, 0x00,
/// ];
/// let report = analyzer.analyze(frame);
/// assert_eq!(report.verdict, Verdict::Ok);
/// assert_eq!(report.content.as_deref(), Some(&b"abc"[..]));
/// ```
pub struct FrameAnalyzer<D: BlockDecompressor = Lz4BlockDecompressor> {
    options: AnalyzerOptions,
    decompressor: D,
}

impl FrameAnalyzer<Lz4BlockDecompressor> {
    /// An analyzer with the default options, decompressing with `lz4_flex`
    pub fn new() -> Self {
        Self::with_options(AnalyzerOptions::default())
    }

    pub fn with_options(options: AnalyzerOptions) -> Self {
        Self {
            options,
            decompressor: Lz4BlockDecompressor,
        }
    }
}

impl Default for FrameAnalyzer<Lz4BlockDecompressor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: BlockDecompressor> FrameAnalyzer<D> {
    /// Use a custom implementation of LZ4 block decompression
    pub fn new_with_decompressor(decompressor: D, options: AnalyzerOptions) -> Self {
        Self {
            options,
            decompressor,
        }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Scan, decode and summarize `input`. Never fails, every problem ends up in the report.
    pub fn analyze(&self, input: &[u8]) -> DiagnosticReport {
        let scan = self.scan(input);
        let decoded = match &scan.frame {
            Some(frame) => self.decode(input, frame),
            None => DecodeOutcome::default(),
        };
        build_report(input, scan, decoded)
    }

    fn is_cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .is_some_and(CancelFlag::is_cancelled)
    }

    /// Parse the header and find all blocks, stopping at the first fatal error.
    pub fn scan(&self, input: &[u8]) -> ScanOutcome {
        let mut source = Cursor::new(input);
        let header = match read_frame_header(&mut source) {
            Ok((header, _)) => header,
            Err(e) => {
                log_warn!("not a valid frame header: {}", e);
                return ScanOutcome {
                    frame: None,
                    fatal: Some(e.into()),
                    cancelled_at: None,
                };
            }
        };

        let descriptor = header.descriptor;
        let mut frame = Frame::new(header);
        let outcome = |frame: Frame, fatal: Option<FrameError>, cancelled_at: Option<usize>| ScanOutcome {
            frame: Some(frame),
            fatal,
            cancelled_at,
        };

        let mut iter = match BlockIter::new(source, descriptor) {
            Ok(iter) => iter,
            Err(e) => return outcome(frame, Some(e.into()), None),
        };

        loop {
            if self.is_cancelled() {
                log_debug!("scan cancelled before block {}", iter.blocks_found());
                let next = iter.blocks_found();
                return outcome(frame, None, Some(next));
            }
            match iter.next() {
                Some(Ok(block)) => frame.blocks.push(block),
                Some(Err(e)) => {
                    log_warn!("block scan stopped: {}", e);
                    return outcome(frame, Some(e.into()), None);
                }
                None => break,
            }
        }

        match iter.read_content_checksum() {
            Ok(content_checksum) => {
                frame.content_checksum = content_checksum;
                frame.end_offset = Some(iter.offset());
                outcome(frame, None, None)
            }
            Err(e) => outcome(frame, Some(e.into()), None),
        }
    }

    fn limits(&self, frame: &Frame) -> BlockLimits {
        BlockLimits {
            max_block_size: frame.header.max_block_size(),
            strict_block_size: self.options.strict_block_size,
            timeout: self.options.block_timeout,
        }
    }

    /// The tail of the dictionary that blocks may refer to. Empty unless the frame was
    /// compressed with a dictionary.
    fn dictionary(&self, frame: &Frame) -> &[u8] {
        if !frame.header.descriptor.dict_id_flag() {
            return &[];
        }
        match self.options.dictionary.as_deref() {
            Some(dict) => &dict[dict.len().saturating_sub(WINDOW_SIZE)..],
            None => &[],
        }
    }

    /// Verify checksums and decompress every block of a (possibly incomplete) scanned frame.
    ///
    /// Block outputs are hashed in block order as they are produced and dropped right after,
    /// unless the content is kept.
    pub fn decode(&self, input: &[u8], frame: &Frame) -> DecodeOutcome {
        let limits = self.limits(frame);
        let dictionary = self.dictionary(frame);
        let independent = frame.header.descriptor.block_independence();
        let mut sink = ContentSink::new(self.options.keep_content);

        let results = if independent && self.options.parallel {
            self.decode_parallel(input, &frame.blocks, &limits, dictionary, &mut sink)
        } else {
            self.decode_sequential(input, &frame.blocks, &limits, dictionary, !independent, &mut sink)
        };

        let cancelled_at = results.iter().position(Option::is_none);
        let blocks: Vec<BlockOutcome> = results
            .into_iter()
            .zip(&frame.blocks)
            .map(|(result, block)| result.unwrap_or_else(|| BlockOutcome::not_attempted(block)))
            .collect();

        let all_decoded = frame.is_complete() && cancelled_at.is_none() && sink.complete;
        let (decompressed_size, content) = if all_decoded {
            (Some(sink.hasher.len()), sink.content.take())
        } else {
            (None, None)
        };

        let content_checksum = if !frame.header.descriptor.content_checksum_flag() {
            CheckOutcome::NotPresent
        } else {
            match frame.content_checksum {
                Some(stored) if all_decoded && self.options.verify_checksums => {
                    CheckOutcome::Checked(sink.hasher.verify(stored))
                }
                _ => CheckOutcome::Skipped,
            }
        };

        DecodeOutcome {
            blocks,
            content_checksum,
            decompressed_size,
            content,
            cancelled_at,
        }
    }

    /// Decodes windows of blocks on the rayon pool, so only a bounded number of block outputs
    /// is alive at any time.
    #[cfg(feature = "parallel")]
    fn decode_parallel(
        &self,
        input: &[u8],
        blocks: &[Block],
        limits: &BlockLimits,
        dictionary: &[u8],
        sink: &mut ContentSink,
    ) -> Vec<Option<BlockOutcome>> {
        use rayon::prelude::*;

        let window = rayon::current_num_threads().max(1) * PARALLEL_WINDOW_PER_THREAD;
        let mut results = Vec::with_capacity(blocks.len());
        for chunk in blocks.chunks(window) {
            let mut decoded: Vec<Option<BlockOutcome>> = chunk
                .par_iter()
                .map(|block| {
                    if self.is_cancelled() {
                        None
                    } else {
                        Some(self.decode_block(input, block, dictionary, limits))
                    }
                })
                .collect();
            for outcome in decoded.iter_mut().flatten() {
                sink.absorb(outcome);
            }
            results.extend(decoded);
        }
        results
    }

    #[cfg(not(feature = "parallel"))]
    fn decode_parallel(
        &self,
        input: &[u8],
        blocks: &[Block],
        limits: &BlockLimits,
        dictionary: &[u8],
        sink: &mut ContentSink,
    ) -> Vec<Option<BlockOutcome>> {
        self.decode_sequential(input, blocks, limits, dictionary, false, sink)
    }

    fn decode_sequential(
        &self,
        input: &[u8],
        blocks: &[Block],
        limits: &BlockLimits,
        dictionary: &[u8],
        linked: bool,
        sink: &mut ContentSink,
    ) -> Vec<Option<BlockOutcome>> {
        let mut history = dictionary.to_vec();
        let mut results = Vec::with_capacity(blocks.len());

        for block in blocks {
            if self.is_cancelled() {
                log_debug!("decoding cancelled before block {}", block.index);
                break;
            }
            let mut outcome = self.decode_block(input, block, &history, limits);
            if linked {
                match &outcome.output {
                    Some(output) => {
                        history.extend_from_slice(output);
                        if history.len() > WINDOW_SIZE {
                            history.drain(..history.len() - WINDOW_SIZE);
                        }
                    }
                    // The following blocks can not be trusted to find their references
                    None => history.clear(),
                }
            }
            sink.absorb(&mut outcome);
            results.push(Some(outcome));
        }

        results.resize_with(blocks.len(), || None);
        results
    }

    fn decode_block(
        &self,
        input: &[u8],
        block: &Block,
        history: &[u8],
        limits: &BlockLimits,
    ) -> BlockOutcome {
        let body = input.get(block.data_range()).unwrap_or(&[]);

        let checksum = match block.checksum {
            None => CheckOutcome::NotPresent,
            Some(_) if !self.options.verify_checksums => CheckOutcome::Skipped,
            Some(stored) => CheckOutcome::Checked(checksum::verify_block(block.index, body, stored)),
        };

        if !self.options.decompress {
            return BlockOutcome {
                checksum,
                decompression: DecompressionOutcome::NotAttempted,
                output: None,
            };
        }

        match decompress_block(block, body, history, limits, &self.decompressor) {
            Ok(output) => BlockOutcome {
                checksum,
                decompression: DecompressionOutcome::Decompressed { size: output.len() },
                output: Some(output),
            },
            Err(issue) => BlockOutcome {
                checksum,
                decompression: DecompressionOutcome::Failed(issue),
                output: None,
            },
        }
    }
}
