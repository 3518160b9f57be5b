
use crate::checksum::CheckOutcome;
use crate::errors::{FrameError, Issue, ReadFrameHeaderError, ScanError};
use crate::report::{DecompressionOutcome, Verdict};
use crate::{AnalyzerOptions, FrameAnalyzer};
use frame_builder::FrameBuilder;

#[test]
fn test_hello_world() {
    let mut frame = vec![0x04, 0x22, 0x4D, 0x18, 0x60, 0x40, 0x82];
    frame.extend_from_slice(&(11u32 | 1 << 31).to_le_bytes());
    frame.extend_from_slice(b"Hello World");
    frame.extend_from_slice(&[0, 0, 0, 0]);

    let analyzer = FrameAnalyzer::with_options(AnalyzerOptions::default().with_content(true));
    let report = analyzer.analyze(&frame);

    assert_eq!(report.verdict, Verdict::Ok);
    assert!(report.magic_valid);
    assert_eq!(report.blocks.len(), 1);
    let block = &report.blocks[0];
    assert!(block.block.is_uncompressed());
    assert_eq!(block.block.declared_size, 11);
    assert_eq!(block.block.file_offset, 7);
    assert_eq!(block.block.data_offset, 11);
    assert_eq!(block.sample, b"Hello World");
    assert_eq!(
        block.decompression,
        DecompressionOutcome::Decompressed { size: 11 }
    );
    assert_eq!(report.content.as_deref(), Some(&b"Hello World"[..]));
    assert_eq!(report.decompressed_size, Some(11));
    assert_eq!(report.frame_end, Some(frame.len() as u64));
    assert_eq!(report.content_checksum, CheckOutcome::NotPresent);
    assert_eq!(report.stats.uncompressed, 1);
}

#[test]
fn test_empty_input() {
    let report = FrameAnalyzer::new().analyze(&[]);
    assert_eq!(
        report.verdict,
        Verdict::Invalid(FrameError::Header(ReadFrameHeaderError::InvalidMagic {
            found: None
        }))
    );
    assert!(!report.magic_valid);
    assert_eq!(report.input_len, 0);
}

#[test]
fn test_bit_flip_in_body() {
    let built = FrameBuilder::new()
        .block_checksums(true)
        .content_checksum(true)
        .uncompressed_block(&[0xAA; 300])
        .compressed_block(&[7u8; 1000])
        .uncompressed_block(&[0x55; 200])
        .build();
    let analyzer = FrameAnalyzer::with_options(AnalyzerOptions::default().with_content(true));
    let report = analyzer.analyze(&built.bytes);
    assert_eq!(report.verdict, Verdict::Ok);
    assert_eq!(report.content.as_deref(), Some(built.content.as_slice()));

    for target in 0..3 {
        let mut bytes = built.bytes.clone();
        let body_start = built.size_word_offsets[target] as usize + 4;
        bytes[body_start] ^= 0x01;

        let report = FrameAnalyzer::new().analyze(&bytes);
        let mismatched: Vec<usize> = report
            .issues
            .iter()
            .filter_map(|issue| match issue {
                Issue::BlockChecksumMismatch { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(mismatched, vec![target]);
        assert!(report.blocks[target].checksum.failed());
        assert!(matches!(report.verdict, Verdict::PartiallyValid(_)));
    }
}

#[test]
fn test_many_tiny_blocks() {
    // 4MiB maximum block size, but every block decompresses to a single byte
    let mut builder = FrameBuilder::new().block_max_code(7).content_checksum(true);
    for i in 0..20_000u32 {
        builder = builder.compressed_block(&[b'a' + (i % 26) as u8]);
    }
    let built = builder.build();

    for parallel in [false, true] {
        let options = AnalyzerOptions::default()
            .with_parallelism(parallel)
            .with_content(true);
        let report = FrameAnalyzer::with_options(options).analyze(&built.bytes);
        assert_eq!(report.verdict, Verdict::Ok);
        assert_eq!(report.stats.count, 20_000);
        assert_eq!(report.decompressed_size, Some(20_000));
        assert_eq!(report.content.as_deref(), Some(built.content.as_slice()));
    }
}

#[test]
fn test_flg_flip_breaks_header_checksum() {
    let built = FrameBuilder::new()
        .block_checksums(true)
        .content_checksum(true)
        .uncompressed_block(b"some data")
        .build();

    for bit in [2, 4, 5] {
        let mut bytes = built.bytes.clone();
        bytes[4] ^= 1 << bit;
        let report = FrameAnalyzer::new().analyze(&bytes);
        assert!(
            matches!(
                report.verdict,
                Verdict::Invalid(FrameError::Header(
                    ReadFrameHeaderError::HeaderChecksumMismatch { .. }
                ))
            ),
            "bit {bit}: {:?}",
            report.verdict
        );
        assert!(report.blocks.is_empty());
        assert!(report.header.is_none());
        assert!(report.magic_valid);
    }
}

#[test]
fn test_truncation_offsets() {
    let built = FrameBuilder::new()
        .block_checksums(true)
        .content_checksum(true)
        .uncompressed_block(b"first block")
        .compressed_block(&[3u8; 500])
        .uncompressed_block(b"third")
        .build();
    let header_len = built.size_word_offsets[0] as usize;
    let checksum_offset = built.end_mark_offset + 4;

    for cut in header_len..built.bytes.len() {
        let report = FrameAnalyzer::new().analyze(&built.bytes[..cut]);
        let expected = if (cut as u64) < checksum_offset {
            built
                .size_word_offsets
                .iter()
                .copied()
                .find(|&b| b + 4 > cut as u64)
        } else {
            Some(checksum_offset)
        };
        let fatal = report.fatal_error().expect("truncated frame must be invalid");
        assert_eq!(fatal.truncation_offset(), expected, "cut at {cut}");
        assert!(matches!(
            fatal,
            FrameError::Scan(ScanError::UnexpectedEndOfInput { .. })
        ));

        // Every block that fit completely is still reported
        let complete = built.size_word_offsets[1..]
            .iter()
            .filter(|&&b| b <= cut as u64)
            .count();
        assert_eq!(report.blocks.len(), complete, "cut at {cut}");
    }
}

#[test]
fn test_content_size_mismatch() {
    let built = FrameBuilder::new()
        .content_size(99)
        .uncompressed_block(b"hello")
        .build();
    let report = FrameAnalyzer::new().analyze(&built.bytes);
    assert_eq!(report.declared_content_size(), Some(99));
    assert_eq!(
        report.verdict,
        Verdict::PartiallyValid(vec![Issue::ContentSizeMismatch {
            declared: 99,
            actual: 5
        }])
    );

    let built = FrameBuilder::new()
        .content_size(5)
        .uncompressed_block(b"hello")
        .build();
    let report = FrameAnalyzer::new().analyze(&built.bytes);
    assert_eq!(report.verdict, Verdict::Ok);
    assert_eq!(report.declared_ratio(), Some(5.0 / built.bytes.len() as f64));
}

#[test]
fn test_trailing_data() {
    let built = FrameBuilder::new()
        .content_checksum(true)
        .uncompressed_block(b"hello")
        .build();
    let mut bytes = built.bytes.clone();
    bytes.extend_from_slice(b"garbage");

    let report = FrameAnalyzer::new().analyze(&bytes);
    assert_eq!(
        report.verdict,
        Verdict::PartiallyValid(vec![Issue::TrailingData {
            offset: built.bytes.len() as u64,
            len: 7
        }])
    );
    assert!(matches!(
        report.content_checksum,
        CheckOutcome::Checked(check) if check.passed()
    ));
}

#[test]
fn test_skippable_frame() {
    let mut bytes = 0x184D_2A53u32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&3u32.to_le_bytes());
    bytes.extend_from_slice(b"abc");

    let report = FrameAnalyzer::new().analyze(&bytes);
    let fatal = report.fatal_error().unwrap();
    assert!(fatal.is_not_a_frame());
    assert_eq!(
        fatal,
        &FrameError::Header(ReadFrameHeaderError::SkippableFrame {
            magic: 0x184D_2A53,
            size: 3
        })
    );
    assert!(!report.magic_valid);
}

#[test]
fn test_structure_only() {
    let built = FrameBuilder::new()
        .block_checksums(true)
        .content_checksum(true)
        .compressed_block(&[1u8; 4000])
        .uncompressed_block(b"tail")
        .build();
    let analyzer = FrameAnalyzer::with_options(AnalyzerOptions::default().with_decompression(false));
    let report = analyzer.analyze(&built.bytes);

    assert_eq!(report.verdict, Verdict::Ok);
    assert_eq!(report.content_checksum, CheckOutcome::Skipped);
    assert_eq!(report.decompressed_size, None);
    assert_eq!(report.compression_ratio(), None);
    for block in &report.blocks {
        assert_eq!(block.decompression, DecompressionOutcome::NotAttempted);
        assert!(matches!(block.checksum, CheckOutcome::Checked(c) if c.passed()));
    }
}

#[test]
fn test_without_checksum_verification() {
    let built = FrameBuilder::new()
        .block_checksums(true)
        .uncompressed_block(b"abcdef")
        .build();
    let mut bytes = built.bytes.clone();
    bytes[built.size_word_offsets[0] as usize + 4] ^= 0xFF;

    let analyzer =
        FrameAnalyzer::with_options(AnalyzerOptions::default().with_checksum_verification(false));
    let report = analyzer.analyze(&bytes);
    assert_eq!(report.verdict, Verdict::Ok);
    assert_eq!(report.blocks[0].checksum, CheckOutcome::Skipped);
}

#[test]
fn test_corrupt_block_does_not_stop_siblings() {
    let built = FrameBuilder::new()
        .content_checksum(true)
        .compressed_block(&[9u8; 2000])
        .raw_block(4, &[0xFF, 0xFF, 0xFF, 0xFF])
        .compressed_block(&[8u8; 2000])
        .build();
    let report = FrameAnalyzer::new().analyze(&built.bytes);

    assert!(matches!(
        report.blocks[1].decompression,
        DecompressionOutcome::Failed(Issue::DecompressionFailure { index: 1, .. })
    ));
    assert_eq!(
        report.blocks[0].decompression,
        DecompressionOutcome::Decompressed { size: 2000 }
    );
    assert_eq!(
        report.blocks[2].decompression,
        DecompressionOutcome::Decompressed { size: 2000 }
    );
    assert_eq!(report.content_checksum, CheckOutcome::Skipped);
    assert_eq!(report.decompressed_size, None);
    assert_eq!(report.stats.decompressed_total, 4000);
    assert!(matches!(report.verdict, Verdict::PartiallyValid(ref issues) if issues.len() == 1));
}

#[test]
fn test_dictionary_frame() {
    let dict: Vec<u8> = (0..2000u32).map(|i| (i * 31 % 253) as u8).collect();
    let data = dict[500..1500].to_vec();
    let built = FrameBuilder::new()
        .dict_id(0xCAFE)
        .content_checksum(true)
        .compressed_block_with_dict(&data, &dict)
        .build();

    let analyzer = FrameAnalyzer::with_options(
        AnalyzerOptions::default()
            .with_dictionary(dict.clone())
            .with_content(true),
    );
    let report = analyzer.analyze(&built.bytes);
    assert_eq!(report.verdict, Verdict::Ok);
    assert_eq!(
        report.header.as_ref().and_then(|h| h.dictionary_id()),
        Some(0xCAFE)
    );
    assert_eq!(report.content.as_deref(), Some(data.as_slice()));

    let report = FrameAnalyzer::new().analyze(&built.bytes);
    assert!(matches!(report.verdict, Verdict::PartiallyValid(_)));
}

#[test]
fn test_oversized_block_leniency() {
    let big = vec![0x11u8; 64 * 1024 + 1];
    let built = FrameBuilder::new().uncompressed_block(&big).build();

    let report = FrameAnalyzer::new().analyze(&built.bytes);
    assert_eq!(
        report.verdict,
        Verdict::PartiallyValid(vec![Issue::OversizedBlock {
            index: 0,
            size: big.len() as u32,
            max: 64 * 1024
        }])
    );

    let analyzer =
        FrameAnalyzer::with_options(AnalyzerOptions::default().with_strict_block_size(false));
    assert_eq!(analyzer.analyze(&built.bytes).verdict, Verdict::Ok);
}
