#![no_main]
#[macro_use] extern crate libfuzzer_sys;
extern crate lz4scan;
use lz4_flex::frame::{BlockMode, FrameEncoder, FrameInfo};
use lz4scan::{AnalyzerOptions, FrameAnalyzer, Verdict};
use std::io::Write;

fn encode_lz4(data: &[u8], linked: bool) -> Result<Vec<u8>, lz4_flex::frame::Error> {
    let mut info = FrameInfo::new();
    info.block_checksums = true;
    info.content_checksum = true;
    if linked {
        info.block_mode = BlockMode::Linked;
    }
    let mut encoder = FrameEncoder::with_frame_info(info, Vec::new());
    encoder.write_all(data)?;
    encoder.finish()
}

fuzz_target!(|data: &[u8]| {
    let analyzer = FrameAnalyzer::with_options(AnalyzerOptions::default().with_content(true));
    for linked in [false, true] {
        let compressed = encode_lz4(data, linked).unwrap();
        let report = analyzer.analyze(&compressed);
        assert_eq!(report.verdict, Verdict::Ok, "Frame written by lz4_flex did not verify");
        assert!(report.content.as_deref() == Some(data), "Decoded data did not match the original input");
    }
});
