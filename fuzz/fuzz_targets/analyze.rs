#![no_main]
#[macro_use] extern crate libfuzzer_sys;
extern crate lz4scan;
use lz4scan::{AnalyzerOptions, FrameAnalyzer, Verdict};

fuzz_target!(|data: &[u8]| {
    let analyzer = FrameAnalyzer::with_options(AnalyzerOptions::default().with_content(true));
    let report = analyzer.analyze(data);
    if report.verdict == Verdict::Ok {
        assert_eq!(
            report.content.map(|c| c.len() as u64),
            report.decompressed_size
        );
    }
});
