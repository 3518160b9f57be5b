//! Human readable output for a [`DiagnosticReport`].

use std::fmt::Write;
use std::path::Path;

use console::{style, StyledObject};
use lz4scan::checksum::CheckOutcome;
use lz4scan::report::{BlockReport, DecompressionOutcome};
use lz4scan::{DiagnosticReport, FrameHeader, Verdict};

use crate::progress::fmt_size;

pub fn print_report(path: &Path, report: &DiagnosticReport, show_blocks: bool) {
    println!("{} {}", style(path.display()).bold(), verdict(&report.verdict));
    println!("  file size:        {}", fmt_size(report.input_len));
    println!("  magic number:     {}", yes_no(report.magic_valid));

    if let Some(header) = &report.header {
        print_header(header);
    }

    if !report.blocks.is_empty() {
        let stats = &report.stats;
        println!(
            "  blocks:           {} ({} compressed, {} uncompressed)",
            stats.count, stats.compressed, stats.uncompressed
        );
        println!(
            "  block sizes:      total {}, avg {:.1}, min {}, max {}",
            stats.total_size,
            stats.average_size().unwrap_or(0.0),
            stats.min_size.unwrap_or(0),
            stats.max_size.unwrap_or(0)
        );
    }

    if let Some(size) = report.decompressed_size {
        println!("  decompressed:     {} ({size} bytes)", fmt_size(size));
    }
    if let Some(ratio) = report.declared_ratio() {
        println!("  declared ratio:   {ratio:.3}");
    }
    if let Some(ratio) = report.compression_ratio() {
        println!("  ratio:            {ratio:.3}");
    }
    if report.header.is_some() {
        println!("  content checksum: {}", check(&report.content_checksum));
    }

    if show_blocks && !report.blocks.is_empty() {
        let max_block_size = report
            .header
            .as_ref()
            .map(FrameHeader::max_block_size)
            .unwrap_or(0);
        println!(
            "  {:>5} {:>10} {:<12} {:>8} {:<10} {:>8} {:>8} {:>8}  sample",
            "index", "offset", "type", "size", "checksum", "output", "ratio", "max"
        );
        for block in &report.blocks {
            print_block(block, max_block_size);
        }
    }

    match &report.verdict {
        Verdict::Invalid(e) => println!("  {}", style(e).red()),
        Verdict::PartiallyValid(issues) => {
            for issue in issues {
                println!("  {}", style(issue).yellow());
            }
        }
        Verdict::Ok => {}
    }
}

fn print_header(header: &FrameHeader) {
    let desc = &header.descriptor;
    println!(
        "  descriptor:       FLG 0x{:02X}, BD 0x{:02X}, version {}",
        desc.flg(),
        desc.bd(),
        desc.version()
    );
    println!(
        "  independent:      {}",
        yes_no(desc.block_independence())
    );
    println!(
        "  block checksums:  {}",
        yes_no(desc.block_checksum_flag())
    );
    println!(
        "  content checksum: {}",
        yes_no(desc.content_checksum_flag())
    );
    println!("  max block size:   {}", desc.block_max_size());
    if let Some(size) = header.content_size() {
        println!("  content size:     {size}");
    }
    if let Some(id) = header.dictionary_id() {
        println!("  dictionary id:    0x{id:08X}");
    }
    println!("  header checksum:  0x{:02X}", header.header_checksum());
}

fn print_block(report: &BlockReport, max_block_size: usize) {
    let block = &report.block;
    let output = match &report.decompression {
        DecompressionOutcome::NotAttempted => style("-".to_string()).dim(),
        DecompressionOutcome::Decompressed { size } => style(size.to_string()),
        DecompressionOutcome::Failed(_) => style("failed".to_string()).red(),
    };
    let ratio = report
        .ratio()
        .map(|r| format!("{r:.2}"))
        .unwrap_or_else(|| "-".to_string());
    let max = report
        .max_ratio(max_block_size)
        .map(|r| format!("{r:.2}"))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {:>5} {:>10} {:<12} {:>8} {:<10} {:>8} {:>8} {:>8}  {}",
        block.index,
        block.file_offset,
        block.block_type,
        block.declared_size,
        check(&report.checksum),
        output,
        ratio,
        max,
        hex(&report.sample)
    );
}

fn verdict(verdict: &Verdict) -> StyledObject<&'static str> {
    match verdict {
        Verdict::Ok => style("OK").green().bold(),
        Verdict::PartiallyValid(_) => style("PARTIALLY VALID").yellow().bold(),
        Verdict::Invalid(_) => style("INVALID").red().bold(),
    }
}

fn check(outcome: &CheckOutcome) -> StyledObject<&'static str> {
    match outcome {
        CheckOutcome::NotPresent => style("absent").dim(),
        CheckOutcome::Skipped => style("skipped").dim(),
        CheckOutcome::Checked(c) if c.passed() => style("ok").green(),
        CheckOutcome::Checked(_) => style("mismatch").red(),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
