//! Progress display while input files are loaded, based on `indicatif`.

use std::io::Read;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;

/// Wraps the reader of an input file and advances a progress bar on stderr with every read.
/// The bar disappears once the reader is exhausted.
pub struct ProgressMonitor<R: Read> {
    reader: R,
    bar: ProgressBar,
    label: String,
}

impl<R: Read> ProgressMonitor<R> {
    pub fn new(reader: R, len: u64, label: &str) -> Self {
        let style = ProgressStyle::with_template(
            "{msg} [{bar:40}] {binary_bytes}/{binary_total_bytes} ({binary_bytes_per_sec})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::stderr_with_hz(8))
            .with_style(style)
            .with_message(label.to_string());
        Self {
            reader,
            bar,
            label: label.to_string(),
        }
    }
}

impl<R: Read> Read for ProgressMonitor<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n == 0 && !buf.is_empty() && !self.bar.is_finished() {
            self.bar.finish_and_clear();
            debug!(
                "loaded {} ({}) in {:?}",
                self.label,
                fmt_size(self.bar.position()),
                self.bar.elapsed()
            );
        } else {
            self.bar.inc(n as u64);
        }
        Ok(n)
    }
}

/// Formats a byte count with binary prefixes, e.g. `1.50 MiB`.
pub fn fmt_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::fmt_size;

    #[test]
    fn sizes_use_binary_prefixes() {
        assert_eq!(fmt_size(0), "0 B");
        assert_eq!(fmt_size(1023), "1023 B");
        assert_eq!(fmt_size(1536), "1.50 KiB");
        assert_eq!(fmt_size(3 * 1024 * 1024), "3.00 MiB");
        assert_eq!(fmt_size(5 * 1024 * 1024 * 1024 * 1024 * 1024), "5120.00 TiB");
    }
}
