mod progress;
mod render;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use lz4scan::{AnalyzerOptions, FrameAnalyzer};
use progress::ProgressMonitor;
use tracing::{debug, error};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(version, about = "Validate LZ4 frames and report what is inside them")]
struct Cli {
    /// The files to analyse
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,
    /// Only check the frame structure and block checksums
    #[arg(long)]
    no_decompress: bool,
    /// Do not verify block and content checksums
    #[arg(long)]
    no_checksums: bool,
    /// Accept blocks bigger than the maximum block size announced in the header
    #[arg(long)]
    lenient: bool,
    /// Decompress independent blocks one after the other instead of in parallel
    #[arg(long)]
    sequential: bool,
    /// Report blocks that take longer than this to decompress
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,
    /// Dictionary for frames that were compressed with one
    #[arg(long, value_name = "PATH")]
    dict: Option<PathBuf>,
    /// Print a table with every block
    #[arg(long)]
    blocks: bool,
    /// More log output, can be repeated
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    fn options(&self) -> Result<AnalyzerOptions> {
        let mut options = AnalyzerOptions::default()
            .with_decompression(!self.no_decompress)
            .with_checksum_verification(!self.no_checksums)
            .with_strict_block_size(!self.lenient)
            .with_parallelism(!self.sequential);
        if let Some(ms) = self.timeout_ms {
            options = options.with_block_timeout(Duration::from_millis(ms));
        }
        if let Some(path) = &self.dict {
            let dictionary = std::fs::read(path)
                .wrap_err_with(|| format!("failed to read dictionary {}", path.display()))?;
            options = options.with_dictionary(dictionary);
        }
        Ok(options)
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(cli.log_level())
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .init();

    let analyzer = FrameAnalyzer::with_options(cli.options()?);
    let mut failed = 0;
    for path in &cli.files {
        let input = match load(path) {
            Ok(input) => input,
            Err(e) => {
                error!("{e:?}");
                failed += 1;
                continue;
            }
        };
        debug!("analysing {} ({} bytes)", path.display(), input.len());
        let report = analyzer.analyze(&input);
        render::print_report(path, &report, cli.blocks);
        if report.verdict.is_invalid() {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{failed} of {} files are not valid LZ4 frames", cli.files.len());
    }
    Ok(())
}

fn load(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).wrap_err_with(|| format!("failed to open {}", path.display()))?;
    let size = file
        .metadata()
        .wrap_err_with(|| format!("failed to stat {}", path.display()))?
        .len();
    let label = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut monitor = ProgressMonitor::new(file, size, &label);
    let mut input = Vec::with_capacity(size as usize);
    monitor
        .read_to_end(&mut input)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    Ok(input)
}
