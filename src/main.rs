//! metascope command line
//!
//! Prints the JSON report of each file on stdout; diagnostics go to stderr.
//! Control log level with RUST_LOG:
//!   RUST_LOG=debug metascope photo.jpg
//!   RUST_LOG=metascope::extractors::video=trace metascope clip.mp4

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use metascope::{AnalysisError, AnalysisResult, Analyzer, AnalyzerConfig, ByteSource, Primitives, Report};
use tracing::error;

/// Single-file metadata forensics
#[derive(Parser, Debug)]
#[command(name = "metascope", version, about)]
struct Args {
    /// Files to analyze
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Declared MIME type, instead of the one guessed from the file name
    #[arg(long)]
    mime: Option<String>,

    /// Print compact JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,

    /// Maximum number of files analyzed at once
    #[arg(long, default_value_t = 4)]
    jobs: usize,

    /// Trace-level logs with source locations
    #[arg(long, short)]
    verbose: bool,
}

fn load_source(path: &Path, mime: Option<&str>, limit: u64) -> AnalysisResult<ByteSource> {
    let source = ByteSource::from_path_with_limit(path, limit)?;
    Ok(match mime {
        Some(mime) => source.with_declared_mime(mime),
        None => source,
    })
}

fn render(report: &Report, compact: bool) -> AnalysisResult<String> {
    if compact {
        report.to_json()
    } else {
        report.to_json_pretty()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if args.verbose {
        metascope::logging::init_verbose();
    } else {
        metascope::logging::init();
    }

    let config = match &args.config {
        Some(path) => match AnalyzerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "Invalid configuration");
                eprintln!("{e}");
                return ExitCode::from(1);
            }
        },
        None => AnalyzerConfig::default(),
    };
    let analyzer = Analyzer::new(config, Primitives::default());

    let mut sources = Vec::with_capacity(args.files.len());
    let mut load_errors = Vec::new();
    for (index, path) in args.files.iter().enumerate() {
        match load_source(path, args.mime.as_deref(), analyzer.config().max_file_size) {
            Ok(source) => sources.push(source),
            Err(e) => load_errors.push((index, e)),
        }
    }

    let mut results: Vec<AnalysisResult<Report>> = analyzer.analyze_many(sources, args.jobs).await;
    for (index, e) in load_errors {
        results.insert(index, Err(e));
    }

    let mut rejected = false;
    let mut failed = false;
    for (path, result) in args.files.iter().zip(results) {
        match result.and_then(|report| render(&report, args.compact)) {
            Ok(json) => println!("{json}"),
            Err(e @ AnalysisError::InputRejected { .. }) => {
                rejected = true;
                eprintln!("{}: {e}", path.display());
            }
            Err(e) => {
                failed = true;
                error!(path = %path.display(), error = %e, "Analysis failed");
                eprintln!("{}: {e}", path.display());
            }
        }
    }

    if failed {
        ExitCode::from(1)
    } else if rejected {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}
