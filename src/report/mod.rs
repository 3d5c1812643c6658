//! Analysis report
//!
//! The report is the only output of a run. It carries the declared facts of
//! the source, its digests, the sniffed type, the routed extractor with its
//! record, and the ordered findings.
//!
//! ```rust,ignore
//! let report = Analyzer::default().analyze(source).await?;
//! println!("{}", report.to_json_pretty()?);
//! ```

pub mod types;

pub use types::{Report, ReportBuilder};
