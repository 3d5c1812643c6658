//! Single-file analysis pipeline
//!
//! ```text
//!   ByteSource ── size check ──┬── digests ───────────────┐
//!                              ├── signature sniff ───────┼── rules ── Report
//!                              └── routed extractor ──────┘
//!                                  (timeout bounded)
//! ```
//!
//! The three middle stages read the same immutable bytes and run as
//! blocking tasks joined together. Each run owns its source; nothing is
//! shared between runs except the stateless primitives and the config.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::common::{FileHashes, SniffedType};
use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::extractors::{self, ExtractorKind, MetadataRecord};
use crate::heuristics::{self, Findings, SourceFacts};
use crate::primitives::Primitives;
use crate::report::Report;
use crate::source::ByteSource;

/// Runs analyses with one configuration and one set of primitives.
///
/// Cloning is cheap; clones share the configuration and primitives.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: Arc<AnalyzerConfig>,
    primitives: Primitives,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default(), Primitives::default())
    }
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig, primitives: Primitives) -> Self {
        Self {
            config: Arc::new(config),
            primitives,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze one file.
    ///
    /// Fails only when the input is over the size limit or a digest/sniff
    /// task aborts. Extractor failures, panics and timeouts end up as an
    /// unavailable record inside the report.
    pub async fn analyze(&self, source: ByteSource) -> AnalysisResult<Report> {
        source.check_size(self.config.max_file_size)?;

        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let source = Arc::new(source);
        let kind = extractors::select(&source);
        info!(%run_id, name = source.name(), size = source.size(), extractor = ?kind, "Analysis started");

        let hash_task = {
            let source = Arc::clone(&source);
            let digester = Arc::clone(&self.primitives.digester);
            let extra = self.config.extra_digests.clone();
            tokio::task::spawn_blocking(move || FileHashes::compute(digester.as_ref(), source.bytes(), &extra))
        };
        let sniff_task = {
            let source = Arc::clone(&source);
            let sniffer = Arc::clone(&self.primitives.sniffer);
            let prefix_len = self.config.sniff_prefix_len;
            tokio::task::spawn_blocking(move || SniffedType::from_sniffer(sniffer.as_ref(), source.bytes(), prefix_len))
        };
        let extraction = self.run_extractor(kind, Arc::clone(&source));

        let (hashes, sniffed, record) = tokio::join!(hash_task, sniff_task, extraction);
        let hashes = hashes?;
        let sniffed = sniffed?;

        let identification = heuristics::assess_identity(source.name(), &sniffed);
        let findings = match &record {
            Some(record) => heuristics::evaluate(record, &SourceFacts::from_source(&source), &self.config.vocabularies),
            None => Findings::new(),
        };

        let mut builder = Report::builder()
            .run_id(run_id)
            .analyzed_at(Utc::now())
            .source(source.summary())
            .hashes(hashes)
            .sniffed(sniffed)
            .identification(identification)
            .findings(findings);
        if let (Some(kind), Some(record)) = (kind, record) {
            builder = builder.extraction(kind, record);
        }
        let report = builder.build()?;

        info!(
            %run_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            findings = report.findings.len(),
            "Analysis finished"
        );
        Ok(report)
    }

    /// Run the routed extractor on a blocking thread under the configured
    /// timeout. None when no extractor matched.
    async fn run_extractor(&self, kind: Option<ExtractorKind>, source: Arc<ByteSource>) -> Option<MetadataRecord> {
        let kind = kind?;
        let primitives = self.primitives.clone();
        let config = Arc::clone(&self.config);
        let task = tokio::task::spawn_blocking(move || extractors::extract(kind, &source, &primitives, &config));

        let outcome = if self.config.extractor_timeout_ms == 0 {
            Ok(task.await)
        } else {
            tokio::time::timeout(Duration::from_millis(self.config.extractor_timeout_ms), task).await
        };

        let record = match outcome {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                warn!(extractor = %kind, error = %e, "Extractor task aborted");
                MetadataRecord::unavailable(kind, kind.failure_message())
            }
            Err(_) => {
                // the blocking task keeps running; its result is dropped
                warn!(extractor = %kind, timeout_ms = self.config.extractor_timeout_ms, "Extractor timed out");
                MetadataRecord::unavailable(kind, kind.failure_message())
            }
        };
        Some(record)
    }

    /// Blocking wrapper around [`Analyzer::analyze`] for callers without a runtime
    pub fn analyze_blocking(&self, source: ByteSource) -> AnalysisResult<Report> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
        runtime.block_on(self.analyze(source))
    }

    /// Analyze independent files with at most `max_concurrency` runs in
    /// flight. Results come back in input order, one per source.
    pub async fn analyze_many(&self, sources: Vec<ByteSource>, max_concurrency: usize) -> Vec<AnalysisResult<Report>> {
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        debug!(count = sources.len(), max_concurrency, "Batch analysis started");

        let handles: Vec<_> = sources
            .into_iter()
            .map(|source| {
                let analyzer = self.clone();
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| AnalysisError::Failed(format!("batch semaphore closed: {e}")))?;
                    analyzer.analyze(source).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap_or_else(|e| Err(AnalysisError::from(e))));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::HASH_FAILURE_PLACEHOLDER;
    use crate::extractors::video::MediaTrack;
    use crate::primitives::{Digester, MediaAnalyzer};

    fn text_source(name: &str, mime: &str, text: &str) -> ByteSource {
        ByteSource::new(name, mime, Utc::now(), text.as_bytes().to_vec())
    }

    struct FailingDigester;

    impl Digester for FailingDigester {
        fn digest(&self, _bytes: &[u8]) -> Result<String, String> {
            Err("digest unavailable".into())
        }
    }

    struct SlowMedia;

    impl MediaAnalyzer for SlowMedia {
        fn analyze(&self, _bytes: &[u8]) -> Result<Vec<MediaTrack>, String> {
            std::thread::sleep(Duration::from_millis(300));
            Err("too late".into())
        }
    }

    struct PanickingMedia;

    impl MediaAnalyzer for PanickingMedia {
        fn analyze(&self, _bytes: &[u8]) -> Result<Vec<MediaTrack>, String> {
            panic!("media parser crashed")
        }
    }

    #[tokio::test]
    async fn test_text_file_report() {
        let report = Analyzer::default()
            .analyze(text_source("notes.txt", "text/plain", "hello world\n"))
            .await
            .unwrap();
        assert_eq!(report.extractor, Some(ExtractorKind::Txt));
        assert!(matches!(report.record, Some(MetadataRecord::Txt(_))));
        assert_eq!(report.hashes.sha256.len(), 64);
        assert!(!report.sniffed.detected);
        assert_eq!(report.identification, None);
        assert!(report.findings.contains("Total word count identified as 2."));
    }

    #[tokio::test]
    async fn test_no_matching_extractor() {
        let report = Analyzer::default()
            .analyze(text_source("data.bin", "application/octet-stream", "\x00\x01"))
            .await
            .unwrap();
        assert_eq!(report.extractor, None);
        assert!(report.record.is_none());
        assert!(report.findings.is_empty());
    }

    #[tokio::test]
    async fn test_size_limit_rejects_before_analysis() {
        let config = AnalyzerConfig {
            max_file_size: 4,
            ..AnalyzerConfig::default()
        };
        let analyzer = Analyzer::new(config, Primitives::default());
        let err = analyzer.analyze(text_source("a.txt", "text/plain", "12345")).await.unwrap_err();
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn test_digest_failure_is_placeholder() {
        let analyzer = Analyzer::new(AnalyzerConfig::default(), Primitives::default().with_digester(FailingDigester));
        let report = analyzer.analyze(text_source("a.txt", "text/plain", "x")).await.unwrap();
        assert_eq!(report.hashes.sha256, HASH_FAILURE_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_extractor_timeout_is_unavailable() {
        let config = AnalyzerConfig {
            extractor_timeout_ms: 20,
            ..AnalyzerConfig::default()
        };
        let analyzer = Analyzer::new(config, Primitives::default().with_media(SlowMedia));
        let report = analyzer.analyze(text_source("clip.mp4", "video/mp4", "....")).await.unwrap();
        assert_eq!(report.record.as_ref().and_then(MetadataRecord::message), Some("Failed to extract video metadata."));
        assert!(report
            .findings
            .contains("No recoverable video container metadata was identified within the file."));
    }

    #[tokio::test]
    async fn test_extractor_panic_is_contained() {
        let analyzer = Analyzer::new(AnalyzerConfig::default(), Primitives::default().with_media(PanickingMedia));
        let report = analyzer.analyze(text_source("clip.mp4", "video/mp4", "....")).await.unwrap();
        assert!(!report.record.unwrap().is_available());
    }

    #[tokio::test]
    async fn test_batch_keeps_input_order() {
        let sources = vec![
            text_source("a.txt", "text/plain", "one"),
            text_source("big.txt", "text/plain", &"x".repeat(64)),
            text_source("c.eml", "message/rfc822", "Subject: hi\n\nbody"),
        ];
        let config = AnalyzerConfig {
            max_file_size: 32,
            ..AnalyzerConfig::default()
        };
        let results = Analyzer::new(config, Primitives::default()).analyze_many(sources, 2).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().source.name, "a.txt");
        assert!(results[1].as_ref().unwrap_err().is_rejection());
        assert_eq!(results[2].as_ref().unwrap().extractor, Some(ExtractorKind::Eml));
    }

    #[test]
    fn test_blocking_wrapper() {
        let report = Analyzer::default()
            .analyze_blocking(text_source("a.txt", "text/plain", "abc"))
            .unwrap();
        assert_eq!(report.source.size_bytes, 3);
    }
}
