//! Data structures for analysis reports
//!
//! A report is assembled once per run and never mutated afterwards. Every
//! field serializes with camelCase names so that snapshots stay stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{FileHashes, SniffedType};
use crate::error::{AnalysisError, AnalysisResult};
use crate::extractors::{ExtractorKind, MetadataRecord};
use crate::heuristics::Findings;
use crate::source::SourceSummary;

/// Complete result of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub run_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub source: SourceSummary,
    pub hashes: FileHashes,
    pub sniffed: SniffedType,
    /// Extension versus signature sentence, when both are known
    pub identification: Option<String>,
    /// Extractor chosen by the router; None when no predicate matched
    pub extractor: Option<ExtractorKind>,
    pub record: Option<MetadataRecord>,
    pub findings: Findings,
}

impl Report {
    pub fn builder() -> ReportBuilder {
        ReportBuilder::default()
    }

    pub fn to_json_pretty(&self) -> AnalysisResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> AnalysisResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> AnalysisResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Builder for [`Report`]. Source, hashes and sniffed type are required.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    run_id: Option<Uuid>,
    analyzed_at: Option<DateTime<Utc>>,
    source: Option<SourceSummary>,
    hashes: Option<FileHashes>,
    sniffed: Option<SniffedType>,
    identification: Option<String>,
    extractor: Option<ExtractorKind>,
    record: Option<MetadataRecord>,
    findings: Findings,
}

impl ReportBuilder {
    /// Fixed run id; a random v4 id is generated otherwise
    pub fn run_id(mut self, id: Uuid) -> Self {
        self.run_id = Some(id);
        self
    }

    pub fn analyzed_at(mut self, at: DateTime<Utc>) -> Self {
        self.analyzed_at = Some(at);
        self
    }

    pub fn source(mut self, source: SourceSummary) -> Self {
        self.source = Some(source);
        self
    }

    pub fn hashes(mut self, hashes: FileHashes) -> Self {
        self.hashes = Some(hashes);
        self
    }

    pub fn sniffed(mut self, sniffed: SniffedType) -> Self {
        self.sniffed = Some(sniffed);
        self
    }

    pub fn identification(mut self, identification: Option<String>) -> Self {
        self.identification = identification;
        self
    }

    /// Routed extractor and the record it produced
    pub fn extraction(mut self, kind: ExtractorKind, record: MetadataRecord) -> Self {
        self.extractor = Some(kind);
        self.record = Some(record);
        self
    }

    pub fn findings(mut self, findings: Findings) -> Self {
        self.findings = findings;
        self
    }

    pub fn build(self) -> AnalysisResult<Report> {
        let missing = |field: &str| AnalysisError::Failed(format!("report is missing {field}"));
        Ok(Report {
            run_id: self.run_id.unwrap_or_else(Uuid::new_v4),
            analyzed_at: self.analyzed_at.unwrap_or_else(Utc::now),
            source: self.source.ok_or_else(|| missing("source"))?,
            hashes: self.hashes.ok_or_else(|| missing("hashes"))?,
            sniffed: self.sniffed.ok_or_else(|| missing("sniffed type"))?,
            identification: self.identification,
            extractor: self.extractor,
            record: self.record,
            findings: self.findings,
        })
    }
}
