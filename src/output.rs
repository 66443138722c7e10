//! Conversion reports.

use crate::closer::CloseOutcome;
use crate::document::DocumentKind;
use crate::error::{ConvertError, Stage};
use crate::export::ExportFilter;
use crate::transform::TransformReport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of one successful conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionReport {
    /// Input path, or the factory URL for a created document.
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: DocumentKind,
    pub filter: ExportFilter,
    pub transform: TransformReport,
    pub close: CloseOutcome,
    pub duration_ms: u64,
}

/// One document that did not convert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub source: PathBuf,
    pub stage: Stage,
    /// Human-readable cause.
    pub error: String,
}

impl DocumentFailure {
    pub fn new(source: impl Into<PathBuf>, error: &ConvertError) -> Self {
        Self {
            source: source.into(),
            stage: error.stage(),
            error: error.to_string(),
        }
    }
}

/// Outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub converted: Vec<ConversionReport>,
    pub failed: Vec<DocumentFailure>,
    /// Inputs never attempted because the batch stopped early.
    pub skipped: Vec<PathBuf>,
    /// Set when the batch stopped early, with the reason.
    pub aborted: Option<String>,
    pub total_duration_ms: u64,
}

impl BatchReport {
    /// Number of documents in the batch.
    pub fn total(&self) -> usize {
        self.converted.len() + self.failed.len() + self.skipped.len()
    }

    /// `true` when every document converted.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty() && self.aborted.is_none()
    }

    /// Treat any failed or skipped document as an error.
    pub fn into_result(self) -> Result<BatchReport, ConvertError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ConvertError::BatchFailed {
                failed: self.failed.len() + self.skipped.len(),
                total: self.total(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str) -> ConversionReport {
        ConversionReport {
            source: PathBuf::from(format!("/in/{name}.odp")),
            destination: PathBuf::from(format!("/out/{name}.pdf")),
            kind: DocumentKind::Presentation,
            filter: ExportFilter::ImpressPdf,
            transform: TransformReport::default(),
            close: CloseOutcome::Closed,
            duration_ms: 12,
        }
    }

    #[test]
    fn empty_batch_is_success() {
        assert!(BatchReport::default().is_success());
    }

    #[test]
    fn failures_turn_into_batch_failed() {
        let batch = BatchReport {
            converted: vec![report("a")],
            failed: vec![DocumentFailure::new(
                "/in/b.odp",
                &ConvertError::SourceNotFound {
                    path: PathBuf::from("/in/b.odp"),
                },
            )],
            skipped: vec![PathBuf::from("/in/c.odp")],
            ..BatchReport::default()
        };
        assert_eq!(batch.total(), 3);
        assert_eq!(batch.failed[0].stage, Stage::Load);
        match batch.into_result() {
            Err(ConvertError::BatchFailed { failed, total }) => {
                assert_eq!((failed, total), (2, 3));
            }
            other => panic!("expected BatchFailed, got {other:?}"),
        }
    }

    #[test]
    fn report_serialises_engine_names() {
        let v = serde_json::to_value(report("a")).unwrap();
        assert_eq!(v["filter"], "impress_pdf_Export");
        assert_eq!(v["kind"], "presentation");
        assert_eq!(v["close"], "closed");
    }
}
