//! End-to-end tests for edgequake-office2pdf.
//!
//! These tests talk to a live office engine and use real documents in
//! `./test_cases/`. They are gated behind the `E2E_ENABLED` environment
//! variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 OFFICE2PDF_ENDPOINT=127.0.0.1:2002 cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_convert_presentation -- --nocapture

use edgequake_office2pdf::{
    convert, convert_batch, create_text_document, CloseOutcome, ConversionConfig, ConversionJob,
    ConvertError, DocumentKind, EngineSession, ExportFilter, Stage,
};
use std::path::{Path, PathBuf};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

fn e2e_config() -> ConversionConfig {
    let mut builder = ConversionConfig::builder().call_timeout_secs(60);
    if let Ok(endpoint) = std::env::var("OFFICE2PDF_ENDPOINT") {
        builder = builder.endpoint(endpoint);
    }
    builder.build().expect("e2e config")
}

/// Skip this test if E2E_ENABLED is not set *or* no document at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Assert `path` holds a plausible PDF.
fn assert_pdf(path: &Path, context: &str) {
    let bytes = std::fs::read(path).unwrap_or_else(|e| panic!("[{context}] {e}"));
    assert!(
        bytes.starts_with(b"%PDF-"),
        "[{context}] Output does not start with a PDF header"
    );
    assert!(
        bytes.len() > 500,
        "[{context}] Output suspiciously short: {} bytes",
        bytes.len()
    );
    println!("[{context}] ✓  {} bytes", bytes.len());
}

// ── Single documents ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_presentation() {
    let src = e2e_skip_unless_ready!(test_cases_dir().join("shadows.odp"));
    let dest = output_dir().join("shadows.pdf");

    let report = convert(&src, &dest, &e2e_config())
        .await
        .expect("convert() should succeed");

    assert_eq!(report.kind, DocumentKind::Presentation);
    assert_eq!(report.filter, ExportFilter::ImpressPdf);
    assert!(report.transform.pages_visited > 0);
    assert_ne!(report.close, CloseOutcome::NotAModel);
    assert_pdf(&dest, "presentation");
    println!("{}", serde_json::to_string_pretty(&report).unwrap());
}

#[tokio::test]
async fn test_convert_text_document() {
    let src = e2e_skip_unless_ready!(test_cases_dir().join("letter.odt"));
    let dest = output_dir().join("letter.pdf");

    let report = convert(&src, &dest, &e2e_config())
        .await
        .expect("convert() should succeed");

    assert_eq!(report.kind, DocumentKind::Text);
    assert_eq!(report.filter, ExportFilter::WriterPdf);
    assert!(report.transform.skipped);
    assert_pdf(&dest, "text");
}

#[tokio::test]
async fn test_create_text_document_with_watermark() {
    let _ = e2e_skip_unless_ready!(test_cases_dir());
    let config = ConversionConfig::builder()
        .endpoint(std::env::var("OFFICE2PDF_ENDPOINT").unwrap_or_else(|_| "127.0.0.1:2002".into()))
        .watermark("watermark test")
        .build()
        .unwrap();
    let session = EngineSession::connect(&config).await.expect("connect");
    let dest = output_dir().join("hello.pdf");

    let report = create_text_document(&session, "Hello world!", &dest, &config)
        .await
        .expect("create_text_document() should succeed");

    assert_eq!(report.filter, ExportFilter::WriterPdf);
    assert_pdf(&dest, "created");
}

#[tokio::test]
async fn test_convert_nonexistent() {
    let _ = e2e_skip_unless_ready!(test_cases_dir());

    let err = convert(
        test_cases_dir().join("does_not_exist.odp"),
        output_dir().join("does_not_exist.pdf"),
        &e2e_config(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ConvertError::SourceNotFound { .. }), "got {err:?}");
    assert_eq!(err.stage(), Stage::Load);
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_batch_mixed_documents() {
    let dir = e2e_skip_unless_ready!(test_cases_dir());
    let inputs: Vec<PathBuf> = ["shadows.odp", "letter.odt", "does_not_exist.odp"]
        .iter()
        .map(|name| dir.join(name))
        .collect();
    let config = e2e_config();
    let session = EngineSession::connect(&config).await.expect("connect");
    let jobs = ConversionJob::into_dir(&inputs, &output_dir().join("batch"));

    let report = convert_batch(&session, &jobs, &config).await;

    assert_eq!(report.total(), 3);
    assert_eq!(report.failed.len(), 1);
    assert!(report.aborted.is_none());
    for converted in &report.converted {
        assert_pdf(&converted.destination, "batch");
    }
}
