//! Conversion entry points.
//!
//! Every entry point runs the same pipeline over one document:
//!
//! ```text
//! load ─▶ remove shadows ─▶ export ─▶ release
//!   │            │              │         ▲
//!   └─ error ──▶ return         └─ error ─┘  (release always runs once
//!                                             the document is loaded)
//! ```
//!
//! Errors propagate as [`ConvertError`] values; nothing here terminates the
//! process. [`convert_batch`] uses that to keep going past a failed
//! document, stopping only when the session itself is lost or the caller
//! asked for `fail_fast`.

use crate::closer::{self, CloseOutcome};
use crate::config::ConversionConfig;
use crate::document::{self, DocumentHandle, DocumentKind};
use crate::error::ConvertError;
use crate::export::{self, ExportFilter, ExportSpec};
use crate::location;
use crate::output::{BatchReport, ConversionReport, DocumentFailure};
use crate::session::EngineSession;
use crate::transform::{self, TransformReport};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One input/output pair of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl ConversionJob {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// One job per input, each writing `<stem>.pdf` into `out_dir`.
    pub fn into_dir(inputs: &[PathBuf], out_dir: &Path) -> Vec<Self> {
        inputs
            .iter()
            .map(|input| Self::new(input, location::destination_for(input, out_dir)))
            .collect()
    }
}

/// Connect to the engine and convert one document to PDF.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Any failure is fatal for this call: connection, load, transform, export
/// and close errors are all returned. A close veto is not an error; it is
/// reported in [`ConversionReport::close`].
pub async fn convert(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionReport, ConvertError> {
    let session = EngineSession::connect(config).await?;
    convert_file(&session, source, destination, config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionReport, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(source, destination, config))
}

/// Convert one document over an existing session.
pub async fn convert_file(
    session: &EngineSession,
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionReport, ConvertError> {
    let start = Instant::now();
    let source = source.as_ref();
    info!("Starting conversion: {}", source.display());

    // ── Step 1: Resolve locations ────────────────────────────────────────
    let source_path = location::resolve_source(source)?;
    let source_url = location::file_url(&source_path)?;
    let (destination_path, destination_url) = prepare_destination(destination.as_ref()).await?;
    let expected = DocumentKind::from_extension(&source_path);
    debug!("{} → {} (expected kind: {:?})", source_url, destination_url, expected);

    // ── Step 2: Load ─────────────────────────────────────────────────────
    let handle = document::load(session, &source_url, expected).await?;
    let kind = handle.kind();

    // ── Step 3–5: Transform, export, release ─────────────────────────────
    let (transform, filter, close) = run_stages(handle, None, &destination_url, config).await?;

    let report = ConversionReport {
        source: source_path,
        destination: destination_path,
        kind,
        filter,
        transform,
        close,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Converted {} in {}ms ({})",
        report.source.display(),
        report.duration_ms,
        report.close
    );
    Ok(report)
}

/// Convert a document held in memory.
///
/// The bytes are written to a managed [`tempfile`] the engine can load,
/// named with an extension matching `kind` so the usual capability check
/// applies. The file is removed when this call returns.
pub async fn convert_from_bytes(
    session: &EngineSession,
    bytes: &[u8],
    kind: DocumentKind,
    destination: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionReport, ConvertError> {
    let suffix = match kind {
        DocumentKind::Presentation => ".odp",
        DocumentKind::Text => ".odt",
        DocumentKind::Unknown => ".bin",
    };
    let mut tmp = tempfile::Builder::new()
        .prefix("office2pdf-")
        .suffix(suffix)
        .tempfile()
        .map_err(|e| ConvertError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| ConvertError::Internal(format!("tempfile write: {e}")))?;
    tmp.flush()
        .map_err(|e| ConvertError::Internal(format!("tempfile flush: {e}")))?;

    // `tmp` is dropped (and the file deleted) after the engine has released it
    convert_file(session, tmp.path(), destination, config).await
}

/// Create a new text document holding `body` and export it to PDF.
///
/// The export uses `writer_pdf_Export` with `config.watermark`, if any.
pub async fn create_text_document(
    session: &EngineSession,
    body: &str,
    destination: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionReport, ConvertError> {
    let start = Instant::now();
    let (destination_path, destination_url) = prepare_destination(destination.as_ref()).await?;

    let handle = document::create(session, DocumentKind::Text).await?;
    let source = PathBuf::from(handle.location());
    let (transform, filter, close) =
        run_stages(handle, Some(body), &destination_url, config).await?;

    Ok(ConversionReport {
        source,
        destination: destination_path,
        kind: DocumentKind::Text,
        filter,
        transform,
        close,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Convert every job over one session, in order.
///
/// A failed document is recorded and the next one attempted, unless
/// `config.fail_fast` is set or the failure left the session unusable
/// (disconnect, timeout); the remaining jobs are then listed as skipped.
pub async fn convert_batch(
    session: &EngineSession,
    jobs: &[ConversionJob],
    config: &ConversionConfig,
) -> BatchReport {
    let start = Instant::now();
    let total = jobs.len();
    let mut report = BatchReport::default();
    info!("Starting batch of {} documents", total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    for (i, job) in jobs.iter().enumerate() {
        if report.aborted.is_some() {
            report.skipped.push(job.source.clone());
            continue;
        }
        let index = i + 1;

        if let Some(ref cb) = config.progress_callback {
            cb.on_document_start(index, total, &job.source);
        }

        match convert_file(session, &job.source, &job.destination, config).await {
            Ok(r) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_document_complete(index, total, &r);
                }
                report.converted.push(r);
            }
            Err(e) => {
                let message = format!("{} stage failed: {}", e.stage(), e);
                warn!("[{}/{}] {}: {}", index, total, job.source.display(), message);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_document_error(index, total, &message);
                }
                report.failed.push(DocumentFailure::new(&job.source, &e));

                if e.is_session_fatal() {
                    report.aborted = Some(format!("engine session lost: {}", e));
                } else if config.fail_fast {
                    report.aborted = Some(format!(
                        "stopped after {} failed (--fail-fast)",
                        job.source.display()
                    ));
                }
            }
        }
    }

    report.total_duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Batch complete: {}/{} converted, {} failed, {} skipped, {}ms total",
        report.converted.len(),
        total,
        report.failed.len(),
        report.skipped.len(),
        report.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, report.converted.len());
    }
    report
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Absolute destination path and URL; creates missing parent directories.
async fn prepare_destination(destination: &Path) -> Result<(PathBuf, String), ConvertError> {
    let path = location::absolute(destination)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ConvertError::InvalidLocation {
                location: parent.display().to_string(),
                reason: format!("cannot create output directory: {e}"),
            })?;
    }
    let url = location::file_url(&path)?;
    Ok((path, url))
}

/// Populate, transform and export `handle`, then release it.
///
/// Release runs whatever the stages did. The first stage error wins; a
/// release error fails an otherwise successful run.
async fn run_stages(
    handle: DocumentHandle,
    body: Option<&str>,
    destination_url: &str,
    config: &ConversionConfig,
) -> Result<(TransformReport, ExportFilter, CloseOutcome), ConvertError> {
    let stages = async {
        if let Some(body) = body {
            let text = handle.text().await?;
            text.set_string(body)
                .await
                .map_err(|source| ConvertError::Load {
                    location: handle.location().to_string(),
                    source,
                })?;
            debug!("Wrote {} bytes of body text", body.len());
        }

        let transform = if config.remove_shadows {
            transform::remove_shadows(&handle).await?
        } else {
            TransformReport {
                skipped: true,
                ..TransformReport::default()
            }
        };

        let spec = ExportSpec::for_kind(handle.kind(), config)
            .ok_or(ConvertError::UnsupportedKind { kind: handle.kind() })?;
        export::export(&handle, destination_url, &spec).await?;
        Ok::<_, ConvertError>((transform, spec.filter()))
    }
    .await;

    let released = closer::release(handle).await;

    match (stages, released) {
        (Ok((transform, filter)), Ok(close)) => Ok((transform, filter, close)),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(e), Ok(close)) => {
            debug!("Document {} after {} failure", close, e.stage());
            Err(e)
        }
        (Err(e), Err(close_err)) => {
            warn!("Releasing the document also failed: {}", close_err);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_into_dir_use_input_stems() {
        let jobs = ConversionJob::into_dir(
            &[PathBuf::from("/in/a.odp"), PathBuf::from("/in/b.docx")],
            Path::new("/out"),
        );
        assert_eq!(
            jobs,
            vec![
                ConversionJob::new("/in/a.odp", "/out/a.pdf"),
                ConversionJob::new("/in/b.docx", "/out/b.pdf"),
            ]
        );
    }
}
