//! # edgequake-office2pdf
//!
//! Convert office documents (presentations and text documents) to PDF by
//! driving an already-running office engine through its automation bridge.
//!
//! The engine does the heavy lifting: parsing, layout and PDF rendering.
//! This crate drives it through a short pipeline and owns the failure
//! handling around it, in particular the engine's veto-able close.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source file
//!  │
//!  ├─ 1. Connect    bridge socket → service manager → desktop
//!  ├─ 2. Load       hidden, off the recent list; probe capabilities
//!  ├─ 3. Transform  presentations: Shadow = false on every shape
//!  ├─ 4. Export     impress_pdf_Export / writer_pdf_Export + options
//!  └─ 5. Release    close(true) │ dispose │ veto → owner closes later
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_office2pdf::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // engine started with:
//!     //   soffice --headless --accept="socket,host=127.0.0.1,port=2002;urp;"
//!     let config = ConversionConfig::default();
//!     let report = convert("slides.odp", "slides.pdf", &config).await?;
//!     eprintln!("{} shadows removed, document {}",
//!         report.transform.shadows_cleared,
//!         report.close);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `office2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-office2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bridge;
pub mod closer;
pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod export;
pub mod location;
pub mod output;
pub mod progress;
pub mod session;
pub mod transform;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use closer::{release, CloseOutcome};
pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{
    convert, convert_batch, convert_file, convert_from_bytes, convert_sync, create_text_document,
    ConversionJob,
};
pub use document::{Capability, CapabilitySet, DocumentHandle, DocumentKind};
pub use error::{BridgeError, ConvertError, Stage};
pub use export::{export, ExportFilter, ExportSpec};
pub use output::{BatchReport, ConversionReport, DocumentFailure};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::EngineSession;
pub use transform::{remove_shadows, TransformReport};
