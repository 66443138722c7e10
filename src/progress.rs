//! Progress-callback trait for batch conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as [`crate::convert::convert_batch`] works through its documents.
//! The CLI renders these events as a progress bar.
//!
//! # Example
//!
//! ```rust
//! use edgequake_office2pdf::{ConversionConfig, ConversionProgressCallback, ConversionReport};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     converted: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, report: &ConversionReport) {
//!         self.converted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} → {}", index, total, report.destination.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { converted: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ConversionReport;
use std::path::Path;
use std::sync::Arc;

/// Called by the batch driver as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Documents are converted one at a time, so events
/// arrive in order, but the trait is `Send + Sync` because the callback is
/// shared through the config.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first document is loaded.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before a document is loaded.
    ///
    /// # Arguments
    /// * `index` : 1-indexed position in the batch
    /// * `total` : documents in the batch
    /// * `source`: input path
    fn on_document_start(&self, index: usize, total: usize, source: &Path) {
        let _ = (index, total, source);
    }

    /// Called when a document was exported and released.
    fn on_document_complete(&self, index: usize, total: usize, report: &ConversionReport) {
        let _ = (index, total, report);
    }

    /// Called when a document failed at any stage.
    ///
    /// `error` is the human-readable diagnostic, naming the stage.
    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after the batch finished or was aborted.
    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        started: AtomicUsize,
        errors: AtomicUsize,
        succeeded: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_document_start(&self, _index: usize, _total: usize, _source: &Path) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, succeeded: usize) {
            self.succeeded.store(succeeded, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start(1, 2, Path::new("a.odp"));
        cb.on_document_error(2, 2, "load stage failed");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let cb: Arc<dyn ConversionProgressCallback> = Arc::new(TrackingCallback::default());
        cb.on_batch_start(3);
        cb.on_document_start(1, 3, Path::new("a.odp"));
        cb.on_document_start(2, 3, Path::new("b.odt"));
        cb.on_document_error(2, 3, "export stage failed");
        cb.on_batch_complete(3, 1);
    }

    #[test]
    fn tracking_counts() {
        let cb = TrackingCallback::default();
        cb.on_document_start(1, 2, Path::new("a.odp"));
        cb.on_document_start(2, 2, Path::new("b.odp"));
        cb.on_document_error(2, 2, "boom");
        cb.on_batch_complete(2, 1);
        assert_eq!(cb.started.load(Ordering::SeqCst), 2);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
        assert_eq!(cb.succeeded.load(Ordering::SeqCst), 1);
    }
}
