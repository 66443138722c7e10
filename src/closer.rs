//! Releasing a document.
//!
//! ```text
//!                ┌── no model ───────────────▶ NotAModel   (nothing to do)
//! release(doc) ──┼── closeable ── close(true) ─┬─ ok ────▶ Closed
//!                │                             └─ veto ──▶ VetoedPendingExternalClose
//!                └── otherwise ── dispose() ─────────────▶ Disposed
//! ```
//!
//! `close(true)` hands ownership to whoever vetoes. After a veto the vetoing
//! party is responsible for closing the document; disposing it anyway can
//! leave the engine deadlocked or crash it, so a veto is final here: no
//! retry, no poll, no dispose.

use crate::bridge::{Bridge, FaultKind, ObjectRef};
use crate::document::{Capability, DocumentHandle};
use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::{debug, info, warn};

/// How a document's lifecycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseOutcome {
    /// Closed without objection; resources are released.
    Closed,
    /// Not closeable, so it was disposed unconditionally.
    Disposed,
    /// Another party vetoed the close and now owns closing the document.
    VetoedPendingExternalClose,
    /// Not a document model; nothing was called.
    NotAModel,
}

impl fmt::Display for CloseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CloseOutcome::Closed => "closed",
            CloseOutcome::Disposed => "disposed",
            CloseOutcome::VetoedPendingExternalClose => "vetoed, pending external close",
            CloseOutcome::NotAModel => "not a model, left alone",
        })
    }
}

/// Release `handle`, consuming it.
///
/// At most one of `close` and `dispose` is called. A veto is not an error;
/// any other fault from the engine is returned as [`ConvertError::Close`]
/// and, like a veto, never falls back to `dispose`.
pub async fn release(handle: DocumentHandle) -> Result<CloseOutcome, ConvertError> {
    let caps = handle.capabilities();
    let location = handle.location().to_string();

    if !caps.contains(Capability::Model) {
        debug!("{} is not a document model; leaving it alone", location);
        return Ok(CloseOutcome::NotAModel);
    }

    let bridge = handle.bridge();
    let object = handle.object();

    if caps.contains(Capability::Closeable) {
        return close_delivering_ownership(bridge, object, location).await;
    }

    bridge
        .call_unit(object, "dispose", vec![])
        .await
        .map_err(|source| ConvertError::Close {
            location: location.clone(),
            source,
        })?;
    info!("Disposed {}", location);
    Ok(CloseOutcome::Disposed)
}

/// Release a component whose capabilities could not be probed.
///
/// Only `close(true)` is attempted, once. A veto is final, and a component
/// that turns out not to be closeable is left to the engine.
pub(crate) async fn release_unprobed(
    bridge: &Bridge,
    object: ObjectRef,
    location: &str,
) -> Result<CloseOutcome, ConvertError> {
    close_delivering_ownership(bridge, object, location.to_string()).await
}

async fn close_delivering_ownership(
    bridge: &Bridge,
    object: ObjectRef,
    location: String,
) -> Result<CloseOutcome, ConvertError> {
    match bridge.call_unit(object, "close", vec![json!(true)]).await {
        Ok(()) => {
            info!("Closed {}", location);
            Ok(CloseOutcome::Closed)
        }
        Err(e) if e.fault_kind() == Some(FaultKind::CloseVeto) => {
            warn!(
                "Close of {} was vetoed; the vetoing party now owns it ({})",
                location, e
            );
            Ok(CloseOutcome::VetoedPendingExternalClose)
        }
        Err(source) => Err(ConvertError::Close { location, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::memory::{DocumentFixture, MemoryEngine};
    use crate::document;
    use crate::session::EngineSession;
    use std::sync::Arc;
    use std::time::Duration;

    const DOC: &str = "file:///report.odt";

    async fn release_with(engine: MemoryEngine) -> (Arc<MemoryEngine>, Result<CloseOutcome, ConvertError>) {
        let engine = Arc::new(engine);
        let session = EngineSession::bootstrap(engine.clone(), Duration::from_secs(1), "memory")
            .await
            .unwrap();
        let handle = document::load(&session, DOC, None).await.unwrap();
        let outcome = release(handle).await;
        (engine, outcome)
    }

    #[tokio::test]
    async fn closeable_document_is_closed() {
        let (engine, outcome) =
            release_with(MemoryEngine::new().with_document(DOC, DocumentFixture::text("x"))).await;
        assert_eq!(outcome.unwrap(), CloseOutcome::Closed);
        assert_eq!(engine.count_calls("close"), 1);
        assert_eq!(engine.count_calls("dispose"), 0);
        assert_eq!(engine.open_documents(), 0);
    }

    #[tokio::test]
    async fn veto_is_final() {
        let (engine, outcome) = release_with(
            MemoryEngine::new()
                .with_document(DOC, DocumentFixture::text("x"))
                .veto_close(),
        )
        .await;
        assert_eq!(outcome.unwrap(), CloseOutcome::VetoedPendingExternalClose);
        assert_eq!(engine.count_calls("close"), 1);
        assert_eq!(engine.count_calls("dispose"), 0);
        assert_eq!(engine.open_documents(), 1);
    }

    #[tokio::test]
    async fn non_closeable_model_is_disposed() {
        let (engine, outcome) = release_with(MemoryEngine::new().with_document(
            DOC,
            DocumentFixture::text("x").without(Capability::Closeable),
        ))
        .await;
        assert_eq!(outcome.unwrap(), CloseOutcome::Disposed);
        assert_eq!(engine.count_calls("close"), 0);
        assert_eq!(engine.count_calls("dispose"), 1);
    }

    #[tokio::test]
    async fn bare_component_is_left_alone() {
        let (engine, outcome) =
            release_with(MemoryEngine::new().with_document(DOC, DocumentFixture::bare())).await;
        assert_eq!(outcome.unwrap(), CloseOutcome::NotAModel);
        assert_eq!(engine.count_calls("close"), 0);
        assert_eq!(engine.count_calls("dispose"), 0);
    }

    #[tokio::test]
    async fn close_fault_does_not_fall_back_to_dispose() {
        let (engine, outcome) = release_with(
            MemoryEngine::new()
                .with_document(DOC, DocumentFixture::text("x"))
                .fail_on("close", FaultKind::Disposed, "already gone"),
        )
        .await;
        let err = outcome.unwrap_err();
        assert!(matches!(err, ConvertError::Close { .. }));
        assert_eq!(engine.count_calls("dispose"), 0);
    }
}
