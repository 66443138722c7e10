//! Error types for the edgequake-office2pdf library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`BridgeError`]: **Transport**: a single remote call failed. Either the
//!   engine answered with a fault (an exception raised on the remote side),
//!   or the bridge itself broke (socket closed, garbled reply, timeout).
//!
//! * [`ConvertError`]: **Fatal per document**: the pipeline for one document
//!   cannot continue. Every variant knows which [`Stage`] it belongs to so
//!   diagnostics can name the failing stage along with the cause.
//!
//! A close veto is *not* an error at either layer: it is reported as
//! [`crate::closer::CloseOutcome::VetoedPendingExternalClose`].

use crate::bridge::{FaultKind, RemoteFault};
use crate::document::{Capability, DocumentKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Argument, path and configuration handling before any remote call.
    Setup,
    Connect,
    Load,
    Transform,
    Export,
    Close,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Connect => "connect",
            Stage::Load => "load",
            Stage::Transform => "transform",
            Stage::Export => "export",
            Stage::Close => "close",
        };
        f.write_str(name)
    }
}

/// A failed remote call.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The engine raised an exception while executing the call.
    #[error("{0}")]
    Fault(#[from] RemoteFault),

    /// Reading from or writing to the bridge socket failed.
    #[error("bridge I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream itself is corrupt: a reply line that is not a
    /// well-formed response. Nothing after it can be trusted.
    #[error("bridge protocol error: {0}")]
    Protocol(String),

    /// A well-formed reply whose result does not fit the call, such as
    /// `null` where an object was required. The connection stays in sync.
    #[error("unexpected reply to '{method}': {detail}")]
    UnexpectedReply { method: String, detail: String },

    /// The engine closed the connection.
    #[error("the office engine closed the bridge connection")]
    Disconnected,

    /// No reply arrived within the configured call timeout.
    #[error("remote call '{method}' timed out after {elapsed_ms}ms")]
    Timeout { method: String, elapsed_ms: u64 },
}

impl BridgeError {
    /// The remote exception kind, if the engine raised one.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            BridgeError::Fault(f) => Some(f.kind()),
            _ => None,
        }
    }

    /// `true` when the session can no longer be trusted for further calls.
    ///
    /// Remote faults and unexpected results leave the bridge usable. I/O
    /// errors, a corrupt stream, a disconnect and a timeout (after which a
    /// late reply may still be in flight) do not.
    pub fn is_session_fatal(&self) -> bool {
        match self {
            BridgeError::Fault(_) | BridgeError::UnexpectedReply { .. } => false,
            BridgeError::Io(_)
            | BridgeError::Protocol(_)
            | BridgeError::Disconnected
            | BridgeError::Timeout { .. } => true,
        }
    }
}

/// All fatal errors returned by the conversion pipeline.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Connect ───────────────────────────────────────────────────────────
    /// The automation bridge could not be reached.
    #[error(
        "Cannot connect to the office engine at {endpoint}: {reason}\n\
Start the engine's automation bridge first and check --endpoint."
    )]
    Connection { endpoint: String, reason: String },

    /// The bridge answered but exposes no service factory or desktop.
    #[error("The office engine at {endpoint} did not provide a {service}")]
    ServiceFactoryUnavailable { endpoint: String, service: String },

    // ── Load ──────────────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Source document not found: '{path}'\nCheck the path exists and is readable.")]
    SourceNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The engine raised an error while opening the document.
    #[error("Failed to load '{location}': {source}")]
    Load {
        location: String,
        #[source]
        source: BridgeError,
    },

    /// The engine returned no document for the location.
    #[error("The office engine could not open '{location}' (wrong or corrupt format?)")]
    SourceUnreadable { location: String },

    /// No factory or export filter exists for this document kind.
    #[error("Unsupported document kind '{kind}' (expected a presentation or a text document)")]
    UnsupportedKind { kind: DocumentKind },

    // ── Any stage ─────────────────────────────────────────────────────────
    /// The document lacks an interface a stage needs.
    #[error("{stage} stage requires {capability} but the {kind} document does not provide it")]
    CapabilityMissing {
        stage: Stage,
        capability: Capability,
        kind: DocumentKind,
    },

    // ── Transform ─────────────────────────────────────────────────────────
    /// Reading or writing a shape property failed.
    #[error("Shadow removal failed at {}: {source}", describe_position(*page, *shape))]
    Transform {
        page: Option<usize>,
        shape: Option<usize>,
        #[source]
        source: BridgeError,
    },

    // ── Export ────────────────────────────────────────────────────────────
    /// An export filter was paired with the wrong kind of document.
    #[error("Export filter '{filter}' cannot be used for a {kind} document")]
    FilterMismatch { filter: String, kind: DocumentKind },

    /// Writing the PDF failed.
    #[error("Failed to export PDF to '{destination}': {source}")]
    Export {
        destination: String,
        #[source]
        source: BridgeError,
    },

    // ── Close ─────────────────────────────────────────────────────────────
    /// Closing or disposing the document raised something other than a veto.
    #[error("Failed to release '{location}': {source}")]
    Close {
        location: String,
        #[source]
        source: BridgeError,
    },

    // ── Batch ─────────────────────────────────────────────────────────────
    /// Some documents of a batch failed.
    ///
    /// Returned by [`crate::output::BatchReport::into_result`] when the
    /// caller wants to treat any document failure as an error.
    #[error("{failed}/{total} documents failed to convert")]
    BatchFailed { failed: usize, total: usize },

    // ── Setup ─────────────────────────────────────────────────────────────
    /// A path or URL is not an absolute, addressable location.
    #[error("Invalid location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// The stage this error aborted.
    pub fn stage(&self) -> Stage {
        match self {
            ConvertError::Connection { .. } | ConvertError::ServiceFactoryUnavailable { .. } => {
                Stage::Connect
            }
            ConvertError::SourceNotFound { .. }
            | ConvertError::PermissionDenied { .. }
            | ConvertError::Load { .. }
            | ConvertError::SourceUnreadable { .. }
            | ConvertError::UnsupportedKind { .. } => Stage::Load,
            ConvertError::CapabilityMissing { stage, .. } => *stage,
            ConvertError::Transform { .. } => Stage::Transform,
            ConvertError::FilterMismatch { .. } | ConvertError::Export { .. } => Stage::Export,
            ConvertError::Close { .. } => Stage::Close,
            ConvertError::BatchFailed { .. }
            | ConvertError::InvalidLocation { .. }
            | ConvertError::InvalidConfig(_)
            | ConvertError::Internal(_) => Stage::Setup,
        }
    }

    /// `true` when the engine session is unusable and a batch must stop.
    pub fn is_session_fatal(&self) -> bool {
        match self {
            ConvertError::Connection { .. } | ConvertError::ServiceFactoryUnavailable { .. } => {
                true
            }
            ConvertError::Load { source, .. }
            | ConvertError::Transform { source, .. }
            | ConvertError::Export { source, .. }
            | ConvertError::Close { source, .. } => source.is_session_fatal(),
            _ => false,
        }
    }

    /// The underlying bridge error, if the failure came from a remote call.
    pub fn bridge_error(&self) -> Option<&BridgeError> {
        match self {
            ConvertError::Load { source, .. }
            | ConvertError::Transform { source, .. }
            | ConvertError::Export { source, .. }
            | ConvertError::Close { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn describe_position(page: Option<usize>, shape: Option<usize>) -> String {
    match (page, shape) {
        (Some(p), Some(s)) => format!("page {}, shape {}", p + 1, s + 1),
        (Some(p), None) => format!("page {}", p + 1),
        _ => "the draw page list".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault(kind: FaultKind) -> BridgeError {
        BridgeError::Fault(RemoteFault::new(kind, "boom"))
    }

    #[test]
    fn transform_display_is_one_based() {
        let e = ConvertError::Transform {
            page: Some(1),
            shape: Some(0),
            source: fault(FaultKind::PropertyVeto),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 2, shape 1"), "got: {msg}");
        assert!(msg.contains("PropertyVetoException"), "got: {msg}");
    }

    #[test]
    fn stage_attribution() {
        let e = ConvertError::SourceNotFound {
            path: PathBuf::from("/nope.odp"),
        };
        assert_eq!(e.stage(), Stage::Load);

        let e = ConvertError::CapabilityMissing {
            stage: Stage::Export,
            capability: Capability::Storable,
            kind: DocumentKind::Text,
        };
        assert_eq!(e.stage(), Stage::Export);
        assert!(e.to_string().contains("export stage"));
    }

    #[test]
    fn remote_faults_keep_session_alive() {
        let e = ConvertError::Export {
            destination: "file:///tmp/out.pdf".into(),
            source: fault(FaultKind::Io),
        };
        assert!(!e.is_session_fatal());

        let e = ConvertError::Export {
            destination: "file:///tmp/out.pdf".into(),
            source: BridgeError::Timeout {
                method: "storeToURL".into(),
                elapsed_ms: 5000,
            },
        };
        assert!(e.is_session_fatal());
        assert!(e.to_string().contains("5000ms"));
    }

    #[test]
    fn odd_reply_fails_only_the_document() {
        let e = ConvertError::Transform {
            page: Some(0),
            shape: Some(2),
            source: BridgeError::UnexpectedReply {
                method: "getPropertySetInfo".into(),
                detail: "no object returned".into(),
            },
        };
        assert!(!e.is_session_fatal());
        assert!(e.to_string().contains("getPropertySetInfo"));

        assert!(BridgeError::Protocol("malformed reply".into()).is_session_fatal());
        assert!(BridgeError::Disconnected.is_session_fatal());
    }

    #[test]
    fn batch_failed_display() {
        let e = ConvertError::BatchFailed {
            failed: 1,
            total: 10,
        };
        assert!(e.to_string().contains("1/10"));
    }

    #[test]
    fn stage_display_is_lowercase() {
        assert_eq!(Stage::Transform.to_string(), "transform");
        assert_eq!(Stage::Connect.to_string(), "connect");
    }
}
