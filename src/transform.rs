//! Pre-export transforms.
//!
//! Only one exists: shadows on presentation shapes are switched off before
//! export. Text documents pass through untouched.

use crate::bridge::Any;
use crate::document::{DocumentHandle, DocumentKind};
use crate::error::{BridgeError, ConvertError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Shape property cleared by [`remove_shadows`].
pub const SHADOW_PROPERTY: &str = "Shadow";

/// Counts from one transform run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformReport {
    pub pages_visited: usize,
    pub shapes_visited: usize,
    /// Shapes that expose the shadow property and were set to off.
    pub shadows_cleared: usize,
    /// `true` when the document kind has no pre-export transform.
    pub skipped: bool,
}

/// Set `Shadow = false` on every shape of every draw page that declares the
/// property, in page order then shape order.
///
/// Shapes without the property are not touched. Any failure reading or
/// writing a property aborts with [`ConvertError::Transform`] naming the
/// page and shape.
pub async fn remove_shadows(handle: &DocumentHandle) -> Result<TransformReport, ConvertError> {
    if handle.kind() != DocumentKind::Presentation {
        debug!("No pre-export transform for {} documents", handle.kind());
        return Ok(TransformReport {
            skipped: true,
            ..TransformReport::default()
        });
    }

    let pages = handle.draw_pages().await?;
    let page_count = pages.count().await.map_err(|source| ConvertError::Transform {
        page: None,
        shape: None,
        source,
    })?;

    let mut report = TransformReport::default();
    for p in 0..page_count {
        let at_page = |source: BridgeError| ConvertError::Transform {
            page: Some(p),
            shape: None,
            source,
        };
        let page = pages.page(p).await.map_err(at_page)?;
        let shape_count = page.shape_count().await.map_err(at_page)?;
        report.pages_visited += 1;

        for s in 0..shape_count {
            let at_shape = |source: BridgeError| ConvertError::Transform {
                page: Some(p),
                shape: Some(s),
                source,
            };
            let shape = page.shape(s).await.map_err(at_shape)?;
            report.shapes_visited += 1;

            if shape.has_property(SHADOW_PROPERTY).await.map_err(at_shape)? {
                shape
                    .set_property(SHADOW_PROPERTY, Any::Boolean(false))
                    .await
                    .map_err(at_shape)?;
                report.shadows_cleared += 1;
                debug!("Cleared shadow on page {}, shape {}", p + 1, s + 1);
            }
        }
    }

    info!(
        "Removed shadows: {} of {} shapes across {} pages",
        report.shadows_cleared, report.shapes_visited, report.pages_visited
    );
    Ok(report)
}
