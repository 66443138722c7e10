//! PDF export: filter selection, filter options, and the `storeToURL` call.
//!
//! The filter names and option keys are the engine's, reproduced verbatim:
//!
//! | Kind         | Filter               | Options                                   |
//! |--------------|----------------------|-------------------------------------------|
//! | Presentation | `impress_pdf_Export` | `UseLosslessCompression` (bool), `Quality` (long) |
//! | Text         | `writer_pdf_Export`  | `Watermark` (string)                      |

use crate::bridge::{encode, PropertyValue};
use crate::config::ConversionConfig;
use crate::document::{Capability, DocumentHandle, DocumentKind};
use crate::error::{BridgeError, ConvertError, Stage};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::{info, warn};

pub const IMPRESS_PDF_EXPORT: &str = "impress_pdf_Export";
pub const WRITER_PDF_EXPORT: &str = "writer_pdf_Export";

/// A PDF export filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportFilter {
    #[serde(rename = "impress_pdf_Export")]
    ImpressPdf,
    #[serde(rename = "writer_pdf_Export")]
    WriterPdf,
}

impl ExportFilter {
    pub fn name(self) -> &'static str {
        match self {
            ExportFilter::ImpressPdf => IMPRESS_PDF_EXPORT,
            ExportFilter::WriterPdf => WRITER_PDF_EXPORT,
        }
    }

    /// The filter that exports documents of `kind`.
    pub fn for_kind(kind: DocumentKind) -> Option<Self> {
        match kind {
            DocumentKind::Presentation => Some(ExportFilter::ImpressPdf),
            DocumentKind::Text => Some(ExportFilter::WriterPdf),
            DocumentKind::Unknown => None,
        }
    }

    /// The document kind this filter accepts.
    pub fn kind(self) -> DocumentKind {
        match self {
            ExportFilter::ImpressPdf => DocumentKind::Presentation,
            ExportFilter::WriterPdf => DocumentKind::Text,
        }
    }
}

impl fmt::Display for ExportFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Filter plus filter options for one export call.
///
/// Immutable once built: there are no setters, so a spec cannot pick up
/// options from an earlier export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpec {
    filter: ExportFilter,
    options: Vec<PropertyValue>,
}

impl ExportSpec {
    /// `impress_pdf_Export` with the given compression mode and quality.
    /// `quality` is passed through untouched.
    pub fn presentation(lossless_compression: bool, quality: i32) -> Self {
        Self {
            filter: ExportFilter::ImpressPdf,
            options: vec![
                PropertyValue::new("UseLosslessCompression", lossless_compression),
                PropertyValue::new("Quality", quality),
            ],
        }
    }

    /// `writer_pdf_Export`, with a `Watermark` option only when `watermark`
    /// is given.
    pub fn text(watermark: Option<&str>) -> Self {
        Self {
            filter: ExportFilter::WriterPdf,
            options: watermark
                .map(|w| vec![PropertyValue::new("Watermark", w)])
                .unwrap_or_default(),
        }
    }

    /// The spec `config` calls for on a document of `kind`.
    pub fn for_kind(kind: DocumentKind, config: &ConversionConfig) -> Option<Self> {
        match ExportFilter::for_kind(kind)? {
            ExportFilter::ImpressPdf => Some(Self::presentation(
                config.lossless_compression,
                config.quality,
            )),
            ExportFilter::WriterPdf => Some(Self::text(config.watermark.as_deref())),
        }
    }

    pub fn filter(&self) -> ExportFilter {
        self.filter
    }

    pub fn options(&self) -> &[PropertyValue] {
        &self.options
    }

    /// The `storeToURL` media descriptor: filter name, filter data, and
    /// `Overwrite = true`.
    pub fn media_descriptor(&self) -> Vec<PropertyValue> {
        vec![
            PropertyValue::new("FilterName", self.filter.name()),
            PropertyValue::new("FilterData", self.options.clone()),
            PropertyValue::new("Overwrite", true),
        ]
    }
}

/// Write `handle` as PDF to `destination_url`, replacing whatever is there.
///
/// Fails with `CapabilityMissing` when the document is not storable and
/// with `FilterMismatch` when `spec`'s filter does not fit the document
/// kind. Faults raised by the engine (including out-of-range options)
/// become [`ConvertError::Export`].
pub async fn export(
    handle: &DocumentHandle,
    destination_url: &str,
    spec: &ExportSpec,
) -> Result<(), ConvertError> {
    handle.require(Capability::Storable, Stage::Export)?;
    if spec.filter().kind() != handle.kind() {
        return Err(ConvertError::FilterMismatch {
            filter: spec.filter().name().to_string(),
            kind: handle.kind(),
        });
    }

    info!("Exporting {} with {}", destination_url, spec.filter());
    let export_err = |source: BridgeError| ConvertError::Export {
        destination: destination_url.to_string(),
        source,
    };
    let descriptor = encode(&spec.media_descriptor()).map_err(export_err)?;

    handle
        .bridge()
        .call_unit(
            handle.object(),
            "storeToURL",
            vec![json!(destination_url), descriptor],
        )
        .await
        .map_err(|source| {
            warn!("Export to {} failed: {}", destination_url, source);
            export_err(source)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{find_property, Any};

    #[test]
    fn presentation_spec_matches_filter_contract() {
        let spec = ExportSpec::presentation(false, 80);
        let d = spec.media_descriptor();
        assert_eq!(
            find_property(&d, "FilterName"),
            Some(&Any::from("impress_pdf_Export"))
        );
        let data = find_property(&d, "FilterData")
            .and_then(Any::as_sequence)
            .unwrap();
        assert_eq!(
            find_property(data, "UseLosslessCompression"),
            Some(&Any::Boolean(false))
        );
        assert_eq!(find_property(data, "Quality"), Some(&Any::Long(80)));
        assert_eq!(find_property(&d, "Overwrite"), Some(&Any::Boolean(true)));
    }

    #[test]
    fn text_spec_omits_absent_watermark() {
        assert!(ExportSpec::text(None).options().is_empty());
        let spec = ExportSpec::text(Some("watermark test"));
        assert_eq!(
            find_property(spec.options(), "Watermark"),
            Some(&Any::from("watermark test"))
        );
        assert_eq!(spec.filter().name(), "writer_pdf_Export");
    }

    #[test]
    fn spec_for_kind_follows_config() {
        let config = ConversionConfig::builder()
            .lossless_compression(true)
            .quality(95)
            .watermark("DRAFT")
            .build()
            .unwrap();

        let spec = ExportSpec::for_kind(DocumentKind::Presentation, &config).unwrap();
        assert_eq!(spec.filter(), ExportFilter::ImpressPdf);
        assert_eq!(find_property(spec.options(), "Quality"), Some(&Any::Long(95)));
        assert!(find_property(spec.options(), "Watermark").is_none());

        let spec = ExportSpec::for_kind(DocumentKind::Text, &config).unwrap();
        assert_eq!(spec.filter(), ExportFilter::WriterPdf);
        assert!(find_property(spec.options(), "Quality").is_none());

        assert!(ExportSpec::for_kind(DocumentKind::Unknown, &config).is_none());
    }

    #[test]
    fn filter_serialises_by_engine_name() {
        assert_eq!(
            serde_json::to_value(ExportFilter::WriterPdf).unwrap(),
            json!("writer_pdf_Export")
        );
    }
}
