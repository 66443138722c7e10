//! Document handles and their capability surface.
//!
//! The engine's documents are remote objects that may or may not implement
//! a given interface. Instead of casting at every call site, the handle
//! probes the object once at load time and records the answer as a
//! [`CapabilitySet`]. Stages state the capability they need through
//! [`DocumentHandle::require`] and fail with
//! [`ConvertError::CapabilityMissing`] when it is absent.
//!
//! ```text
//! DocumentHandle ─┬─ kind          presentation | text | unknown
//!                 ├─ capabilities  model, closeable, component, storable, …
//!                 ├─ draw_pages()  ─▶ DrawPages ─▶ DrawPage ─▶ Shape
//!                 └─ text()        ─▶ TextBody
//! ```

use crate::bridge::{encode, Any, Bridge, ObjectRef, PropertyValue};
use crate::error::{BridgeError, ConvertError, Stage};
use crate::location;
use crate::session::EngineSession;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::json;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

// ── Kinds ────────────────────────────────────────────────────────────────

/// What kind of document a handle holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Presentation,
    Text,
    Unknown,
}

impl DocumentKind {
    /// Guess the kind from a file extension; `None` when the extension says
    /// nothing (the engine's answer is then taken as-is).
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "odp" | "otp" | "fodp" | "ppt" | "pptx" | "pps" | "ppsx" | "pot" | "potx" => {
                Some(DocumentKind::Presentation)
            }
            "odt" | "ott" | "fodt" | "doc" | "docx" | "dot" | "dotx" | "rtf" | "txt" => {
                Some(DocumentKind::Text)
            }
            _ => None,
        }
    }

    /// Kind implied by the interfaces a loaded component supports.
    pub fn from_capabilities(caps: CapabilitySet) -> Self {
        if caps.contains(Capability::TextBody) {
            DocumentKind::Text
        } else if caps.contains(Capability::DrawPages) && caps.contains(Capability::Presentation) {
            DocumentKind::Presentation
        } else {
            DocumentKind::Unknown
        }
    }

    /// Factory URL the engine understands for a new, empty document.
    pub fn factory_url(self) -> Option<&'static str> {
        match self {
            DocumentKind::Presentation => Some("private:factory/simpress"),
            DocumentKind::Text => Some("private:factory/swriter"),
            DocumentKind::Unknown => None,
        }
    }

    /// Capabilities a document of this kind must expose.
    pub fn required_capabilities(self) -> CapabilitySet {
        match self {
            DocumentKind::Presentation => CapabilitySet::EMPTY
                .with(Capability::DrawPages)
                .with(Capability::Presentation)
                .with(Capability::Storable),
            DocumentKind::Text => CapabilitySet::EMPTY
                .with(Capability::TextBody)
                .with(Capability::Storable),
            DocumentKind::Unknown => CapabilitySet::EMPTY,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentKind::Presentation => "presentation",
            DocumentKind::Text => "text",
            DocumentKind::Unknown => "unknown",
        })
    }
}

// ── Capabilities ─────────────────────────────────────────────────────────

/// An interface a remote document may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Full document-model semantics (`XModel`).
    Model,
    /// Veto-able close protocol (`XCloseable`).
    Closeable,
    /// Unconditional disposal (`XComponent`).
    Component,
    /// Store/export to a URL (`XStorable`).
    Storable,
    /// Draw page supplier (`XDrawPagesSupplier`).
    DrawPages,
    /// Slide show access (`XPresentationSupplier`). Spreadsheets and
    /// drawings supply draw pages too; only presentations have this.
    Presentation,
    /// Text body accessor (`XTextDocument`).
    TextBody,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::Model,
        Capability::Closeable,
        Capability::Component,
        Capability::Storable,
        Capability::DrawPages,
        Capability::Presentation,
        Capability::TextBody,
    ];

    /// Interface name reported by the engine's `getTypes`.
    pub fn interface_name(self) -> &'static str {
        match self {
            Capability::Model => "com.sun.star.frame.XModel",
            Capability::Closeable => "com.sun.star.util.XCloseable",
            Capability::Component => "com.sun.star.lang.XComponent",
            Capability::Storable => "com.sun.star.frame.XStorable",
            Capability::DrawPages => "com.sun.star.drawing.XDrawPagesSupplier",
            Capability::Presentation => "com.sun.star.presentation.XPresentationSupplier",
            Capability::TextBody => "com.sun.star.text.XTextDocument",
        }
    }

    pub fn from_interface_name(name: &str) -> Option<Self> {
        Capability::ALL
            .into_iter()
            .find(|c| c.interface_name() == name)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interface_name())
    }
}

/// Set of [`Capability`] values, fixed at load time.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const EMPTY: CapabilitySet = CapabilitySet(0);

    pub fn all() -> Self {
        Capability::ALL.into_iter().collect()
    }

    pub fn contains(self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub fn with(self, cap: Capability) -> Self {
        CapabilitySet(self.0 | cap.bit())
    }

    pub fn without(self, cap: Capability) -> Self {
        CapabilitySet(self.0 & !cap.bit())
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }

    /// First capability of `required` this set lacks.
    pub fn first_missing(self, required: CapabilitySet) -> Option<Capability> {
        required.iter().find(|c| !self.contains(*c))
    }

    /// Build a set from interface names; unknown names are ignored.
    pub fn from_interfaces<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        names
            .into_iter()
            .filter_map(Capability::from_interface_name)
            .collect()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(CapabilitySet::EMPTY, CapabilitySet::with)
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

// ── Handle ───────────────────────────────────────────────────────────────

/// One open remote document.
///
/// There is no way to close a handle other than passing it by value to
/// [`crate::closer::release`], so no stage can touch a document after its
/// release has been requested.
#[derive(Debug)]
pub struct DocumentHandle {
    bridge: Bridge,
    object: ObjectRef,
    kind: DocumentKind,
    capabilities: CapabilitySet,
    location: String,
}

impl DocumentHandle {
    pub(crate) fn new(
        bridge: Bridge,
        object: ObjectRef,
        capabilities: CapabilitySet,
        location: impl Into<String>,
    ) -> Self {
        Self {
            bridge,
            object,
            kind: DocumentKind::from_capabilities(capabilities),
            capabilities,
            location: location.into(),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    pub fn object(&self) -> ObjectRef {
        self.object
    }

    /// The URL the document was loaded from (or its factory URL).
    pub fn location(&self) -> &str {
        &self.location
    }

    pub(crate) fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Fail with `CapabilityMissing` unless the document exposes `cap`.
    pub fn require(&self, cap: Capability, stage: Stage) -> Result<(), ConvertError> {
        if self.capabilities.contains(cap) {
            Ok(())
        } else {
            Err(ConvertError::CapabilityMissing {
                stage,
                capability: cap,
                kind: self.kind,
            })
        }
    }

    /// The document's draw page container.
    pub async fn draw_pages(&self) -> Result<DrawPages, ConvertError> {
        self.require(Capability::DrawPages, Stage::Transform)?;
        let container = self
            .bridge
            .call_required_object(self.object, "getDrawPages", vec![])
            .await
            .map_err(|source| ConvertError::Transform {
                page: None,
                shape: None,
                source,
            })?;
        Ok(DrawPages {
            bridge: self.bridge.clone(),
            object: container,
        })
    }

    /// The document's text body.
    pub async fn text(&self) -> Result<TextBody, ConvertError> {
        self.require(Capability::TextBody, Stage::Load)?;
        let text = self
            .bridge
            .call_required_object(self.object, "getText", vec![])
            .await
            .map_err(|source| ConvertError::Load {
                location: self.location.clone(),
                source,
            })?;
        Ok(TextBody {
            bridge: self.bridge.clone(),
            object: text,
        })
    }
}

// ── Draw pages and shapes ────────────────────────────────────────────────

/// Indexed container of a presentation's draw pages.
#[derive(Debug)]
pub struct DrawPages {
    bridge: Bridge,
    object: ObjectRef,
}

impl DrawPages {
    pub async fn count(&self) -> Result<usize, BridgeError> {
        self.bridge.call_count(self.object, "getCount", vec![]).await
    }

    pub async fn page(&self, index: usize) -> Result<DrawPage, BridgeError> {
        let object = self
            .bridge
            .call_required_object(self.object, "getByIndex", vec![json!(index)])
            .await?;
        Ok(DrawPage {
            bridge: self.bridge.clone(),
            object,
            index,
        })
    }
}

/// One draw page: an ordered sequence of shapes.
#[derive(Debug)]
pub struct DrawPage {
    bridge: Bridge,
    object: ObjectRef,
    index: usize,
}

impl DrawPage {
    /// Zero-based position in the document.
    pub fn index(&self) -> usize {
        self.index
    }

    pub async fn shape_count(&self) -> Result<usize, BridgeError> {
        self.bridge.call_count(self.object, "getCount", vec![]).await
    }

    pub async fn shape(&self, index: usize) -> Result<Shape, BridgeError> {
        let object = self
            .bridge
            .call_required_object(self.object, "getByIndex", vec![json!(index)])
            .await?;
        Ok(Shape {
            bridge: self.bridge.clone(),
            object,
            index,
        })
    }
}

/// A shape on a draw page and its property set.
#[derive(Debug)]
pub struct Shape {
    bridge: Bridge,
    object: ObjectRef,
    index: usize,
}

impl Shape {
    /// Zero-based position on its page.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the shape's property set declares `name`.
    pub async fn has_property(&self, name: &str) -> Result<bool, BridgeError> {
        let info = self
            .bridge
            .call_required_object(self.object, "getPropertySetInfo", vec![])
            .await?;
        self.bridge
            .call_bool(info, "hasPropertyByName", vec![json!(name)])
            .await
    }

    pub async fn property(&self, name: &str) -> Result<Any, BridgeError> {
        self.bridge
            .call_any(self.object, "getPropertyValue", vec![json!(name)])
            .await
    }

    pub async fn set_property(&self, name: &str, value: Any) -> Result<(), BridgeError> {
        self.bridge
            .call_unit(
                self.object,
                "setPropertyValue",
                vec![json!(name), encode(&value)?],
            )
            .await
    }
}

/// A text document's body.
#[derive(Debug)]
pub struct TextBody {
    bridge: Bridge,
    object: ObjectRef,
}

impl TextBody {
    /// Replace the whole body with `text`.
    pub async fn set_string(&self, text: &str) -> Result<(), BridgeError> {
        self.bridge
            .call_unit(self.object, "setString", vec![json!(text)])
            .await
    }

    pub async fn string(&self) -> Result<String, BridgeError> {
        let value = self.bridge.call(self.object, "getString", vec![]).await?;
        serde_json::from_value(value).map_err(|e| BridgeError::UnexpectedReply {
            method: "getString".to_string(),
            detail: e.to_string(),
        })
    }
}

// ── Load / create ────────────────────────────────────────────────────────

/// Media descriptor for opening a document without a visible window and
/// without adding it to the recent-documents list.
pub fn load_descriptor() -> Vec<PropertyValue> {
    vec![
        PropertyValue::new("Hidden", true),
        PropertyValue::new("PickListEntry", false),
    ]
}

/// Open the document at `url`.
///
/// `url` must be absolute (see [`crate::location::file_url`]). When
/// `expected` names a kind, the loaded document must expose that kind's
/// required capabilities; otherwise it is released again and
/// `CapabilityMissing` is returned.
pub async fn load(
    session: &EngineSession,
    url: &str,
    expected: Option<DocumentKind>,
) -> Result<DocumentHandle, ConvertError> {
    if !location::is_absolute_url(url) {
        return Err(ConvertError::InvalidLocation {
            location: url.to_string(),
            reason: "the engine only loads absolute URLs".to_string(),
        });
    }
    info!("Loading {}", url);
    open_component(session, url, expected).await
}

/// Synthesise a new, empty document of `kind`.
pub async fn create(
    session: &EngineSession,
    kind: DocumentKind,
) -> Result<DocumentHandle, ConvertError> {
    let url = kind
        .factory_url()
        .ok_or(ConvertError::UnsupportedKind { kind })?;
    info!("Creating new {} document", kind);
    open_component(session, url, Some(kind)).await
}

async fn open_component(
    session: &EngineSession,
    url: &str,
    expected: Option<DocumentKind>,
) -> Result<DocumentHandle, ConvertError> {
    let bridge = session.bridge();
    let load_err = |source: BridgeError| ConvertError::Load {
        location: url.to_string(),
        source,
    };

    let descriptor = encode(&load_descriptor()).map_err(load_err)?;
    let object = bridge
        .call_object(
            session.desktop(),
            "loadComponentFromURL",
            vec![json!(url), json!("_blank"), json!(0), descriptor],
        )
        .await
        .map_err(load_err)?
        .ok_or_else(|| ConvertError::SourceUnreadable {
            location: url.to_string(),
        })?;

    let interfaces = match bridge.call_strings(object, "getTypes", vec![]).await {
        Ok(interfaces) => interfaces,
        Err(source) => {
            warn!("Probing {} failed: {}; releasing the document again", url, source);
            match crate::closer::release_unprobed(bridge, object, url).await {
                Ok(outcome) => debug!("Released unprobed document: {:?}", outcome),
                Err(e) => warn!("Releasing unprobed document failed: {}", e),
            }
            return Err(load_err(source));
        }
    };
    let capabilities = CapabilitySet::from_interfaces(interfaces.iter().map(String::as_str));
    let handle = DocumentHandle::new(bridge.clone(), object, capabilities, url);
    debug!(
        "Loaded {} as {} document with {:?}",
        url,
        handle.kind(),
        capabilities
    );

    if let Some(kind) = expected {
        if let Some(missing) = capabilities.first_missing(kind.required_capabilities()) {
            let err = ConvertError::CapabilityMissing {
                stage: Stage::Load,
                capability: missing,
                kind,
            };
            warn!("{}; releasing the document again", err);
            match crate::closer::release(handle).await {
                Ok(outcome) => debug!("Released mismatched document: {:?}", outcome),
                Err(e) => warn!("Releasing mismatched document failed: {}", e),
            }
            return Err(err);
        }
    }

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(
            DocumentKind::from_extension(Path::new("/a/slides.ODP")),
            Some(DocumentKind::Presentation)
        );
        assert_eq!(
            DocumentKind::from_extension(Path::new("deck.pptx")),
            Some(DocumentKind::Presentation)
        );
        assert_eq!(
            DocumentKind::from_extension(Path::new("letter.docx")),
            Some(DocumentKind::Text)
        );
        assert_eq!(DocumentKind::from_extension(Path::new("sheet.ods")), None);
        assert_eq!(DocumentKind::from_extension(Path::new("README")), None);
    }

    #[test]
    fn kind_from_capabilities() {
        let text = CapabilitySet::EMPTY
            .with(Capability::Model)
            .with(Capability::TextBody);
        assert_eq!(DocumentKind::from_capabilities(text), DocumentKind::Text);

        let deck = CapabilitySet::EMPTY
            .with(Capability::DrawPages)
            .with(Capability::Presentation);
        assert_eq!(
            DocumentKind::from_capabilities(deck),
            DocumentKind::Presentation
        );

        // spreadsheets and drawings supply draw pages but are not decks
        let sheet = CapabilitySet::EMPTY
            .with(Capability::Model)
            .with(Capability::DrawPages);
        assert_eq!(DocumentKind::from_capabilities(sheet), DocumentKind::Unknown);

        assert_eq!(
            DocumentKind::from_capabilities(CapabilitySet::EMPTY.with(Capability::Component)),
            DocumentKind::Unknown
        );
    }

    #[test]
    fn capability_set_from_interfaces() {
        let caps = CapabilitySet::from_interfaces([
            "com.sun.star.frame.XModel",
            "com.sun.star.frame.XStorable",
            "com.sun.star.beans.XPropertySet",
        ]);
        assert!(caps.contains(Capability::Model));
        assert!(caps.contains(Capability::Storable));
        assert!(!caps.contains(Capability::Closeable));
        assert_eq!(caps.iter().count(), 2);
    }

    #[test]
    fn first_missing_capability() {
        let caps = CapabilitySet::EMPTY.with(Capability::DrawPages);
        assert_eq!(
            caps.first_missing(DocumentKind::Presentation.required_capabilities()),
            Some(Capability::Storable)
        );
        assert_eq!(
            CapabilitySet::all().first_missing(DocumentKind::Text.required_capabilities()),
            None
        );
    }

    #[test]
    fn capability_set_serialises_as_list() {
        let caps = CapabilitySet::EMPTY
            .with(Capability::Storable)
            .with(Capability::Model);
        let v = serde_json::to_value(caps).unwrap();
        assert_eq!(v, serde_json::json!(["model", "storable"]));
    }

    #[test]
    fn load_descriptor_is_hidden_and_off_the_recent_list() {
        let d = load_descriptor();
        assert_eq!(
            crate::bridge::find_property(&d, "Hidden"),
            Some(&Any::Boolean(true))
        );
        assert_eq!(
            crate::bridge::find_property(&d, "PickListEntry"),
            Some(&Any::Boolean(false))
        );
    }
}
