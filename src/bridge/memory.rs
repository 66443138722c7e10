//! In-process stand-in for the office engine.
//!
//! [`MemoryEngine`] implements [`Transport`] over a small object graph held
//! in memory: a service manager, a desktop, and the documents registered
//! with [`MemoryEngine::with_document`]. It answers the same calls the real
//! bridge does and raises the same faults, so the whole pipeline can run
//! without an engine process:
//!
//! ```rust,no_run
//! use edgequake_office2pdf::bridge::memory::{DocumentFixture, MemoryEngine, ShapeFixture};
//!
//! let engine = MemoryEngine::new().with_document(
//!     "file:///tmp/deck.odp",
//!     DocumentFixture::presentation(vec![vec![ShapeFixture::shadowed(), ShapeFixture::plain()]]),
//! );
//! ```
//!
//! Every call is recorded; tests inspect [`MemoryEngine::calls`],
//! [`MemoryEngine::stores`] and the final shape properties to check what
//! the pipeline actually did. `storeToURL` against a `file://` URL writes a
//! small placeholder PDF so callers can check the destination on disk.

use super::{find_property, Any, FaultKind, ObjectRef, PropertyValue, RemoteCall, RemoteFault, Transport};
use crate::document::{Capability, CapabilitySet};
use crate::error::BridgeError;
use crate::export::{IMPRESS_PDF_EXPORT, WRITER_PDF_EXPORT};
use crate::location;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

const DESKTOP_SERVICE: &str = "com.sun.star.frame.Desktop";
const WRITER_FACTORY: &str = "private:factory/swriter";
const IMPRESS_FACTORY: &str = "private:factory/simpress";

// ── Fixtures ─────────────────────────────────────────────────────────────

/// A shape on a fixture draw page.
#[derive(Debug, Clone, Default)]
pub struct ShapeFixture {
    properties: BTreeMap<String, Any>,
    frozen: BTreeSet<String>,
}

impl ShapeFixture {
    /// A shape with `Shadow = true`.
    pub fn shadowed() -> Self {
        Self::default().with_property("Shadow", true)
    }

    /// A shape with `Shadow = false`.
    pub fn plain() -> Self {
        Self::default().with_property("Shadow", false)
    }

    /// A shape without a `Shadow` property at all (e.g. a group or a
    /// media object).
    pub fn without_shadow() -> Self {
        Self::default().with_property("Name", "Media")
    }

    pub fn with_property(mut self, name: &str, value: impl Into<Any>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Make writes to `name` fail with a property veto.
    pub fn frozen(mut self, name: &str) -> Self {
        self.frozen.insert(name.to_string());
        self
    }
}

/// A document the engine can load.
#[derive(Debug, Clone)]
pub struct DocumentFixture {
    capabilities: CapabilitySet,
    pages: Vec<Vec<ShapeFixture>>,
    text: Option<String>,
    unreadable: bool,
}

impl DocumentFixture {
    /// A presentation with the given pages of shapes.
    pub fn presentation(pages: Vec<Vec<ShapeFixture>>) -> Self {
        Self {
            capabilities: CapabilitySet::all().without(Capability::TextBody),
            pages,
            text: None,
            unreadable: false,
        }
    }

    /// A text document with the given body.
    pub fn text(body: &str) -> Self {
        Self {
            capabilities: CapabilitySet::all()
                .without(Capability::DrawPages)
                .without(Capability::Presentation),
            pages: Vec::new(),
            text: Some(body.to_string()),
            unreadable: false,
        }
    }

    /// A spreadsheet: draw pages of shapes, but no slide show and no text
    /// body.
    pub fn spreadsheet(pages: Vec<Vec<ShapeFixture>>) -> Self {
        Self::presentation(pages).without(Capability::Presentation)
    }

    /// A component that is neither a model nor closeable; it can only be
    /// disposed.
    pub fn bare() -> Self {
        Self {
            capabilities: CapabilitySet::EMPTY.with(Capability::Component),
            pages: Vec::new(),
            text: None,
            unreadable: false,
        }
    }

    /// A file the engine cannot parse: loading answers with no document.
    pub fn unreadable() -> Self {
        Self {
            unreadable: true,
            ..Self::bare()
        }
    }

    /// Drop one interface from the document.
    pub fn without(mut self, cap: Capability) -> Self {
        self.capabilities = self.capabilities.without(cap);
        self
    }
}

// ── Inspection records ───────────────────────────────────────────────────

/// One `storeToURL` call as the engine received it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
    /// Location of the stored document.
    pub document: String,
    pub url: String,
    pub filter: Option<String>,
    pub filter_data: Vec<PropertyValue>,
    pub overwrite: bool,
}

// ── Engine state ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Obj {
    ServiceManager,
    Desktop,
    Document(usize),
    DrawPages(usize),
    Page(usize, usize),
    Shape(usize, usize, usize),
    PropertySetInfo(usize, usize, usize),
    Text(usize),
}

impl Obj {
    fn document(self) -> Option<usize> {
        match self {
            Obj::ServiceManager | Obj::Desktop => None,
            Obj::Document(d)
            | Obj::DrawPages(d)
            | Obj::Page(d, _)
            | Obj::Shape(d, _, _)
            | Obj::PropertySetInfo(d, _, _)
            | Obj::Text(d) => Some(d),
        }
    }
}

#[derive(Debug)]
struct OpenDocument {
    location: String,
    fixture: DocumentFixture,
    released: bool,
    close_requests: usize,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<u64, Obj>,
    next_oid: u64,
    documents: Vec<OpenDocument>,
    calls: Vec<RemoteCall>,
    stores: Vec<StoreRecord>,
}

impl State {
    fn register(&mut self, obj: Obj) -> Value {
        let oid = self.next_oid;
        self.next_oid += 1;
        self.objects.insert(oid, obj);
        json!({ "oid": oid })
    }
}

/// Scripted in-memory engine. See the [module docs](self).
#[derive(Debug)]
pub struct MemoryEngine {
    fixtures: HashMap<String, DocumentFixture>,
    service_manager: bool,
    veto_close: bool,
    faults: HashMap<String, RemoteFault>,
    stall_on: Option<String>,
    disconnect_on: Option<String>,
    state: Mutex<State>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        let mut state = State {
            next_oid: 1,
            ..State::default()
        };
        state.register(Obj::ServiceManager);
        state.register(Obj::Desktop);

        Self {
            fixtures: HashMap::new(),
            service_manager: true,
            veto_close: false,
            faults: HashMap::new(),
            stall_on: None,
            disconnect_on: None,
            state: Mutex::new(state),
        }
    }

    /// Make `url` loadable.
    pub fn with_document(mut self, url: impl Into<String>, fixture: DocumentFixture) -> Self {
        self.fixtures.insert(url.into(), fixture);
        self
    }

    /// Make the local file at `path` loadable under its `file://` URL.
    pub fn with_file(self, path: impl AsRef<Path>, fixture: DocumentFixture) -> Self {
        let path = path.as_ref();
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        match location::file_url(&path) {
            Ok(url) => self.with_document(url, fixture),
            Err(e) => {
                warn!("Memory engine ignores fixture {}: {}", path.display(), e);
                self
            }
        }
    }

    /// Answer `getServiceManager` with null.
    pub fn without_service_manager(mut self) -> Self {
        self.service_manager = false;
        self
    }

    /// Refuse every `close(true)` with a close veto.
    pub fn veto_close(mut self) -> Self {
        self.veto_close = true;
        self
    }

    /// Raise `fault` from every call to `method`.
    pub fn fail_on(mut self, method: &str, kind: FaultKind, message: &str) -> Self {
        self.faults
            .insert(method.to_string(), RemoteFault::new(kind, message));
        self
    }

    /// Never answer calls to `method`.
    pub fn stall_on(mut self, method: &str) -> Self {
        self.stall_on = Some(method.to_string());
        self
    }

    /// Drop the connection when `method` is called.
    pub fn disconnect_on(mut self, method: &str) -> Self {
        self.disconnect_on = Some(method.to_string());
        self
    }

    // ── Inspection ───────────────────────────────────────────────────────

    /// Every call received, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Method names of every call received, in order.
    pub fn methods(&self) -> Vec<String> {
        self.lock().calls.iter().map(|c| c.method.clone()).collect()
    }

    pub fn count_calls(&self, method: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn stores(&self) -> Vec<StoreRecord> {
        self.lock().stores.clone()
    }

    /// Current value of a shape property in the most recently opened
    /// document at `location`.
    pub fn shape_property(
        &self,
        location: &str,
        page: usize,
        shape: usize,
        name: &str,
    ) -> Option<Any> {
        let state = self.lock();
        let doc = state.documents.iter().rev().find(|d| d.location == location)?;
        doc.fixture
            .pages
            .get(page)?
            .get(shape)?
            .properties
            .get(name)
            .cloned()
    }

    /// Body text of the most recently opened document at `location`.
    pub fn text_of(&self, location: &str) -> Option<String> {
        let state = self.lock();
        let doc = state.documents.iter().rev().find(|d| d.location == location)?;
        doc.fixture.text.clone()
    }

    /// Number of documents the engine still holds open.
    pub fn open_documents(&self) -> usize {
        self.lock().documents.iter().filter(|d| !d.released).count()
    }

    /// Number of `close` requests received for documents at `location`.
    pub fn close_requests(&self, location: &str) -> usize {
        self.lock()
            .documents
            .iter()
            .filter(|d| d.location == location)
            .map(|d| d.close_requests)
            .sum()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Dispatch ─────────────────────────────────────────────────────────

    fn dispatch(&self, call: &RemoteCall) -> Result<Value, RemoteFault> {
        if let Some(fault) = self.faults.get(&call.method) {
            return Err(fault.clone());
        }

        let mut state = self.lock();
        let method = call.method.as_str();
        let args = call.args.as_slice();

        if call.target == ObjectRef::CONTEXT {
            return match method {
                "getServiceManager" if self.service_manager => Ok(json!({ "oid": 1 })),
                "getServiceManager" => Ok(Value::Null),
                _ => Err(no_such_method("component context", method)),
            };
        }

        let obj = *state.objects.get(&call.target.oid).ok_or_else(|| {
            RemoteFault::new(
                FaultKind::Disposed,
                format!("unknown object {}", call.target),
            )
        })?;

        if let Some(d) = obj.document() {
            if state.documents[d].released {
                return Err(RemoteFault::new(
                    FaultKind::Disposed,
                    format!("{} has been closed", state.documents[d].location),
                ));
            }
        }

        match obj {
            Obj::ServiceManager => match method {
                "createInstanceWithContext" => {
                    if arg_str(args, 0, method)? == DESKTOP_SERVICE {
                        Ok(json!({ "oid": 2 }))
                    } else {
                        Ok(Value::Null)
                    }
                }
                _ => Err(no_such_method("service manager", method)),
            },
            Obj::Desktop => match method {
                "loadComponentFromURL" => self.load(&mut state, args),
                _ => Err(no_such_method("desktop", method)),
            },
            Obj::Document(d) => document_call(&mut state, d, method, args, self.veto_close),
            Obj::DrawPages(d) => {
                let pages = state.documents[d].fixture.pages.len();
                match method {
                    "getCount" => Ok(json!(pages)),
                    "getByIndex" => {
                        let i = arg_index(args, method, pages)?;
                        Ok(state.register(Obj::Page(d, i)))
                    }
                    _ => Err(no_such_method("draw pages", method)),
                }
            }
            Obj::Page(d, p) => {
                let shapes = state.documents[d].fixture.pages[p].len();
                match method {
                    "getCount" => Ok(json!(shapes)),
                    "getByIndex" => {
                        let i = arg_index(args, method, shapes)?;
                        Ok(state.register(Obj::Shape(d, p, i)))
                    }
                    _ => Err(no_such_method("draw page", method)),
                }
            }
            Obj::Shape(d, p, s) => {
                let shape = &mut state.documents[d].fixture.pages[p][s];
                match method {
                    "getPropertySetInfo" => Ok(state.register(Obj::PropertySetInfo(d, p, s))),
                    "getPropertyValue" => {
                        let name = arg_str(args, 0, method)?;
                        shape
                            .properties
                            .get(name)
                            .map(|v| json!(v))
                            .ok_or_else(|| unknown_property(name))
                    }
                    "setPropertyValue" => {
                        let name = arg_str(args, 0, method)?.to_string();
                        let value: Any = arg_as(args, 1, method)?;
                        let current = shape
                            .properties
                            .get(&name)
                            .ok_or_else(|| unknown_property(&name))?;
                        if current.type_name() != value.type_name() {
                            return Err(RemoteFault::new(
                                FaultKind::IllegalArgument,
                                format!(
                                    "{name} expects {}, got {}",
                                    current.type_name(),
                                    value.type_name()
                                ),
                            ));
                        }
                        if shape.frozen.contains(&name) {
                            return Err(RemoteFault::new(
                                FaultKind::PropertyVeto,
                                format!("{name} is read-only on this shape"),
                            ));
                        }
                        shape.properties.insert(name, value);
                        Ok(Value::Null)
                    }
                    _ => Err(no_such_method("shape", method)),
                }
            }
            Obj::PropertySetInfo(d, p, s) => match method {
                "hasPropertyByName" => {
                    let name = arg_str(args, 0, method)?;
                    let shape = &state.documents[d].fixture.pages[p][s];
                    Ok(json!(shape.properties.contains_key(name)))
                }
                _ => Err(no_such_method("property set info", method)),
            },
            Obj::Text(d) => {
                let doc = &mut state.documents[d].fixture;
                match method {
                    "setString" => {
                        doc.text = Some(arg_str(args, 0, method)?.to_string());
                        Ok(Value::Null)
                    }
                    "getString" => Ok(json!(doc.text.clone().unwrap_or_default())),
                    _ => Err(no_such_method("text", method)),
                }
            }
        }
    }

    fn load(&self, state: &mut State, args: &[Value]) -> Result<Value, RemoteFault> {
        let url = arg_str(args, 0, "loadComponentFromURL")?;

        let fixture = match url {
            WRITER_FACTORY => DocumentFixture::text(""),
            IMPRESS_FACTORY => DocumentFixture::presentation(vec![Vec::new()]),
            u if u.starts_with("private:factory/") => {
                return Err(RemoteFault::new(
                    FaultKind::IllegalArgument,
                    format!("unsupported factory {u}"),
                ))
            }
            u => self.fixtures.get(u).cloned().ok_or_else(|| {
                RemoteFault::new(FaultKind::Io, format!("Source file {u} could not be loaded"))
            })?,
        };

        if fixture.unreadable {
            debug!("Memory engine cannot parse {}", url);
            return Ok(Value::Null);
        }

        state.documents.push(OpenDocument {
            location: url.to_string(),
            fixture,
            released: false,
            close_requests: 0,
        });
        let d = state.documents.len() - 1;
        Ok(state.register(Obj::Document(d)))
    }
}

fn document_call(
    state: &mut State,
    d: usize,
    method: &str,
    args: &[Value],
    veto_close: bool,
) -> Result<Value, RemoteFault> {
    let caps = state.documents[d].fixture.capabilities;
    let needs = |cap: Capability| {
        if caps.contains(cap) {
            Ok(())
        } else {
            Err(no_such_method(cap.interface_name(), method))
        }
    };

    match method {
        "getTypes" => Ok(json!(caps
            .iter()
            .map(Capability::interface_name)
            .collect::<Vec<_>>())),
        "getDrawPages" => {
            needs(Capability::DrawPages)?;
            Ok(state.register(Obj::DrawPages(d)))
        }
        "getText" => {
            needs(Capability::TextBody)?;
            Ok(state.register(Obj::Text(d)))
        }
        "storeToURL" => {
            needs(Capability::Storable)?;
            store(state, d, args)
        }
        "close" => {
            needs(Capability::Closeable)?;
            let doc = &mut state.documents[d];
            doc.close_requests += 1;
            if veto_close {
                return Err(RemoteFault::new(
                    FaultKind::CloseVeto,
                    format!("{} is in use", doc.location),
                ));
            }
            doc.released = true;
            Ok(Value::Null)
        }
        "dispose" => {
            needs(Capability::Component)?;
            state.documents[d].released = true;
            Ok(Value::Null)
        }
        _ => Err(no_such_method("document", method)),
    }
}

fn store(state: &mut State, d: usize, args: &[Value]) -> Result<Value, RemoteFault> {
    let url = arg_str(args, 0, "storeToURL")?.to_string();
    let descriptor: Vec<PropertyValue> = arg_as(args, 1, "storeToURL")?;
    let doc = &state.documents[d];

    let filter = find_property(&descriptor, "FilterName")
        .and_then(Any::as_str)
        .map(str::to_string);
    let filter_data = find_property(&descriptor, "FilterData")
        .and_then(Any::as_sequence)
        .map(<[PropertyValue]>::to_vec)
        .unwrap_or_default();
    let overwrite = find_property(&descriptor, "Overwrite")
        .and_then(Any::as_bool)
        .unwrap_or(false);

    state.stores.push(StoreRecord {
        document: doc.location.clone(),
        url: url.clone(),
        filter: filter.clone(),
        filter_data: filter_data.clone(),
        overwrite,
    });

    let supported = match filter.as_deref() {
        Some(IMPRESS_PDF_EXPORT) => doc.fixture.capabilities.contains(Capability::Presentation),
        Some(WRITER_PDF_EXPORT) => doc.fixture.capabilities.contains(Capability::TextBody),
        _ => false,
    };
    if !supported {
        return Err(RemoteFault::new(
            FaultKind::IllegalArgument,
            format!(
                "filter {} cannot export {}",
                filter.as_deref().unwrap_or("<none>"),
                doc.location
            ),
        ));
    }

    let Some(path) = location::path_from_file_url(&url) else {
        return Ok(Value::Null);
    };
    if path.exists() && !overwrite {
        return Err(RemoteFault::new(
            FaultKind::Io,
            format!("{} exists and Overwrite is not set", path.display()),
        ));
    }

    let mut pdf = String::from("%PDF-1.7\n");
    pdf.push_str(&format!("% source: {}\n", doc.location));
    pdf.push_str(&format!("% filter: {}\n", filter.as_deref().unwrap_or_default()));
    for pv in &filter_data {
        pdf.push_str(&format!("% {}: {}\n", pv.name, json!(pv.value)));
    }
    pdf.push_str("%%EOF\n");

    std::fs::write(&path, pdf)
        .map_err(|e| RemoteFault::new(FaultKind::Io, format!("{}: {e}", path.display())))?;
    Ok(Value::Null)
}

// ── Argument helpers ─────────────────────────────────────────────────────

fn arg_str<'a>(args: &'a [Value], i: usize, method: &str) -> Result<&'a str, RemoteFault> {
    args.get(i).and_then(Value::as_str).ok_or_else(|| {
        RemoteFault::new(
            FaultKind::IllegalArgument,
            format!("{method}: argument {i} must be a string"),
        )
    })
}

fn arg_as<T: serde::de::DeserializeOwned>(
    args: &[Value],
    i: usize,
    method: &str,
) -> Result<T, RemoteFault> {
    let value = args.get(i).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| {
        RemoteFault::new(
            FaultKind::IllegalArgument,
            format!("{method}: argument {i}: {e}"),
        )
    })
}

fn arg_index(args: &[Value], method: &str, len: usize) -> Result<usize, RemoteFault> {
    let i: i64 = arg_as(args, 0, method)?;
    usize::try_from(i)
        .ok()
        .filter(|i| *i < len)
        .ok_or_else(|| {
            RemoteFault::new(
                FaultKind::IndexOutOfBounds,
                format!("index {i} out of range 0..{len}"),
            )
        })
}

fn unknown_property(name: &str) -> RemoteFault {
    RemoteFault::new(FaultKind::UnknownProperty, name.to_string())
}

fn no_such_method(on: &str, method: &str) -> RemoteFault {
    RemoteFault::new(
        FaultKind::Runtime,
        format!("{on} does not support {method}"),
    )
}

impl Transport for MemoryEngine {
    fn invoke(&self, call: RemoteCall) -> BoxFuture<'_, Result<Value, BridgeError>> {
        self.lock().calls.push(call.clone());

        if self.stall_on.as_deref() == Some(call.method.as_str()) {
            debug!("Memory engine stalls on {}", call.method);
            return Box::pin(futures::future::pending::<Result<Value, BridgeError>>());
        }
        if self.disconnect_on.as_deref() == Some(call.method.as_str()) {
            return Box::pin(futures::future::ready(Err(BridgeError::Disconnected)));
        }

        let result = self.dispatch(&call).map_err(BridgeError::Fault);
        Box::pin(futures::future::ready(result))
    }
}
