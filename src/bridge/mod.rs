//! Remote-call layer between this crate and the office engine.
//!
//! The engine exposes its object model (desktop, documents, draw pages,
//! shapes) through an automation bridge. Every interaction is a single
//! remote call: *invoke `method` on the object `oid` with `args`*, answered
//! either by a JSON result or by a fault naming the exception the engine
//! raised.
//!
//! ```text
//!  typed wrappers          Bridge                Transport
//! (document, closer) ──▶ (timeout, decoding) ──▶ (socket / memory)
//! ```
//!
//! * [`Transport`]: moves one [`RemoteCall`] to the engine and back. The
//!   production implementation is [`socket::SocketTransport`]; tests and dry
//!   runs use [`memory::MemoryEngine`].
//! * [`Bridge`]: cheap-to-clone handle every stage holds. It bounds each
//!   call with the configured timeout and decodes results into typed values.
//! * [`Any`] / [`PropertyValue`]: the engine's typed value notation.

pub mod endpoint;
pub mod memory;
pub mod socket;

pub use endpoint::Endpoint;

use crate::error::BridgeError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

// ── Object references ────────────────────────────────────────────────────

/// Opaque reference to an object living inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub oid: u64,
}

impl ObjectRef {
    /// The engine's component context, the root every session starts from.
    pub const CONTEXT: ObjectRef = ObjectRef { oid: 0 };

    pub fn new(oid: u64) -> Self {
        Self { oid }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.oid)
    }
}

// ── Typed values ─────────────────────────────────────────────────────────

/// A typed value in the engine's JSON notation:
/// `{"type": "long", "value": 80}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Any {
    #[serde(rename = "boolean")]
    Boolean(bool),
    #[serde(rename = "long")]
    Long(i32),
    #[serde(rename = "string")]
    String(String),
    #[serde(rename = "[]com.sun.star.beans.PropertyValue")]
    Sequence(Vec<PropertyValue>),
}

impl Any {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Any::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i32> {
        match self {
            Any::Long(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Any::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[PropertyValue]> {
        match self {
            Any::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// The engine-side type name, used in fault messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Any::Boolean(_) => "boolean",
            Any::Long(_) => "long",
            Any::String(_) => "string",
            Any::Sequence(_) => "[]com.sun.star.beans.PropertyValue",
        }
    }
}

impl From<bool> for Any {
    fn from(v: bool) -> Self {
        Any::Boolean(v)
    }
}

impl From<i32> for Any {
    fn from(v: i32) -> Self {
        Any::Long(v)
    }
}

impl From<&str> for Any {
    fn from(v: &str) -> Self {
        Any::String(v.to_string())
    }
}

impl From<String> for Any {
    fn from(v: String) -> Self {
        Any::String(v)
    }
}

impl From<Vec<PropertyValue>> for Any {
    fn from(v: Vec<PropertyValue>) -> Self {
        Any::Sequence(v)
    }
}

/// A named value: one entry of a media descriptor or filter-data sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: Any,
}

impl PropertyValue {
    pub fn new(name: impl Into<String>, value: impl Into<Any>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Find a property by name in a descriptor.
pub fn find_property<'a>(props: &'a [PropertyValue], name: &str) -> Option<&'a Any> {
    props.iter().find(|p| p.name == name).map(|p| &p.value)
}

// ── Faults ───────────────────────────────────────────────────────────────

/// The exception kinds this crate reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    Io,
    IllegalArgument,
    IndexOutOfBounds,
    UnknownProperty,
    PropertyVeto,
    WrappedTarget,
    CloseVeto,
    Disposed,
    Runtime,
    Other(String),
}

impl FaultKind {
    /// Fully qualified exception name used on the wire.
    pub fn type_name(&self) -> &str {
        match self {
            FaultKind::Io => "com.sun.star.io.IOException",
            FaultKind::IllegalArgument => "com.sun.star.lang.IllegalArgumentException",
            FaultKind::IndexOutOfBounds => "com.sun.star.lang.IndexOutOfBoundsException",
            FaultKind::UnknownProperty => "com.sun.star.beans.UnknownPropertyException",
            FaultKind::PropertyVeto => "com.sun.star.beans.PropertyVetoException",
            FaultKind::WrappedTarget => "com.sun.star.lang.WrappedTargetException",
            FaultKind::CloseVeto => "com.sun.star.util.CloseVetoException",
            FaultKind::Disposed => "com.sun.star.lang.DisposedException",
            FaultKind::Runtime => "com.sun.star.uno.RuntimeException",
            FaultKind::Other(name) => name,
        }
    }

    pub fn from_type_name(name: &str) -> Self {
        match name {
            "com.sun.star.io.IOException" => FaultKind::Io,
            "com.sun.star.lang.IllegalArgumentException" => FaultKind::IllegalArgument,
            "com.sun.star.lang.IndexOutOfBoundsException" => FaultKind::IndexOutOfBounds,
            "com.sun.star.beans.UnknownPropertyException" => FaultKind::UnknownProperty,
            "com.sun.star.beans.PropertyVetoException" => FaultKind::PropertyVeto,
            "com.sun.star.lang.WrappedTargetException" => FaultKind::WrappedTarget,
            "com.sun.star.util.CloseVetoException" => FaultKind::CloseVeto,
            "com.sun.star.lang.DisposedException" => FaultKind::Disposed,
            "com.sun.star.uno.RuntimeException" => FaultKind::Runtime,
            other => FaultKind::Other(other.to_string()),
        }
    }
}

/// An exception raised by the engine while executing a call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{type_name}: {message}")]
pub struct RemoteFault {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub message: String,
}

impl RemoteFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            type_name: kind.type_name().to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FaultKind {
        FaultKind::from_type_name(&self.type_name)
    }
}

// ── Transport ────────────────────────────────────────────────────────────

/// One call against one remote object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteCall {
    pub target: ObjectRef,
    pub method: String,
    pub args: Vec<Value>,
}

/// Carries remote calls to the engine.
///
/// Implementations must be `Send + Sync`; the pipeline issues calls one at a
/// time and awaits each reply before the next, so no implementation needs to
/// multiplex concurrent calls.
pub trait Transport: Send + Sync {
    fn invoke(&self, call: RemoteCall) -> BoxFuture<'_, Result<Value, BridgeError>>;
}

/// Serialise a typed argument for the wire.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Value, BridgeError> {
    serde_json::to_value(value).map_err(|e| BridgeError::Protocol(format!("encode: {e}")))
}

/// Timeout-bounded access to a [`Transport`], shared by every stage.
#[derive(Clone)]
pub struct Bridge {
    transport: Arc<dyn Transport>,
    call_timeout: Duration,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("transport", &"<dyn Transport>")
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl Bridge {
    pub fn new(transport: Arc<dyn Transport>, call_timeout: Duration) -> Self {
        Self {
            transport,
            call_timeout,
        }
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Invoke `method` on `target`, failing with [`BridgeError::Timeout`]
    /// when no reply arrives within the call timeout.
    pub async fn call(
        &self,
        target: ObjectRef,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, BridgeError> {
        debug!(oid = target.oid, method, "remote call");
        let start = Instant::now();
        let call = RemoteCall {
            target,
            method: method.to_string(),
            args,
        };

        match tokio::time::timeout(self.call_timeout, self.transport.invoke(call)).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout {
                method: method.to_string(),
                elapsed_ms: start.elapsed().as_millis() as u64,
            }),
        }
    }

    /// Call a method returning an object reference (`null` → `None`).
    pub async fn call_object(
        &self,
        target: ObjectRef,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Option<ObjectRef>, BridgeError> {
        let value = self.call(target, method, args).await?;
        decode(method, value)
    }

    /// Call a method that must return an object reference.
    pub async fn call_required_object(
        &self,
        target: ObjectRef,
        method: &str,
        args: Vec<Value>,
    ) -> Result<ObjectRef, BridgeError> {
        self.call_object(target, method, args)
            .await?
            .ok_or_else(|| BridgeError::UnexpectedReply {
                method: method.to_string(),
                detail: "no object returned".to_string(),
            })
    }

    pub async fn call_bool(
        &self,
        target: ObjectRef,
        method: &str,
        args: Vec<Value>,
    ) -> Result<bool, BridgeError> {
        let value = self.call(target, method, args).await?;
        decode(method, value)
    }

    pub async fn call_count(
        &self,
        target: ObjectRef,
        method: &str,
        args: Vec<Value>,
    ) -> Result<usize, BridgeError> {
        let value = self.call(target, method, args).await?;
        decode(method, value)
    }

    pub async fn call_any(
        &self,
        target: ObjectRef,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Any, BridgeError> {
        let value = self.call(target, method, args).await?;
        decode(method, value)
    }

    pub async fn call_strings(
        &self,
        target: ObjectRef,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<String>, BridgeError> {
        let value = self.call(target, method, args).await?;
        decode(method, value)
    }

    /// Call a `void` method; any non-null result is ignored.
    pub async fn call_unit(
        &self,
        target: ObjectRef,
        method: &str,
        args: Vec<Value>,
    ) -> Result<(), BridgeError> {
        self.call(target, method, args).await.map(|_| ())
    }
}

fn decode<T: serde::de::DeserializeOwned>(method: &str, value: Value) -> Result<T, BridgeError> {
    serde_json::from_value(value.clone())
        .map_err(|e| BridgeError::UnexpectedReply {
            method: method.to_string(),
            detail: format!("{value}: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn any_uses_engine_json_notation() {
        assert_eq!(
            serde_json::to_value(Any::Long(80)).unwrap(),
            json!({"type": "long", "value": 80})
        );
        assert_eq!(
            serde_json::to_value(Any::Boolean(false)).unwrap(),
            json!({"type": "boolean", "value": false})
        );
    }

    #[test]
    fn property_value_nests_sequences() {
        let pv = PropertyValue::new(
            "FilterData",
            vec![PropertyValue::new("Quality", 80)],
        );
        let v = serde_json::to_value(&pv).unwrap();
        assert_eq!(v["Name"], "FilterData");
        assert_eq!(v["Value"]["type"], "[]com.sun.star.beans.PropertyValue");
        assert_eq!(v["Value"]["value"][0]["Name"], "Quality");
        assert_eq!(v["Value"]["value"][0]["Value"]["value"], 80);

        let back: PropertyValue = serde_json::from_value(v).unwrap();
        assert_eq!(back, pv);
    }

    #[test]
    fn fault_kinds_map_both_ways() {
        for kind in [
            FaultKind::Io,
            FaultKind::IllegalArgument,
            FaultKind::IndexOutOfBounds,
            FaultKind::UnknownProperty,
            FaultKind::PropertyVeto,
            FaultKind::WrappedTarget,
            FaultKind::CloseVeto,
            FaultKind::Disposed,
            FaultKind::Runtime,
        ] {
            assert_eq!(FaultKind::from_type_name(kind.type_name()), kind);
        }
        assert_eq!(
            FaultKind::from_type_name("com.example.Weird"),
            FaultKind::Other("com.example.Weird".into())
        );
    }

    #[test]
    fn fault_deserialises_without_message() {
        let f: RemoteFault =
            serde_json::from_value(json!({"type": "com.sun.star.util.CloseVetoException"}))
                .unwrap();
        assert_eq!(f.kind(), FaultKind::CloseVeto);
        assert!(f.message.is_empty());
    }

    #[test]
    fn find_property_by_name() {
        let props = vec![
            PropertyValue::new("FilterName", "impress_pdf_Export"),
            PropertyValue::new("Overwrite", true),
        ];
        assert_eq!(find_property(&props, "Overwrite"), Some(&Any::Boolean(true)));
        assert!(find_property(&props, "Hidden").is_none());
    }

    struct Silent;

    impl Transport for Silent {
        fn invoke(&self, _call: RemoteCall) -> BoxFuture<'_, Result<Value, BridgeError>> {
            Box::pin(futures::future::pending::<Result<Value, BridgeError>>())
        }
    }

    #[tokio::test]
    async fn call_times_out() {
        let bridge = Bridge::new(Arc::new(Silent), Duration::from_millis(20));
        let err = bridge
            .call(ObjectRef::CONTEXT, "getServiceManager", vec![])
            .await
            .unwrap_err();
        match err {
            BridgeError::Timeout { method, .. } => assert_eq!(method, "getServiceManager"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    struct Fixed(Value);

    impl Transport for Fixed {
        fn invoke(&self, _call: RemoteCall) -> BoxFuture<'_, Result<Value, BridgeError>> {
            let v = self.0.clone();
            Box::pin(async move { Ok(v) })
        }
    }

    #[tokio::test]
    async fn object_results_decode() {
        let bridge = Bridge::new(Arc::new(Fixed(json!({"oid": 7}))), Duration::from_secs(1));
        let obj = bridge
            .call_object(ObjectRef::CONTEXT, "getServiceManager", vec![])
            .await
            .unwrap();
        assert_eq!(obj, Some(ObjectRef::new(7)));

        let bridge = Bridge::new(Arc::new(Fixed(Value::Null)), Duration::from_secs(1));
        let obj = bridge
            .call_object(ObjectRef::CONTEXT, "getServiceManager", vec![])
            .await
            .unwrap();
        assert_eq!(obj, None);
    }

    #[tokio::test]
    async fn mistyped_reply_keeps_session() {
        let bridge = Bridge::new(Arc::new(Fixed(json!("three"))), Duration::from_secs(1));
        let err = bridge
            .call_count(ObjectRef::new(3), "getCount", vec![])
            .await
            .unwrap_err();
        assert!(
            matches!(err, BridgeError::UnexpectedReply { ref method, .. } if method == "getCount"),
            "got {err:?}"
        );
        assert!(!err.is_session_fatal());
    }
}
