//! Engine session: the connected bridge plus the engine's desktop object.

use crate::bridge::socket::SocketTransport;
use crate::bridge::{Bridge, ObjectRef, Transport};
use crate::config::ConversionConfig;
use crate::error::ConvertError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const DESKTOP_SERVICE: &str = "com.sun.star.frame.Desktop";

/// A live session with the office engine.
///
/// Created once per run and shared by every document the run converts. The
/// session owns no documents itself; it is the factory for them. There is
/// no explicit disconnect: dropping the last clone closes the socket.
#[derive(Debug, Clone)]
pub struct EngineSession {
    bridge: Bridge,
    desktop: ObjectRef,
    endpoint: String,
}

impl EngineSession {
    /// Connect to the engine named by `config.endpoint`.
    ///
    /// Any failure is a [`ConvertError::Connection`] or
    /// [`ConvertError::ServiceFactoryUnavailable`]; no partial session is
    /// ever returned.
    pub async fn connect(config: &ConversionConfig) -> Result<Self, ConvertError> {
        let endpoint = config.endpoint.to_string();
        info!("Connecting to office engine at {}", endpoint);

        let transport = SocketTransport::connect(&config.endpoint, config.connect_timeout())
            .await
            .map_err(|e| ConvertError::Connection {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        Self::bootstrap(Arc::new(transport), config.call_timeout(), endpoint).await
    }

    /// Resolve the desktop over an already-open transport.
    ///
    /// `label` names the engine in diagnostics.
    pub async fn bootstrap(
        transport: Arc<dyn Transport>,
        call_timeout: Duration,
        label: impl Into<String>,
    ) -> Result<Self, ConvertError> {
        let endpoint = label.into();
        let bridge = Bridge::new(transport, call_timeout);
        let connection_err = |e: crate::error::BridgeError| ConvertError::Connection {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        };

        let service_manager = bridge
            .call_object(ObjectRef::CONTEXT, "getServiceManager", vec![])
            .await
            .map_err(connection_err)?
            .ok_or_else(|| ConvertError::ServiceFactoryUnavailable {
                endpoint: endpoint.clone(),
                service: "service manager".to_string(),
            })?;
        debug!("Service manager: {}", service_manager);

        let desktop = bridge
            .call_object(
                service_manager,
                "createInstanceWithContext",
                vec![json!(DESKTOP_SERVICE), json!(ObjectRef::CONTEXT)],
            )
            .await
            .map_err(connection_err)?
            .ok_or_else(|| ConvertError::ServiceFactoryUnavailable {
                endpoint: endpoint.clone(),
                service: DESKTOP_SERVICE.to_string(),
            })?;

        info!("Connected to office engine at {} (desktop {})", endpoint, desktop);
        Ok(Self {
            bridge,
            desktop,
            endpoint,
        })
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn desktop(&self) -> ObjectRef {
        self.desktop
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::memory::MemoryEngine;

    #[tokio::test]
    async fn bootstrap_resolves_desktop() {
        let engine = Arc::new(MemoryEngine::new());
        let session = EngineSession::bootstrap(engine.clone(), Duration::from_secs(1), "memory")
            .await
            .unwrap();
        assert_eq!(session.desktop(), ObjectRef::new(2));
        assert_eq!(
            engine.methods(),
            vec!["getServiceManager", "createInstanceWithContext"]
        );
    }

    #[tokio::test]
    async fn missing_service_manager_is_fatal() {
        let engine = Arc::new(MemoryEngine::new().without_service_manager());
        let err = EngineSession::bootstrap(engine, Duration::from_secs(1), "memory")
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::ServiceFactoryUnavailable { .. }));
        assert!(err.is_session_fatal());
    }

    #[tokio::test]
    async fn unreachable_engine_is_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ConversionConfig::builder()
            .endpoint(format!("127.0.0.1:{port}"))
            .connect_timeout_secs(2)
            .build()
            .unwrap();
        let err = EngineSession::connect(&config).await.unwrap_err();
        assert!(matches!(err, ConvertError::Connection { .. }), "got {err:?}");
        assert_eq!(err.stage(), crate::error::Stage::Connect);
    }
}
