//! Line-delimited JSON transport over TCP.
//!
//! One request per line, one reply per line:
//!
//! ```text
//! → {"id":4,"oid":12,"method":"storeToURL","args":["file:///tmp/a.pdf",[…]]}
//! ← {"id":4,"result":null}
//! ← {"id":5,"fault":{"type":"com.sun.star.io.IOException","message":"…"}}
//! ```
//!
//! Calls are serialised behind a mutex: the pipeline never has two calls in
//! flight against the same session. Every request carries a fresh id and
//! replies with any other id are discarded, so a reply that arrives after
//! its caller timed out cannot be mistaken for the answer to a later call.

use super::{Endpoint, RemoteCall, RemoteFault, Transport};
use crate::error::BridgeError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct WireRequest<'a> {
    id: u64,
    oid: u64,
    method: &'a str,
    args: &'a [Value],
}

#[derive(Deserialize)]
struct WireReply {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    fault: Option<RemoteFault>,
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// [`Transport`] speaking the bridge's JSON-lines protocol over TCP.
pub struct SocketTransport {
    endpoint: Endpoint,
    conn: Mutex<Connection>,
    next_id: AtomicU64,
}

impl SocketTransport {
    /// Open a TCP connection to the bridge, bounded by `timeout`.
    pub async fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<Self, BridgeError> {
        debug!("Opening bridge socket to {}", endpoint);
        let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        let stream = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| BridgeError::Timeout {
                method: "connect".to_string(),
                elapsed_ms: timeout.as_millis() as u64,
            })??;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        info!("Bridge socket open: {}", endpoint);

        Ok(Self {
            endpoint: endpoint.clone(),
            conn: Mutex::new(Connection {
                reader: BufReader::new(read_half),
                writer: write_half,
            }),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn round_trip(&self, call: RemoteCall) -> Result<Value, BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&WireRequest {
            id,
            oid: call.target.oid,
            method: &call.method,
            args: &call.args,
        })
        .map_err(|e| BridgeError::Protocol(format!("encode request: {e}")))?;
        line.push('\n');

        let mut conn = self.conn.lock().await;
        conn.writer.write_all(line.as_bytes()).await?;
        conn.writer.flush().await?;

        let mut buf = String::new();
        loop {
            buf.clear();
            if conn.reader.read_line(&mut buf).await? == 0 {
                return Err(BridgeError::Disconnected);
            }
            let text = buf.trim();
            if text.is_empty() {
                continue;
            }

            let reply: WireReply = serde_json::from_str(text)
                .map_err(|e| BridgeError::Protocol(format!("malformed reply {text:?}: {e}")))?;

            if reply.id != id {
                warn!(
                    "Discarding stale bridge reply {} while waiting for {} ({})",
                    reply.id, id, call.method
                );
                continue;
            }

            return match reply.fault {
                Some(fault) => Err(BridgeError::Fault(fault)),
                None => Ok(reply.result.unwrap_or(Value::Null)),
            };
        }
    }
}

impl Transport for SocketTransport {
    fn invoke(&self, call: RemoteCall) -> BoxFuture<'_, Result<Value, BridgeError>> {
        Box::pin(self.round_trip(call))
    }
}
