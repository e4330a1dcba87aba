//! # Client
//!
//! Connects to a [`crate::server::Server`] (directly, or via a
//! [`crate::loadbalancer::LoadBalancer`]) and makes calls against it. Mirrors
//! `zrpc.client.Client`/`ClientMethod`: one request sent, one response awaited,
//! in strict alternation — the REQ/REP discipline. Concurrent callers should
//! each hold their own `Client`, pooled with [`crate::pool::ObjectPool`] if
//! connections are expensive to create.

use crate::error::{CodecError, RpcError, TransportError};
use crate::protocol::{Codec, JsonCodec, RequestEnvelope, ResponseEnvelope};
use crate::transport::{self, Connection};
use serde_json::Value;
use tokio::sync::Mutex;

const KIND_CLIENT_CODEC_ERROR: &str = "zrpc.client.codec_error";
const KIND_CLIENT_TRANSPORT_ERROR: &str = "zrpc.client.transport_error";

/// A call that failed, carrying both the reconstructed [`RpcError`] and enough
/// of the original request to inspect programmatically — the same information
/// the reference implementation's `Error` exposes via its `.id`/`.method`/
/// `.params` properties.
#[derive(Debug, Clone, PartialEq)]
pub struct CallError {
    pub request_id: Option<String>,
    pub method: String,
    pub params: Vec<Value>,
    pub error: RpcError,
}

impl CallError {
    /// Matches the underlying [`RpcError::is_kind`].
    pub fn is_kind(&self, name: &str) -> bool {
        self.error.is_kind(name)
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "call to {:?} failed: {}", self.method, self.error)
    }
}

impl std::error::Error for CallError {}

/// A connection to one server, reusable for many sequential calls.
pub struct Client {
    conn: Mutex<Connection>,
    codec: JsonCodec,
}

impl Client {
    /// Connect to `addr` immediately.
    pub async fn new(addr: &str) -> Result<Self, TransportError> {
        let conn = transport::connect(addr).await?;
        Ok(Self {
            conn: Mutex::new(conn),
            codec: JsonCodec,
        })
    }

    /// Call `method` with `params`, returning the decoded result or a
    /// [`CallError`] describing the failure.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, CallError> {
        let request = RequestEnvelope::new(method, params);
        match self.exchange(&request).await {
            Ok(value) => Ok(value),
            Err(error) => Err(CallError {
                request_id: request.id,
                method: request.method,
                params: request.params,
                error,
            }),
        }
    }

    /// Begin a fluent, dotted method name: `client.method("math").method("add").call(params)`
    /// is the statically typed equivalent of a dynamic-attribute `client.math.add(params)`.
    pub fn method<'a>(&'a self, name: &str) -> MethodHandle<'a> {
        MethodHandle {
            client: self,
            name: name.to_string(),
        }
    }

    async fn exchange(&self, request: &RequestEnvelope) -> Result<Value, RpcError> {
        let bytes = self
            .codec
            .encode_request(request)
            .map_err(codec_error_to_rpc_error)?;

        let reply = {
            let mut conn = self.conn.lock().await;
            conn.send_frame(bytes)
                .await
                .map_err(transport_error_to_rpc_error)?;
            conn.recv_frame().await.map_err(transport_error_to_rpc_error)?
        };

        let response: ResponseEnvelope = self
            .codec
            .decode_response(&reply)
            .map_err(codec_error_to_rpc_error)?;

        match response.error {
            Some(err) => Err(err),
            None => Ok(response.result.unwrap_or(Value::Null)),
        }
    }
}

fn codec_error_to_rpc_error(err: CodecError) -> RpcError {
    RpcError::new(KIND_CLIENT_CODEC_ERROR, err.to_string())
}

fn transport_error_to_rpc_error(err: TransportError) -> RpcError {
    RpcError::new(KIND_CLIENT_TRANSPORT_ERROR, err.to_string())
}

/// A method name under construction, composed with `.` as namespacing sugar.
pub struct MethodHandle<'a> {
    client: &'a Client,
    name: String,
}

impl<'a> MethodHandle<'a> {
    /// Compose a further dotted segment onto this method name.
    pub fn method(&self, name: &str) -> MethodHandle<'a> {
        MethodHandle {
            client: self.client,
            name: format!("{}.{name}", self.name),
        }
    }

    /// Call the composed method name with `params`.
    pub async fn call(&mut self, params: Vec<Value>) -> Result<Value, CallError> {
        self.client.call(&self.name, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::server::Server;
    use serde_json::json;
    use std::sync::Arc;

    async fn spawn_server(addr: String, registry: Arc<Registry>) {
        let server = Server::bind(addr, registry);
        let ready: crate::concurrency::Callback<()> = crate::concurrency::Callback::new();
        let waiter = ready.clone();
        tokio::spawn(async move {
            let _ = server.run(None, ready).await;
        });
        waiter.wait().await.unwrap();
    }

    #[tokio::test]
    async fn call_round_trips_a_successful_result() {
        let addr = format!("inproc://test-client-{}", uuid::Uuid::new_v4().simple());
        let registry = Arc::new(Registry::new());
        registry
            .register("add", |params| {
                Ok(json!(params[0].as_f64().unwrap() + params[1].as_f64().unwrap()))
            })
            .await;
        spawn_server(addr.clone(), registry).await;

        let client = Client::new(&addr).await.unwrap();
        let result = client.call("add", vec![json!(2), json!(3)]).await.unwrap();
        assert_eq!(result, json!(5.0));
    }

    #[tokio::test]
    async fn call_on_a_missing_method_returns_a_matchable_call_error() {
        let addr = format!("inproc://test-client-missing-{}", uuid::Uuid::new_v4().simple());
        spawn_server(addr.clone(), Arc::new(Registry::new())).await;

        let client = Client::new(&addr).await.unwrap();
        let err = client.call("nope", vec![]).await.unwrap_err();

        assert!(err.is_kind("missing_method"));
        assert_eq!(err.method, "nope");
    }

    #[tokio::test]
    async fn method_handle_composes_dotted_names() {
        let addr = format!("inproc://test-client-dotted-{}", uuid::Uuid::new_v4().simple());
        let registry = Arc::new(Registry::new());
        registry
            .register("math.add", |params| {
                Ok(json!(params[0].as_f64().unwrap() + params[1].as_f64().unwrap()))
            })
            .await;
        spawn_server(addr.clone(), registry).await;

        let client = Client::new(&addr).await.unwrap();
        let mut handle = client.method("math").method("add");
        let result = handle.call(vec![json!(10), json!(20)]).await.unwrap();
        assert_eq!(result, json!(30.0));
    }

    #[tokio::test]
    async fn connecting_to_nothing_fails_immediately() {
        let addr = format!("inproc://test-client-nobody-{}", uuid::Uuid::new_v4().simple());
        let err = Client::new(&addr).await.unwrap_err();
        assert!(matches!(err, TransportError::NotBound(_)));
    }

    #[tokio::test]
    async fn a_client_can_make_many_sequential_calls_on_one_connection() {
        let addr = format!("inproc://test-client-many-{}", uuid::Uuid::new_v4().simple());
        let registry = Arc::new(Registry::new());
        registry.register("inc", |params| Ok(json!(params[0].as_f64().unwrap() + 1.0))).await;
        spawn_server(addr.clone(), registry).await;

        let client = Client::new(&addr).await.unwrap();
        let mut value = json!(0);
        for _ in 0..5 {
            value = client.call("inc", vec![value]).await.unwrap();
        }
        assert_eq!(value, json!(5.0));
    }
}
