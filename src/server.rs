//! # Server
//!
//! Listens for requests on an address, dispatches each one through a
//! [`Registry`], and replies with the JSON-RPC-shaped result. Mirrors
//! `zrpc.server.Server`: a client holds one persistent connection and sends
//! requests on it one at a time, waiting for each reply before sending the
//! next (the "REQ/REP" discipline), so a `Server` handles every connection it
//! accepts as its own strictly-sequential request/response loop.
//!
//! Set `connect: true` to have the server dial out instead of bind — the mode
//! a broker-topology [`crate::loadbalancer::LoadBalancer`]'s workers use.

use crate::concurrency::Callback;
use crate::error::{RpcError, TransportError, KIND_HANDLER_PANIC};
use crate::protocol::{probe_encodable_args, Codec, JsonCodec, RequestEnvelope, ResponseEnvelope};
use crate::registry::Registry;
use crate::transport::{self, Connection};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// A shared `die_after` counter. `notify` wakes a bind-mode accept loop
/// blocked in `accept()` as soon as the budget is spent, instead of leaving it
/// parked until some unrelated next connection arrives.
struct Budget {
    remaining: AtomicI64,
    notify: Notify,
}

impl Budget {
    fn new(die_after: Option<usize>) -> Self {
        Self {
            remaining: AtomicI64::new(die_after.map_or(i64::MAX, |n| n as i64)),
            notify: Notify::new(),
        }
    }

    fn is_exhausted(&self) -> bool {
        self.remaining.load(Ordering::SeqCst) <= 0
    }

    /// Record one processed message; wake any accept loop waiting on this
    /// budget the moment it hits zero.
    fn consume_one(&self) {
        if self.remaining.fetch_sub(1, Ordering::SeqCst) <= 1 {
            self.notify.notify_one();
        }
    }
}

/// A ZRPC-style request server.
pub struct Server {
    addr: String,
    registry: Arc<Registry>,
    connect: bool,
    codec: JsonCodec,
}

impl Server {
    /// A server that binds `addr` and accepts connections.
    pub fn bind(addr: impl Into<String>, registry: Arc<Registry>) -> Self {
        Self {
            addr: addr.into(),
            registry,
            connect: false,
            codec: JsonCodec,
        }
    }

    /// A server that dials out to `addr` instead of binding it — for a
    /// broker-topology load balancer's backend.
    pub fn connect(addr: impl Into<String>, registry: Arc<Registry>) -> Self {
        Self {
            addr: addr.into(),
            registry,
            connect: true,
            codec: JsonCodec,
        }
    }

    /// Run the server until its connection/listener closes, or until
    /// `die_after` messages have been processed in total (across every
    /// connection accepted, in bind mode) — `None` runs forever. `on_bound` is
    /// signaled once the address is bound (or the outbound connection is
    /// established), letting a caller synchronize startup before depending on
    /// this server being reachable.
    pub async fn run(
        &self,
        die_after: Option<usize>,
        on_bound: Callback<()>,
    ) -> Result<(), TransportError> {
        let budget = Arc::new(Budget::new(die_after));
        if self.connect {
            info!("server replying to requests from {:?}", self.addr);
            let conn = match transport::connect(&self.addr).await {
                Ok(conn) => conn,
                Err(e) => {
                    on_bound.throw(RpcError::from(&e)).await;
                    return Err(e);
                }
            };
            on_bound.send(()).await;
            self.serve_connection(conn, budget).await;
        } else {
            info!("server listening for requests on {:?}", self.addr);
            let mut listener = match transport::bind(&self.addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    on_bound.throw(RpcError::from(&e)).await;
                    return Err(e);
                }
            };
            on_bound.send(()).await;
            loop {
                if budget.is_exhausted() {
                    debug!("die_after budget exhausted, no longer accepting connections");
                    return Ok(());
                }
                let conn = tokio::select! {
                    _ = budget.notify.notified() => {
                        debug!("die_after budget exhausted, no longer accepting connections");
                        return Ok(());
                    }
                    result = listener.accept() => result?,
                };
                let registry = Arc::clone(&self.registry);
                let budget = Arc::clone(&budget);
                tokio::spawn(async move {
                    let server = ConnectionServer {
                        registry,
                        codec: JsonCodec,
                        budget,
                    };
                    server.serve(conn).await;
                });
            }
        }
        Ok(())
    }

    async fn serve_connection(&self, conn: Connection, budget: Arc<Budget>) {
        let server = ConnectionServer {
            registry: Arc::clone(&self.registry),
            codec: JsonCodec,
            budget,
        };
        server.serve(conn).await;
    }
}

/// The per-connection request/response loop, split out so `bind` mode can
/// spawn one of these per accepted connection. `budget` is shared across every
/// connection a single `run` brought up, so `die_after` counts messages
/// processed by the server as a whole, not per connection.
struct ConnectionServer {
    registry: Arc<Registry>,
    codec: JsonCodec,
    budget: Arc<Budget>,
}

impl ConnectionServer {
    async fn serve(&self, mut conn: Connection) {
        loop {
            if self.budget.is_exhausted() {
                debug!("die_after budget exhausted, closing connection");
                return;
            }

            let frame = match conn.recv_frame().await {
                Ok(frame) => frame,
                Err(TransportError::Closed) => {
                    debug!("connection closed");
                    return;
                }
                Err(e) => {
                    warn!("error receiving request: {e}");
                    return;
                }
            };

            let request: RequestEnvelope = match self.codec.decode_request(&frame) {
                Ok(r) => r,
                Err(e) => {
                    warn!("malformed request, dropping connection: {e}");
                    return;
                }
            };

            let response = self.process_message(&request).await;

            let reply = match self.codec.encode_response(&response) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("failed to encode response: {e}");
                    return;
                }
            };

            if let Err(e) = conn.send_frame(reply).await {
                warn!("error sending response: {e}");
                return;
            }

            self.budget.consume_one();
        }
    }

    /// Dispatch one request, returning its response envelope. Never returns
    /// `Err` itself: dispatch failures (missing method, handler error, handler
    /// panic) all become an error-shaped [`ResponseEnvelope`].
    async fn process_message(&self, request: &RequestEnvelope) -> ResponseEnvelope {
        if let Some(id) = &request.id {
            debug!("processing message {id}: {:?}", request.method);
        } else {
            debug!("processing method {:?}", request.method);
        }

        // Run the dispatch as its own task so a handler panic surfaces as a
        // `JoinError` instead of taking down whatever's driving this connection.
        let registry = Arc::clone(&self.registry);
        let method = request.method.clone();
        let params = request.params.clone();
        let outcome = match tokio::spawn(async move { registry.dispatch(&method, &params).await }).await
        {
            Ok(dispatch_result) => dispatch_result,
            Err(join_err) => {
                error!("handler for {:?} panicked: {join_err}", request.method);
                Err(RpcError::new(
                    KIND_HANDLER_PANIC,
                    format!("handler for {:?} panicked", request.method),
                ))
            }
        };

        match outcome {
            Ok(value) => ResponseEnvelope::ok(request.id.clone(), value),
            Err(mut err) => {
                // Re-probe args through the codec: a handler might have attached
                // a value that doesn't survive JSON encoding (e.g. NaN).
                if let Some(args) = err.args.take() {
                    err.args = probe_encodable_args(&self.codec, &args);
                }
                ResponseEnvelope::err(request.id.clone(), err)
            }
        }
    }
}
