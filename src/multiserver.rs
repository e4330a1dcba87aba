//! # MultiServer
//!
//! Composes a broker-topology [`LoadBalancer`] with `n_workers` [`Server`]s, all
//! wired to a freshly allocated `inproc://` backend address, so a caller gets a
//! multi-worker server behind one public address without managing the plumbing.
//! Mirrors `zrpc.multiserver.MultiServer`: bind the device first, then bring up
//! every worker, then — and only then — tell the caller it's ready. A client
//! that connects to an unbound `inproc://` endpoint fails immediately, so this
//! order matters.

use crate::concurrency::Callback;
use crate::error::RpcError;
use crate::loadbalancer::LoadBalancer;
use crate::registry::Registry;
use crate::server::Server;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A load-balanced, multi-worker server listening on one public address.
pub struct MultiServer {
    addr: String,
    registry: Arc<Registry>,
}

impl MultiServer {
    pub fn new(addr: impl Into<String>, registry: Arc<Registry>) -> Self {
        Self {
            addr: addr.into(),
            registry,
        }
    }

    /// Bring up the device and `n_workers` workers, then signal `on_ready` with
    /// one `()` per worker that came up successfully. Any failure along the way
    /// — the device failing to bind, or any worker failing to connect — is
    /// routed through `on_ready` as an error instead of left to hang.
    pub async fn run(&self, n_workers: usize, on_ready: Callback<Vec<()>>) {
        on_ready.guard(|| self.run_inner(n_workers)).await;
    }

    async fn run_inner(&self, n_workers: usize) -> Result<Vec<()>, RpcError> {
        let backend_addr = format!("inproc://{}", Uuid::new_v4().simple());
        info!(
            "multiserver bringing up {n_workers} workers behind {:?} (backend {:?})",
            self.addr, backend_addr
        );

        let loadbalancer = LoadBalancer::broker(self.addr.clone(), backend_addr.clone());
        let device_ready: Callback<()> = Callback::new();
        let device_wait = device_ready.clone();
        tokio::spawn(async move {
            let _ = loadbalancer.run(device_ready).await;
        });
        // The load balancer must be bound before any worker tries to connect in.
        device_wait.wait().await?;

        let mut worker_waiters = Vec::with_capacity(n_workers);
        for _ in 0..n_workers {
            let server = Server::connect(backend_addr.clone(), Arc::clone(&self.registry));
            let worker_ready: Callback<()> = Callback::new();
            let worker_wait = worker_ready.clone();
            tokio::spawn(async move {
                let _ = server.run(None, worker_ready).await;
            });
            worker_waiters.push(worker_wait);
        }

        let mut results = Vec::with_capacity(n_workers);
        for waiter in worker_waiters {
            waiter.wait().await?;
            results.push(());
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Codec, JsonCodec, RequestEnvelope, ResponseEnvelope};
    use crate::transport;
    use serde_json::json;

    #[tokio::test]
    async fn four_workers_all_come_up_and_serve_requests() {
        let addr = format!("inproc://test-multiserver-{}", Uuid::new_v4().simple());
        let registry = Arc::new(Registry::new());
        registry
            .register("add", |params| {
                Ok(json!(params[0].as_f64().unwrap() + params[1].as_f64().unwrap()))
            })
            .await;

        let multiserver = MultiServer::new(addr.clone(), registry);
        let ready: Callback<Vec<()>> = Callback::new();
        let waiter = ready.clone();
        tokio::spawn(async move {
            multiserver.run(4, ready).await;
        });

        let started = waiter.wait().await.unwrap();
        assert_eq!(started.len(), 4);

        let codec = JsonCodec;
        for i in 0..8 {
            let mut conn = transport::connect(&addr).await.unwrap();
            let request = RequestEnvelope::new("add", vec![json!(i), json!(1)]);
            conn.send_frame(codec.encode_request(&request).unwrap())
                .await
                .unwrap();
            let reply = conn.recv_frame().await.unwrap();
            let response: ResponseEnvelope = codec.decode_response(&reply).unwrap();
            assert_eq!(response.result, Some(json!(i as f64 + 1.0)));
        }
    }

    #[tokio::test]
    async fn device_bind_failure_is_reported_through_on_ready() {
        // Reserve the address first so the multiserver's own bind fails.
        let addr = format!("inproc://test-multiserver-conflict-{}", Uuid::new_v4().simple());
        let _holder = transport::bind(&addr).await.unwrap();

        let registry = Arc::new(Registry::new());
        let multiserver = MultiServer::new(addr, registry);
        let ready: Callback<Vec<()>> = Callback::new();
        let waiter = ready.clone();
        tokio::spawn(async move {
            multiserver.run(2, ready).await;
        });

        let err = waiter.wait().await.unwrap_err();
        assert!(err.is_kind("zrpc.startup.failed"));
    }
}
