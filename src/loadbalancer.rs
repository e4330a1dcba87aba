//! # Load Balancer
//!
//! Fans client requests out across a set of backend servers. Mirrors
//! `zrpc.loadbal.LoadBalancer`'s two topologies:
//!
//! - [`Topology::Proxy`]: the load balancer binds its frontend and connects out
//!   to a fixed, known list of worker addresses. No changes are required on the
//!   workers, but the worker list is static for the life of the load balancer.
//! - [`Topology::Broker`]: the load balancer binds both frontend and backend;
//!   workers connect in. Workers can join and leave dynamically.
//!
//! The reference implementation wires a raw `zmq.QUEUE` device between an
//! `XREP`/`XREQ` socket pair, which fair-queues whichever worker is next idle.
//! This crate's transports have no multipart envelope addressing, so the same
//! fair-queue behavior is built explicitly: idle backend connections sit in a
//! channel, and each client connection borrows the next available one for the
//! duration of one request/response round trip before returning it.

use crate::concurrency::Callback;
use crate::error::{RpcError, TransportError};
use crate::transport::{self, Connection};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Depth of the idle-backend channel. One slot per worker is enough; a little
/// headroom avoids the broker topology's accept loop stalling on a full channel.
const BACKEND_CHANNEL_DEPTH: usize = 256;

/// How backend workers are discovered.
pub enum Topology {
    /// Connect out to each of these fixed addresses at startup.
    Proxy(Vec<String>),
    /// Bind this address and accept worker connections as they arrive.
    Broker(String),
}

/// A fair-queuing request router between clients and a pool of backend servers.
pub struct LoadBalancer {
    input: String,
    topology: Topology,
}

impl LoadBalancer {
    /// A proxy-topology load balancer: binds `input`, connects to each of `workers`.
    pub fn proxy(input: impl Into<String>, workers: Vec<String>) -> Self {
        Self {
            input: input.into(),
            topology: Topology::Proxy(workers),
        }
    }

    /// A broker-topology load balancer: binds `input` and `backend`, accepting
    /// workers as they connect to `backend`.
    pub fn broker(input: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            topology: Topology::Broker(backend.into()),
        }
    }

    /// Run the load balancer. `on_bound` is signaled once both the frontend and
    /// (for the proxy topology) every worker connection are established.
    pub async fn run(&self, on_bound: Callback<()>) -> Result<(), TransportError> {
        info!("load balancer listening for requests on {:?}", self.input);
        let mut frontend = match transport::bind(&self.input).await {
            Ok(listener) => listener,
            Err(e) => {
                on_bound.throw(RpcError::from(&e)).await;
                return Err(e);
            }
        };

        let (backend_tx, backend_rx) = mpsc::channel::<Connection>(BACKEND_CHANNEL_DEPTH);

        match &self.topology {
            Topology::Proxy(workers) => {
                debug!("connecting to {} workers", workers.len());
                for addr in workers {
                    let conn = match transport::connect(addr).await {
                        Ok(conn) => conn,
                        Err(e) => {
                            on_bound.throw(RpcError::from(&e)).await;
                            return Err(e);
                        }
                    };
                    backend_tx
                        .send(conn)
                        .await
                        .expect("backend channel just created, receiver held below");
                }
            }
            Topology::Broker(backend_addr) => {
                debug!("listening for workers on {:?}", backend_addr);
                let mut backend_listener = match transport::bind(backend_addr).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        on_bound.throw(RpcError::from(&e)).await;
                        return Err(e);
                    }
                };
                let backend_tx = backend_tx.clone();
                tokio::spawn(async move {
                    loop {
                        match backend_listener.accept().await {
                            Ok(conn) => {
                                if backend_tx.send(conn).await.is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                warn!("backend accept loop stopped: {e}");
                                return;
                            }
                        }
                    }
                });
            }
        }

        on_bound.send(()).await;

        let backend_rx = Arc::new(Mutex::new(backend_rx));
        loop {
            let client_conn = frontend.accept().await?;
            let backend_rx = Arc::clone(&backend_rx);
            let backend_tx = backend_tx.clone();
            tokio::spawn(Self::serve_client(client_conn, backend_rx, backend_tx));
        }
    }

    /// Forward one client connection's requests to whichever backend is next
    /// idle, one round trip at a time, returning each backend to the pool after
    /// its reply unless it errored (in which case it's assumed dead and dropped).
    async fn serve_client(
        mut client: Connection,
        backend_rx: Arc<Mutex<mpsc::Receiver<Connection>>>,
        backend_tx: mpsc::Sender<Connection>,
    ) {
        loop {
            let frame = match client.recv_frame().await {
                Ok(frame) => frame,
                Err(TransportError::Closed) => return,
                Err(e) => {
                    warn!("error receiving from client: {e}");
                    return;
                }
            };

            let mut backend = {
                let mut rx = backend_rx.lock().await;
                match rx.recv().await {
                    Some(conn) => conn,
                    None => {
                        warn!("no backend workers available, dropping client connection");
                        return;
                    }
                }
            };

            if let Err(e) = backend.send_frame(frame).await {
                warn!("backend worker unreachable, discarding it: {e}");
                continue;
            }

            match backend.recv_frame().await {
                Ok(reply) => {
                    let _ = backend_tx.send(backend).await;
                    if let Err(e) = client.send_frame(reply).await {
                        warn!("error replying to client: {e}");
                        return;
                    }
                }
                Err(e) => {
                    warn!("backend worker died mid-request, discarding it: {e}");
                }
            }
        }
    }
}
