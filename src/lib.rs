//! # zrpc
//!
//! A minimal RPC framework over `tcp://` and `inproc://` transports, with
//! fair-queue load balancing across worker connections and synchronized
//! multi-worker startup. A [`client::Client`] calls named procedures registered
//! in a [`registry::Registry`] and served by a [`server::Server`]; several
//! servers can sit behind one [`loadbalancer::LoadBalancer`] or, more simply,
//! behind a [`multiserver::MultiServer`].

pub mod client;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod loadbalancer;
pub mod logging;
pub mod multiserver;
pub mod pool;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

pub use client::{CallError, Client, MethodHandle};
pub use concurrency::Callback;
pub use error::RpcError;
pub use loadbalancer::LoadBalancer;
pub use multiserver::MultiServer;
pub use pool::{ObjectPool, PoolGuard};
pub use registry::Registry;
pub use server::Server;

/// The current version of the framework.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
