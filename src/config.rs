//! # Configuration Defaults
//!
//! Small, mostly-constant knobs for the transport and demo layers, following the
//! teacher crate's `defaults` module — a flat set of `pub const`s rather than a
//! runtime-configurable settings object, since none of these currently need to
//! vary per-call.

use std::time::Duration;

/// Default number of workers a demo [`crate::multiserver::MultiServer`] brings up.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// How long a [`crate::client::Client`] call will wait for a connection attempt
/// before giving up, when a timeout is applied at the call site. Not currently
/// enforced inside `Client` itself (its `connect`/`call` calls whatever the
/// transport gives them); provided so a caller wrapping a call in
/// `tokio::time::timeout` has a sane shared default rather than inventing one.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Depth of the idle-connection channel a proxy/broker
/// [`crate::loadbalancer::LoadBalancer`] keeps, re-exported here so a caller
/// sizing their own worker pool has the same number the load balancer uses.
pub const DEFAULT_BACKEND_CHANNEL_DEPTH: usize = 256;

/// Default address a demo server listens on.
pub const DEFAULT_DEMO_ADDR: &str = "tcp://127.0.0.1:7341";
