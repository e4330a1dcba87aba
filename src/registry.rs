//! # Dispatch Registry
//!
//! Maps procedure names to handlers and dispatches calls to them. Mirrors
//! `zrpc.registry.Registry` from the reference implementation: registration
//! silently replaces, dispatch on a missing name fails with a `missing_method`
//! [`RpcError`], and a handler's own error propagates unchanged — this module
//! never itself catches a handler's failure, that's [`crate::server::Server`]'s job.

use crate::error::RpcError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// A registered procedure. Takes the request's positional arguments and returns
/// either a result value or a structured error.
pub type Handler = Arc<dyn Fn(&[Value]) -> Result<Value, RpcError> + Send + Sync>;

/// Name -> handler mapping for one server.
#[derive(Default)]
pub struct Registry {
    handlers: RwLock<HashMap<String, Handler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `handler`, replacing any prior binding. Rust has no
    /// runtime introspection of a closure's name, so unlike the reference
    /// implementation's optional name-from-introspection, the name is always
    /// supplied explicitly.
    pub async fn register(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&[Value]) -> Result<Value, RpcError> + Send + Sync + 'static,
    ) {
        let name = name.into();
        let mut handlers = self.handlers.write().await;
        if handlers.insert(name.clone(), Arc::new(handler)).is_some() {
            warn!("registry: replacing existing handler for {:?}", name);
        }
    }

    /// Look up `name` and invoke it with `params`. On a miss, fails with an
    /// [`RpcError`] of kind `zrpc.registry.missing_method`. A handler's own
    /// error return value propagates unchanged.
    pub async fn dispatch(&self, name: &str, params: &[Value]) -> Result<Value, RpcError> {
        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(name).cloned()
        };
        match handler {
            Some(handler) => handler(params),
            None => Err(RpcError::missing_method(name)),
        }
    }

    /// Number of registered names. Mostly useful for tests and diagnostics.
    pub async fn len(&self) -> usize {
        self.handlers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
