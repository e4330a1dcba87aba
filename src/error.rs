//! # Error Types
//!
//! Every error that can cross an RPC boundary is represented by [`RpcError`], a
//! single concrete type carrying a dotted `kind` string instead of a synthesized
//! class hierarchy. Transport, codec, and pool failures get their own
//! `thiserror`-derived types, consistent with how the rest of the crate reports
//! failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind string for a call against an unregistered method.
pub const KIND_MISSING_METHOD: &str = "zrpc.registry.missing_method";

/// Kind string for a handler that panicked instead of returning an `RpcError`.
pub const KIND_HANDLER_PANIC: &str = "zrpc.server.handler_panic";

/// A structured, dotted-name-discriminated RPC error.
///
/// This is the wire-level error representation (see [`crate::protocol::ErrorEnvelope`])
/// reconstructed on the client side. In place of the dynamic class hierarchy a
/// dynamically typed target would synthesize, callers match on `kind` directly or
/// via [`RpcError::is_kind`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    /// Fully-qualified error identifier, e.g. `"zrpc.registry.missing_method"`.
    pub kind: String,
    /// One-line human-readable summary.
    pub message: String,
    /// Structured arguments, when they round-trip through the codec without loss.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<serde_json::Value>>,
}

impl RpcError {
    /// Construct a new error with no structured arguments.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            args: None,
        }
    }

    /// Construct a new error carrying structured arguments.
    pub fn with_args(
        kind: impl Into<String>,
        message: impl Into<String>,
        args: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            args: Some(args),
        }
    }

    /// The missing-method error for `name`.
    pub fn missing_method(name: &str) -> Self {
        Self::with_args(
            KIND_MISSING_METHOD,
            format!("no such method: {name}"),
            vec![serde_json::Value::String(name.to_string())],
        )
    }

    /// Matches `name` against either the fully-qualified `kind` or its leaf
    /// component (the substring after the last `.`). This gives callers the same
    /// three granularities (fully-qualified, leaf, catch-all) a synthesized class
    /// hierarchy would, without synthesizing types at runtime.
    pub fn is_kind(&self, name: &str) -> bool {
        if self.kind == name {
            return true;
        }
        match self.kind.rsplit_once('.') {
            Some((_, leaf)) => leaf == name,
            None => false,
        }
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Failures from the transport layer (`tcp://`, `inproc://`).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid transport address {0:?}")]
    InvalidAddress(String),

    #[error("inproc address {0:?} is not bound")]
    NotBound(String),

    #[error("inproc address {0:?} is already bound")]
    AlreadyBound(String),

    #[error("connection closed")]
    Closed,

    #[error("message exceeds maximum frame size ({0} bytes)")]
    FrameTooLarge(usize),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures from encoding/decoding an envelope.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode envelope: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Failures from [`crate::pool::ObjectPool`] acquisition.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool exhausted, acquisition would block")]
    WouldBlock,
}

/// Kind string for a bind/connect failure reported through a startup [`Callback`](crate::concurrency::Callback).
pub const KIND_STARTUP_FAILED: &str = "zrpc.startup.failed";

impl From<&TransportError> for RpcError {
    /// Used to route a bind/connect failure through a startup `Callback` instead
    /// of only returning it from the enclosing `run` future, so a caller waiting
    /// on the callback doesn't hang forever when startup never gets that far.
    fn from(err: &TransportError) -> Self {
        RpcError::new(KIND_STARTUP_FAILED, err.to_string())
    }
}
