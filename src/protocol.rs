//! # Request/Response Protocol
//!
//! Defines the request and response envelopes exchanged over a [`crate::transport`]
//! connection, and the [`Codec`] that turns them into wire bytes. Every request and
//! response is exactly one JSON object; framing (so a `recv` yields one whole
//! envelope) is the transport layer's job, not the codec's.

use crate::error::{CodecError, RpcError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The maximum size, in bytes of serialized JSON, that a handler error's `args`
/// may reach before the encodability probe gives up and omits them. Prevents a
/// pathological exception from a handler forcing a full encode of gigabytes of
/// data just to find out it doesn't fit in a response.
pub const MAX_ERROR_ARGS_PROBE_BYTES: usize = 64 * 1024;

/// A single RPC request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestEnvelope {
    /// Correlation token. Present on every request this crate constructs; optional
    /// in the struct because a well-behaved but minimal peer could omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The procedure name, looked up verbatim in the registry. May contain dots;
    /// dots carry no server-side meaning.
    pub method: String,
    /// Positional arguments.
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
}

impl RequestEnvelope {
    /// Build a request with a freshly generated correlation id.
    pub fn new(method: impl Into<String>, params: Vec<serde_json::Value>) -> Self {
        Self {
            id: Some(new_request_id()),
            method: method.into(),
            params,
        }
    }
}

/// The error half of a [`ResponseEnvelope`]. Identical in shape to [`RpcError`];
/// kept as a distinct type so the wire schema (`kind`/`message`/`args`) is
/// documented independently of the in-memory error type it round-trips to.
pub type ErrorEnvelope = RpcError;

/// A single RPC response. Exactly one of `result`/`error` is present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseEnvelope {
    /// Copied verbatim from the request's `id`, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
}

impl ResponseEnvelope {
    /// A successful response.
    pub fn ok(id: Option<String>, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// A failed response.
    pub fn err(id: Option<String>, error: RpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    /// `true` iff exactly one of `result`/`error` is present, as the protocol
    /// invariant requires.
    pub fn is_well_formed(&self) -> bool {
        self.result.is_some() != self.error.is_some()
    }
}

/// Generate a fresh correlation id: a 128-bit random value rendered as a
/// 32-character lowercase hex string with no separators (a UUIDv4 with its
/// hyphens stripped), matching the reference implementation's `uuid4().hex`.
pub fn new_request_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Encodes/decodes envelopes for wire transmission.
///
/// Implementations must preserve integer width, strings, booleans, null, ordered
/// sequences, and keyed records, and must ignore unknown keys on decode.
pub trait Codec: Send + Sync {
    fn encode_request(&self, request: &RequestEnvelope) -> Result<Vec<u8>, CodecError>;
    fn decode_request(&self, bytes: &[u8]) -> Result<RequestEnvelope, CodecError>;
    fn encode_response(&self, response: &ResponseEnvelope) -> Result<Vec<u8>, CodecError>;
    fn decode_response(&self, bytes: &[u8]) -> Result<ResponseEnvelope, CodecError>;
}

/// The default [`Codec`]: plain JSON. Acceptable per the protocol's own rules
/// since no binary payloads are required and no BSON implementation is available
/// in this dependency graph.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode_request(&self, request: &RequestEnvelope) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(request).map_err(CodecError::Encode)
    }

    fn decode_request(&self, bytes: &[u8]) -> Result<RequestEnvelope, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }

    fn encode_response(&self, response: &ResponseEnvelope) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(response).map_err(CodecError::Encode)
    }

    fn decode_response(&self, bytes: &[u8]) -> Result<ResponseEnvelope, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }
}

/// Tests whether `args` would round-trip through `codec` without loss, capping
/// the probe so a pathological value can't force an unbounded encode. Returns
/// `Some(args)` if the probe succeeded within budget, `None` otherwise — callers
/// treat `None` as "omit `args` from the response".
pub fn probe_encodable_args(
    codec: &dyn Codec,
    args: &[serde_json::Value],
) -> Option<Vec<serde_json::Value>> {
    let probe = serde_json::to_vec(args).ok()?;
    if probe.len() > MAX_ERROR_ARGS_PROBE_BYTES {
        return None;
    }
    // Confirm it also survives the configured codec's own round-trip, not just
    // serde_json's; for JsonCodec this is redundant, but a future non-JSON codec
    // (e.g. one with stricter key/type rules) might reject what raw JSON accepts.
    let request = RequestEnvelope {
        id: None,
        method: String::new(),
        params: args.to_vec(),
    };
    let encoded = codec.encode_request(&request).ok()?;
    let decoded = codec.decode_request(&encoded).ok()?;
    Some(decoded.params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let codec = JsonCodec;
        let req = RequestEnvelope::new("math.add", vec![serde_json::json!(3), serde_json::json!(4)]);
        let bytes = codec.encode_request(&req).unwrap();
        let back = codec.decode_request(&bytes).unwrap();
        assert_eq!(req, back);
    }

    #[test]
    fn response_round_trips_success() {
        let codec = JsonCodec;
        let resp = ResponseEnvelope::ok(Some("abc".into()), serde_json::json!(7));
        let bytes = codec.encode_response(&resp).unwrap();
        let back = codec.decode_response(&bytes).unwrap();
        assert_eq!(resp, back);
        assert!(back.is_well_formed());
    }

    #[test]
    fn response_round_trips_error() {
        let codec = JsonCodec;
        let resp = ResponseEnvelope::err(Some("abc".into()), RpcError::missing_method("nope"));
        let bytes = codec.encode_response(&resp).unwrap();
        let back = codec.decode_response(&bytes).unwrap();
        assert_eq!(resp, back);
        assert!(back.is_well_formed());
    }

    #[test]
    fn decode_ignores_unknown_keys() {
        let codec = JsonCodec;
        let bytes = br#"{"id":"abc","method":"add","params":[1,2],"extra":"ignored"}"#;
        let req = codec.decode_request(bytes).unwrap();
        assert_eq!(req.method, "add");
        assert_eq!(req.params, vec![serde_json::json!(1), serde_json::json!(2)]);
    }

    #[test]
    fn request_without_id_omits_the_key() {
        let req = RequestEnvelope {
            id: None,
            method: "ping".into(),
            params: vec![],
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(!value.as_object().unwrap().contains_key("id"));
    }

    #[test]
    fn new_request_id_is_32_char_hex_with_no_separators() {
        let id = new_request_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn probe_encodable_args_caps_oversized_payloads() {
        let codec = JsonCodec;
        let huge = serde_json::Value::String("x".repeat(MAX_ERROR_ARGS_PROBE_BYTES + 1));
        assert!(probe_encodable_args(&codec, &[huge]).is_none());

        let small = vec![serde_json::json!("some error occurred")];
        assert_eq!(probe_encodable_args(&codec, &small), Some(small));
    }
}
