//! Universal property: startup ordering and the `die_after` budget, driven
//! through the public `zrpc::Server` API over a real connection.

use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use zrpc::protocol::{Codec, JsonCodec, RequestEnvelope, ResponseEnvelope};
use zrpc::transport;
use zrpc::{Callback, Registry, Server};

fn fresh_addr(label: &str) -> String {
    format!("inproc://test-server-{label}-{}", Uuid::new_v4().simple())
}

#[tokio::test]
async fn on_bound_only_fires_once_the_address_is_actually_reachable() {
    let addr = fresh_addr("ready");
    let registry = Arc::new(Registry::new());
    registry.register("echo", |params| Ok(params[0].clone())).await;

    let server = Server::bind(addr.clone(), registry);
    let ready: Callback<()> = Callback::new();
    let waiter = ready.clone();
    let handle = tokio::spawn(async move { server.run(None, ready).await });
    waiter.wait().await.unwrap();

    // If on_bound fired before the listener was actually up, this connect
    // would race it and could fail.
    let conn = transport::connect(&addr).await;
    assert!(conn.is_ok());
    handle.abort();
}

#[tokio::test]
async fn die_after_counts_messages_across_every_accepted_connection() {
    let addr = fresh_addr("die-after-total");
    let registry = Arc::new(Registry::new());
    registry.register("echo", |params| Ok(params[0].clone())).await;

    let server = Server::bind(addr.clone(), registry);
    let ready: Callback<()> = Callback::new();
    let waiter = ready.clone();
    let handle = tokio::spawn(async move { server.run(Some(2), ready).await });
    waiter.wait().await.unwrap();

    let codec = JsonCodec;

    // First connection spends one message of the shared budget.
    let mut first = transport::connect(&addr).await.unwrap();
    let request = RequestEnvelope::new("echo", vec![json!(1)]);
    first.send_frame(codec.encode_request(&request).unwrap()).await.unwrap();
    let reply = first.recv_frame().await.unwrap();
    let response: ResponseEnvelope = codec.decode_response(&reply).unwrap();
    assert_eq!(response.result, Some(json!(1)));

    // Second connection spends the last message of the same shared budget.
    let mut second = transport::connect(&addr).await.unwrap();
    let request = RequestEnvelope::new("echo", vec![json!(2)]);
    second.send_frame(codec.encode_request(&request).unwrap()).await.unwrap();
    let reply = second.recv_frame().await.unwrap();
    let response: ResponseEnvelope = codec.decode_response(&reply).unwrap();
    assert_eq!(response.result, Some(json!(2)));

    // The budget is now spent: `run` returns instead of blocking forever in
    // `accept()`, dropping the listener and freeing the address.
    handle.await.unwrap().unwrap();
    let third = transport::connect(&addr).await;
    assert!(third.is_err());
}
