//! End-to-end scenario 5: a proxy-topology load balancer in front of one
//! worker, asserting the worker receives the exact bytes the client sent and
//! the client receives the exact bytes the worker replied with.

use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use zrpc::protocol::{Codec, JsonCodec, RequestEnvelope};
use zrpc::transport;
use zrpc::{Callback, LoadBalancer, Registry, Server};

fn fresh_addr(label: &str) -> String {
    format!("inproc://test-loadbal-{label}-{}", Uuid::new_v4().simple())
}

#[tokio::test]
async fn scenario_5_proxy_forwards_the_exact_request_and_reply_bytes() {
    let worker_addr = fresh_addr("worker");
    let registry = Arc::new(Registry::new());
    registry
        .register("add", |params| {
            Ok(json!(params[0].as_f64().unwrap() + params[1].as_f64().unwrap()))
        })
        .await;
    let worker = Server::bind(worker_addr.clone(), registry);
    let worker_ready: Callback<()> = Callback::new();
    let worker_wait = worker_ready.clone();
    tokio::spawn(async move {
        let _ = worker.run(None, worker_ready).await;
    });
    worker_wait.wait().await.unwrap();

    let frontend_addr = fresh_addr("frontend");
    let lb = LoadBalancer::proxy(frontend_addr.clone(), vec![worker_addr.clone()]);
    let lb_ready: Callback<()> = Callback::new();
    let lb_wait = lb_ready.clone();
    tokio::spawn(async move {
        let _ = lb.run(lb_ready).await;
    });
    lb_wait.wait().await.unwrap();

    let request = RequestEnvelope::new("add", vec![json!(3), json!(4)]);
    let request_bytes = JsonCodec.encode_request(&request).unwrap();

    // Oracle: the exact reply bytes a direct connection to the worker gives
    // for this same request frame, bypassing the load balancer entirely.
    let mut direct_conn = transport::connect(&worker_addr).await.unwrap();
    direct_conn.send_frame(request_bytes.clone()).await.unwrap();
    let expected_reply_bytes = direct_conn.recv_frame().await.unwrap();

    let mut client_conn = transport::connect(&frontend_addr).await.unwrap();
    client_conn.send_frame(request_bytes).await.unwrap();
    let reply_bytes = client_conn.recv_frame().await.unwrap();

    assert_eq!(reply_bytes, expected_reply_bytes);
}
