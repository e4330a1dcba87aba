//! # zrpc-demo
//!
//! A runnable demonstration of the framework: brings up a load-balanced
//! [`zrpc::multiserver::MultiServer`] exposing a couple of toy methods, then
//! drives it with a [`zrpc::client::Client`].

use anyhow::Result;
use clap::{
    builder::styling::{AnsiColor, Styles},
    Parser,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{filter::LevelFilter, prelude::*, Layer};

use zrpc::client::Client;
use zrpc::concurrency::Callback;
use zrpc::config::DEFAULT_DEMO_ADDR;
use zrpc::error::RpcError;
use zrpc::logging::ColorizedFormatter;
use zrpc::multiserver::MultiServer;
use zrpc::registry::Registry;

/// Defines the styles for the help message to replicate clap v3's appearance.
fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Yellow.on_default())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// zrpc demo - bring up a load-balanced RPC server and call it a few times.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None, styles = styles())]
struct DemoArgs {
    /// Address the demo listens on.
    #[arg(long, default_value = DEFAULT_DEMO_ADDR)]
    addr: String,

    /// Number of backend workers behind the load balancer.
    #[arg(short = 'n', long, default_value_t = zrpc::config::DEFAULT_WORKER_COUNT)]
    workers: usize,

    /// Number of calls to make against the server before exiting.
    #[arg(short = 'c', long, default_value_t = 8)]
    calls: usize,

    /// Write detailed logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<String>,

    /// Increase diagnostic log verbosity on stderr/file.
    ///
    ///  -v: debug
    ///  -vv and more: trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence the colorized, user-facing summary on stdout.
    #[arg(short = 'q', long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = DemoArgs::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let guard;
    let detailed_log_layer;
    if let Some(path) = args.log_file.as_deref() {
        let log_path = std::path::Path::new(path);
        let log_dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let log_filename = log_path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("zrpc-demo.log"));
        let file_appender = tracing_appender::rolling::daily(log_dir, log_filename);
        let (non_blocking_writer, file_guard) = tracing_appender::non_blocking(file_appender);
        detailed_log_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_filter(log_level)
            .boxed();
        guard = Some(file_guard);
    } else {
        detailed_log_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(log_level)
            .boxed();
        guard = None;
    }

    let stdout_log = if !args.quiet {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .event_format(ColorizedFormatter)
                .with_filter(log_level),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(detailed_log_layer)
        .with(stdout_log)
        .init();
    let _log_guard = guard;

    info!("starting zrpc demo on {:?} with {} workers", args.addr, args.workers);

    let registry = Arc::new(Registry::new());
    registry
        .register("add", |params| {
            let a = params[0].as_f64().ok_or_else(|| RpcError::new("zrpc.demo.bad_arg", "expected a number"))?;
            let b = params[1].as_f64().ok_or_else(|| RpcError::new("zrpc.demo.bad_arg", "expected a number"))?;
            Ok(json!(a + b))
        })
        .await;
    registry
        .register("echo", |params| Ok(params.get(0).cloned().unwrap_or(serde_json::Value::Null)))
        .await;

    let multiserver = MultiServer::new(args.addr.clone(), Arc::clone(&registry));
    let ready: Callback<Vec<()>> = Callback::new();
    let waiter = ready.clone();
    let addr_for_server = args.addr.clone();
    let workers = args.workers;
    tokio::spawn(async move {
        multiserver.run(workers, ready).await;
    });

    match waiter.wait().await {
        Ok(started) => info!("{} workers are up behind {:?}", started.len(), addr_for_server),
        Err(e) => {
            error!("demo server failed to start: {e}");
            return Err(e.into());
        }
    }

    let client = Client::new(&args.addr).await?;
    for i in 0..args.calls {
        let result = client.call("add", vec![json!(i), json!(1)]).await;
        match result {
            Ok(value) => info!("add({i}, 1) = {value}"),
            Err(e) => error!("call failed: {e}"),
        }
    }

    info!("zrpc demo finished");
    Ok(())
}
