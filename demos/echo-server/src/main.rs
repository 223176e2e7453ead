//! Registers one RPC of each wire-form flavor plus a Publish endpoint, for
//! manually exercising an amrpc server or driving it from `amrpc-cli`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use amrpc_core::{Bytes, Server, ServerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TestMsg {
    int_num: i64,
    double_num: f64,
    str: String,
}

fn main() -> amrpc_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
        .init();

    let uri = std::env::args().nth(1).unwrap_or_else(|| "ipc://echo-demo".to_string());
    let server = Server::bind(&uri, ServerConfig::default())?;

    server.add_rpc_string("/echo/string", "echo_string", |s| async move { s })?;
    server.add_rpc_bytes("/echo/bytes", "echo_bytes", |b: Bytes| async move { b })?;
    server.add_rpc_json("/echo/dynamic", "echo_dynamic", |v| async move { v })?;
    server.add_rpc_msgpack::<TestMsg, String, _, _>("/echo/msgpack", "echo_msgpack", |msg| async move {
        format!("{}:{}:{}", msg.int_num, msg.double_num, msg.str)
    })?;
    server.add_publish_string("/echo/publish", "echo_publish", 16)?;

    tracing::info!(%uri, "echo-server listening");

    let executor = server.executor().clone();
    let heartbeat_server = server.clone();
    executor.spawn(async move {
        let mut tick: u64 = 0;
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tick += 1;
            let _ = heartbeat_server.publish_string("/echo/publish", format!("tick {tick}"));
        }
    });

    server.executor().submit(tokio::signal::ctrl_c()).ok();
    Ok(())
}
