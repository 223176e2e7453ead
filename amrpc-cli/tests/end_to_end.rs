//! Drives a real in-process `amrpc_core::Server` through the client API,
//! covering the end-to-end scenarios a CLI session against a live server
//! would exercise: typed RPC round-trips, content negotiation, and
//! Publish/Puller fan-out and teardown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use amrpc_core::executor::Executor;
use amrpc_core::puller::Puller;
use amrpc_core::remote_function::RemoteFunction;
use amrpc_core::transport::{self, Envelope};
use amrpc_core::wire;
use amrpc_core::{Bytes, Server, ServerConfig, WireForm};

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_uri(name: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("ipc://amrpc-cli-test-{name}-{}-{n}", std::process::id())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct TestMsg {
    int_num: i64,
    double_num: f64,
    str: String,
}

#[tokio::test]
async fn msgpack_rpc_round_trip() {
    let uri = test_uri("msgpack");
    let server = Server::bind(&uri, ServerConfig::default()).unwrap();
    server
        .add_rpc_msgpack::<TestMsg, String, _, _>("/test", "rpc_msg", |_msg: TestMsg| async move {
            "rpc.msg".to_string()
        })
        .unwrap();

    let func = RemoteFunction::new(&uri, "/test", WireForm::Msgpack, Executor::new("t").unwrap());
    let result: String = func
        .call_msgpack(TestMsg {
            int_num: 1,
            double_num: 1.0,
            str: "abcd".to_string(),
        })
        .unwrap();
    assert_eq!(result, "rpc.msg");
}

#[tokio::test]
async fn string_rpc_echo() {
    let uri = test_uri("string");
    let server = Server::bind(&uri, ServerConfig::default()).unwrap();
    server
        .add_rpc_string("/test", "rpc_string", |s| async move { s })
        .unwrap();

    let func = RemoteFunction::new(&uri, "/test", WireForm::Text, Executor::new("t").unwrap());
    assert_eq!(func.call_string("rpc.string".to_string()).unwrap(), "rpc.string");
}

#[tokio::test]
async fn bytes_rpc_echo() {
    let uri = test_uri("bytes");
    let server = Server::bind(&uri, ServerConfig::default()).unwrap();
    server
        .add_rpc_bytes("/test", "rpc_bytes", |b: Bytes| async move { b })
        .unwrap();

    let func = RemoteFunction::new(&uri, "/test", WireForm::Bin, Executor::new("t").unwrap());
    let echoed = func.call_bytes(Bytes(b"rpc.bytes".to_vec())).unwrap();
    assert_eq!(echoed.0, b"rpc.bytes");
}

#[tokio::test]
async fn void_args_rpc() {
    let uri = test_uri("void");
    let server = Server::bind(&uri, ServerConfig::default()).unwrap();
    let callback: amrpc_core::server::RawRpcFn = Arc::new(
        |_body: Vec<u8>| -> std::pin::Pin<Box<dyn std::future::Future<Output = amrpc_core::Result<Vec<u8>>> + Send>> {
            Box::pin(async move { Ok(b"rpc.void".to_vec()) })
        },
    );
    server.add_rpc_raw("/test", WireForm::Bin, "rpc_void", callback).unwrap();

    let func = RemoteFunction::new(&uri, "/test", WireForm::Bin, Executor::new("t").unwrap());
    let echoed = func.invoke_raw(Vec::new()).unwrap();
    assert_eq!(echoed, b"rpc.void");
}

#[tokio::test]
async fn auto_conversion_text_to_msgpack() {
    let uri = test_uri("autoconv");
    let server = Server::bind(&uri, ServerConfig::default()).unwrap();
    server
        .add_rpc_msgpack::<TestMsg, String, _, _>("/test", "rpc_auto", |_msg: TestMsg| async move {
            "rpc.autoConv".to_string()
        })
        .unwrap();

    let executor = Executor::new("t").unwrap();
    let body = serde_json::to_vec(&serde_json::json!({
        "int_num": 2, "double_num": 2.0, "str": "abcde"
    }))
    .unwrap();
    let response = executor
        .submit(send_raw(&uri, "/test", wire::MIME_JSON, wire::MIME_JSON, body))
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, br#""rpc.autoConv""#);
}

#[tokio::test]
async fn conversion_failure_reports_500() {
    let uri = test_uri("convfail");
    let server = Server::bind(&uri, ServerConfig::default()).unwrap();
    server
        .add_rpc_msgpack::<TestMsg, String, _, _>("/test", "rpc_fail", |_msg: TestMsg| async move {
            "unreachable".to_string()
        })
        .unwrap();

    let executor = Executor::new("t").unwrap();
    let response = executor
        .submit(send_raw(
            &uri,
            "/test",
            wire::MIME_BIN,
            wire::MIME_JSON,
            b"whatever".to_vec(),
        ))
        .unwrap();
    assert_eq!(response.status, 500);
    assert!(response.reason.unwrap_or_default().len() > 0);
}

#[tokio::test]
async fn publish_delivery() {
    let uri = test_uri("publish");
    let server = Server::bind(&uri, ServerConfig::default()).unwrap();
    server.add_publish_msgpack("/test", "publish_test", 8).unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let executor = Executor::new("t").unwrap();
    let _puller = Puller::create(&uri, "/test", WireForm::Msgpack, executor, move |result| {
        let _ = tx.send(result);
    })
    .unwrap();

    // give the subscribe handshake time to land before publishing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    server
        .publish_msgpack(
            "/test",
            &TestMsg {
                int_num: 2,
                double_num: 2.0,
                str: "abcde".to_string(),
            },
        )
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("puller handler never fired")
        .expect("channel closed");
    let bytes = received.expect("puller delivered an error");
    let msg: TestMsg = rmp_serde::from_slice(&bytes).unwrap();
    assert_eq!(
        msg,
        TestMsg {
            int_num: 2,
            double_num: 2.0,
            str: "abcde".to_string()
        }
    );
}

#[tokio::test]
async fn server_drop_terminates_puller() {
    let uri = test_uri("serverdrop");
    let server = Server::bind(&uri, ServerConfig::default()).unwrap();
    server.add_publish_bytes("/test", "drop_test", 8).unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let executor = Executor::new("t").unwrap();
    let _puller = Puller::create(&uri, "/test", WireForm::Bin, executor, move |result| {
        let _ = tx.send(result);
    })
    .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(server);

    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("puller handler never fired")
        .expect("channel closed");
    assert!(received.is_err());
}

async fn send_raw(
    uri: &str,
    method: &str,
    content_type: &str,
    accept: &str,
    body: Vec<u8>,
) -> amrpc_core::Result<Envelope> {
    let mut session = transport::connect(uri).await?;
    let request = Envelope::request(method, body)
        .with_header(wire::CONTENT_TYPE, content_type)
        .with_header(wire::ACCEPT, accept)
        .with_header("connection", "close");
    session.write(&request).await?;
    let response = session
        .read()
        .await?
        .ok_or_else(|| amrpc_core::Error::Transport("connection closed before response".into()))?;
    let _ = session.close().await;
    Ok(response)
}
