//! Typed wrapper layer: maps a caller-declared signature to one of the
//! three wire forms and installs the matching encode/decode adapter.
//!
//! Rust has no compile-time template specialization, so this does not
//! attempt a single generic `add_rpc<Args, R>` entry point that
//! auto-detects the wire form from its type parameters (that would require
//! overlapping trait impls the coherence checker forbids). Instead it
//! follows the redesign this decision table was flagged for: four explicit
//! registration entry points, one per row, plus a generic MSGPACK entry
//! point parameterized over any `Serialize + DeserializeOwned` pair.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ::bytes::Bytes as WireBytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::puller::Puller;
use crate::remote_function::RemoteFunction;
use crate::server::{RawRpcFn, Server};
use crate::wire::WireForm;

/// The Rust analogue of the original's `Bytes`/`BytesView`: a thin wrapper
/// that always maps to the BIN wire form, identity in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bytes(pub Vec<u8>);

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Bytes(v)
    }
}

impl From<Bytes> for Vec<u8> {
    fn from(b: Bytes) -> Self {
        b.0
    }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

// ---- Server: AddRpc ----

impl Server {
    /// `string(string)` -> TEXT, identity in both directions.
    pub fn add_rpc_string<F, Fut>(&self, method: &str, func_name: &str, f: F) -> Result<()>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        let f = Arc::new(f);
        let callback: RawRpcFn = Arc::new(move |bytes: Vec<u8>| -> BoxFuture<Result<Vec<u8>>> {
            let f = f.clone();
            Box::pin(async move {
                let text = String::from_utf8(bytes)
                    .map_err(|e| Error::BadRequest(format!("invalid utf-8: {e}")))?;
                Ok(f(text).await.into_bytes())
            })
        });
        self.add_rpc_raw(method, WireForm::Text, func_name, callback)
    }

    /// `Bytes(Bytes|BytesView)` -> BIN, identity in both directions.
    pub fn add_rpc_bytes<F, Fut>(&self, method: &str, func_name: &str, f: F) -> Result<()>
    where
        F: Fn(Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Bytes> + Send + 'static,
    {
        let f = Arc::new(f);
        let callback: RawRpcFn = Arc::new(move |bytes: Vec<u8>| -> BoxFuture<Result<Vec<u8>>> {
            let f = f.clone();
            Box::pin(async move { Ok(f(Bytes(bytes)).await.0) })
        });
        self.add_rpc_raw(method, WireForm::Bin, func_name, callback)
    }

    /// `dynamic(dynamic)` -> TEXT, parsed/serialized as JSON.
    pub fn add_rpc_json<F, Fut>(&self, method: &str, func_name: &str, f: F) -> Result<()>
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = serde_json::Value> + Send + 'static,
    {
        let f = Arc::new(f);
        let callback: RawRpcFn = Arc::new(move |bytes: Vec<u8>| -> BoxFuture<Result<Vec<u8>>> {
            let f = f.clone();
            Box::pin(async move {
                let value: serde_json::Value = serde_json::from_slice(&bytes)
                    .map_err(|e| Error::BadRequest(format!("bad rpc request: {e}")))?;
                let out = f(value).await;
                serde_json::to_vec(&out)
                    .map_err(|e| Error::BadRequest(format!("bad rpc request: {e}")))
            })
        });
        self.add_rpc_raw(method, WireForm::Text, func_name, callback)
    }

    /// Anything else -> MSGPACK: unpack args as a MessagePack tuple, pack
    /// the return value.
    pub fn add_rpc_msgpack<Args, R, F, Fut>(&self, method: &str, func_name: &str, f: F) -> Result<()>
    where
        Args: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let f = Arc::new(f);
        let callback: RawRpcFn = Arc::new(move |bytes: Vec<u8>| -> BoxFuture<Result<Vec<u8>>> {
            let f = f.clone();
            Box::pin(async move {
                let args: Args = rmp_serde::from_slice(&bytes)
                    .map_err(|e| Error::BadRequest(format!("bad rpc request: {e}")))?;
                let out = f(args).await;
                rmp_serde::to_vec(&out)
                    .map_err(|e| Error::BadRequest(format!("bad rpc request: {e}")))
            })
        });
        self.add_rpc_raw(method, WireForm::Msgpack, func_name, callback)
    }

    // ---- Server: AddPublish ----

    pub fn add_publish_string(&self, method: &str, func_name: &str, queue_size: usize) -> Result<()> {
        self.add_publish_raw(method, WireForm::Text, func_name, queue_size)
    }

    pub fn add_publish_json(&self, method: &str, func_name: &str, queue_size: usize) -> Result<()> {
        self.add_publish_raw(method, WireForm::Text, func_name, queue_size)
    }

    pub fn add_publish_bytes(&self, method: &str, func_name: &str, queue_size: usize) -> Result<()> {
        self.add_publish_raw(method, WireForm::Bin, func_name, queue_size)
    }

    pub fn add_publish_msgpack(&self, method: &str, func_name: &str, queue_size: usize) -> Result<()> {
        self.add_publish_raw(method, WireForm::Msgpack, func_name, queue_size)
    }

    pub fn publish_string(&self, method: &str, msg: String) -> Result<()> {
        self.publish_raw(method, WireBytes::from(msg.into_bytes()))
    }

    pub fn publish_json(&self, method: &str, msg: &serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec(msg)
            .map_err(|e| Error::DataConvertible(format!("TEXT encode error: {e}")))?;
        self.publish_raw(method, WireBytes::from(bytes))
    }

    pub fn publish_bytes(&self, method: &str, msg: Bytes) -> Result<()> {
        self.publish_raw(method, WireBytes::from(msg.0))
    }

    pub fn publish_msgpack<MSG: Serialize>(&self, method: &str, msg: &MSG) -> Result<()> {
        let bytes = rmp_serde::to_vec(msg)
            .map_err(|e| Error::DataConvertible(format!("MSGPACK encode error: {e}")))?;
        self.publish_raw(method, WireBytes::from(bytes))
    }
}

// ---- RemoteFunction sugar ----

impl RemoteFunction {
    pub fn call_string(&self, arg: String) -> Result<String> {
        let bytes = self.invoke_raw(arg.into_bytes())?;
        String::from_utf8(bytes).map_err(|e| Error::DataConvertible(e.to_string()))
    }

    pub fn call_bytes(&self, arg: Bytes) -> Result<Bytes> {
        self.invoke_raw(arg.0).map(Bytes)
    }

    pub fn call_json(&self, arg: &serde_json::Value) -> Result<serde_json::Value> {
        let body = serde_json::to_vec(arg)
            .map_err(|e| Error::DataConvertible(format!("TEXT encode error: {e}")))?;
        let bytes = self.invoke_raw(body)?;
        serde_json::from_slice(&bytes).map_err(|e| Error::DataConvertible(e.to_string()))
    }

    pub fn call_msgpack<Args: Serialize, R: DeserializeOwned>(&self, args: Args) -> Result<R> {
        let body = rmp_serde::to_vec(&args)
            .map_err(|e| Error::DataConvertible(format!("MSGPACK encode error: {e}")))?;
        let bytes = self.invoke_raw(body)?;
        rmp_serde::from_slice(&bytes).map_err(|e| Error::DataConvertible(e.to_string()))
    }
}

// ---- Puller sugar ----

pub fn pull_string<F>(
    uri: &str,
    method: &str,
    executor: Arc<Executor>,
    handler: F,
) -> Result<Arc<Puller>>
where
    F: Fn(Result<String>) + Send + Sync + 'static,
{
    Puller::create(uri, method, WireForm::Text, executor, move |result| {
        handler(result.and_then(|b| String::from_utf8(b).map_err(|e| Error::DataConvertible(e.to_string()))))
    })
}

pub fn pull_bytes<F>(
    uri: &str,
    method: &str,
    executor: Arc<Executor>,
    handler: F,
) -> Result<Arc<Puller>>
where
    F: Fn(Result<Bytes>) + Send + Sync + 'static,
{
    Puller::create(uri, method, WireForm::Bin, executor, move |result| {
        handler(result.map(Bytes))
    })
}

pub fn pull_json<F>(
    uri: &str,
    method: &str,
    executor: Arc<Executor>,
    handler: F,
) -> Result<Arc<Puller>>
where
    F: Fn(Result<serde_json::Value>) + Send + Sync + 'static,
{
    Puller::create(uri, method, WireForm::Text, executor, move |result| {
        handler(result.and_then(|b| {
            serde_json::from_slice(&b).map_err(|e| Error::DataConvertible(e.to_string()))
        }))
    })
}

pub fn pull_msgpack<MSG, F>(
    uri: &str,
    method: &str,
    executor: Arc<Executor>,
    handler: F,
) -> Result<Arc<Puller>>
where
    MSG: DeserializeOwned + Send + 'static,
    F: Fn(Result<MSG>) + Send + Sync + 'static,
{
    Puller::create(uri, method, WireForm::Msgpack, executor, move |result| {
        handler(result.and_then(|b| {
            rmp_serde::from_slice(&b).map_err(|e| Error::DataConvertible(e.to_string()))
        }))
    })
}
