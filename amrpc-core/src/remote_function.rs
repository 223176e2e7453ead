//! Client-side unary caller: dials a fresh connection per call (matching the
//! `Connection: close` contract), negotiates `Content-Type`/`Accept`, and
//! maps the response status to a typed result.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::transport::{self, Envelope};
use crate::wire::{self, WireForm};

pub struct RemoteFunction {
    executor: Arc<Executor>,
    uri: String,
    method: String,
    wire_form: WireForm,
}

impl RemoteFunction {
    pub fn new(uri: &str, method: &str, wire_form: WireForm, executor: Arc<Executor>) -> Self {
        RemoteFunction {
            executor,
            uri: uri.to_string(),
            method: method.to_string(),
            wire_form,
        }
    }

    pub fn wire_form(&self) -> WireForm {
        self.wire_form
    }

    /// Blocks until a unary GET with `amrpc_check_enabled` resolves.
    pub fn enabled(&self) -> Result<bool> {
        let uri = self.uri.clone();
        let method = self.method.clone();
        self.executor.submit(async move {
            let mut session = transport::connect(&uri).await?;
            let request = Envelope::request(method, Vec::new())
                .with_header(wire::CHECK_ENABLED, "1")
                .with_header("connection", "close");
            session.write(&request).await?;
            let response = session
                .read()
                .await?
                .ok_or_else(|| Error::Transport("connection closed before response".into()))?;
            let _ = session.close().await;
            match response.status {
                200 => Ok(true),
                404 => Err(Error::NotFound),
                other => Err(Error::UnknownStatus(other)),
            }
        })
    }

    /// Invoke the method with a raw body already encoded in this
    /// function's wire form. Returns the raw response body.
    pub fn invoke_raw(&self, body: Vec<u8>) -> Result<Vec<u8>> {
        let uri = self.uri.clone();
        let method = self.method.clone();
        let mime = self.wire_form.as_mime();
        self.executor.submit(async move {
            let mut session = transport::connect(&uri).await?;
            let request = Envelope::request(method, body)
                .with_header(wire::CONTENT_TYPE, mime)
                .with_header(wire::ACCEPT, mime)
                .with_header("connection", "close");
            session.write(&request).await?;
            let response = session
                .read()
                .await?
                .ok_or_else(|| Error::Transport("connection closed before response".into()))?;
            let _ = session.close().await;
            match response.status {
                200 => Ok(response.body),
                404 => Err(Error::NotFound),
                500 => Err(Error::ServerError {
                    reason: response.reason.unwrap_or_default(),
                }),
                other => Err(Error::UnknownStatus(other)),
            }
        })
    }
}
