//! Server front door: transport-level listener, the RPC and Publish
//! registration tables, the per-request dispatch algorithm, and the
//! `/debug/reflection` introspection endpoint.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::config::ServerConfig;
use crate::data::Data;
use crate::distributor::Distributor;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::info::EndpointInfo;
use crate::transport::{self, Envelope, Listener, Session};
use crate::wire::{self, WireForm};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A registered RPC handler, already adapted to operate purely in bytes, in
/// its endpoint's declared wire form.
pub type RawRpcFn = Arc<dyn Fn(Vec<u8>) -> BoxFuture<Result<Vec<u8>>> + Send + Sync>;

const DEBUG_REFLECTION_METHOD: &str = "/debug/reflection";
/// Diagnostic-only threshold; exceeding it logs a warning but never cancels
/// the callback (matches the original's `DTIMEOUT_ASSERT`).
const CALLBACK_LATENCY_WARN: Duration = Duration::from_millis(50);

pub struct Server {
    config: ServerConfig,
    executor: Arc<Executor>,
    rpc_table: Mutex<HashMap<String, (EndpointInfo, RawRpcFn)>>,
    publish_table: Mutex<HashMap<String, Arc<Distributor>>>,
}

impl Server {
    /// Bind to a transport URI and start accepting connections.
    pub fn bind(uri: &str, config: ServerConfig) -> Result<Arc<Server>> {
        let executor = Executor::new(&config.thread_name)?;
        let uri = uri.to_string();
        let listener = executor.submit(async move { transport::bind(&uri).await })?;

        let server = Arc::new(Server {
            config,
            executor,
            rpc_table: Mutex::new(HashMap::new()),
            publish_table: Mutex::new(HashMap::new()),
        });

        let weak_server = Arc::downgrade(&server);
        server.executor.spawn(async move {
            Server::accept_loop(weak_server, listener).await;
        });

        Ok(server)
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    /// Register a raw RPC handler. Duplicate `method` registrations are
    /// rejected, whether the clash is with another RPC or with a Publish
    /// endpoint already registered under the same path -- `method` is
    /// unique within a Server across both tables.
    pub fn add_rpc_raw(
        &self,
        method: &str,
        wire_form: WireForm,
        func_name: &str,
        callback: RawRpcFn,
    ) -> Result<()> {
        let mut rpc_table = self.rpc_table.lock().unwrap();
        if rpc_table.contains_key(method) || self.publish_table.lock().unwrap().contains_key(method) {
            return Err(Error::Transport(format!(
                "method already registered: {method}"
            )));
        }
        let info = EndpointInfo {
            wire_form,
            method: method.to_string(),
            func_name: func_name.to_string(),
        };
        rpc_table.insert(method.to_string(), (info, callback));
        Ok(())
    }

    /// Register a Publish endpoint. A second call for an already-present
    /// Publish method is a no-op, per the idempotent registration contract;
    /// a method already registered as an RPC is rejected.
    pub fn add_publish_raw(
        &self,
        method: &str,
        wire_form: WireForm,
        func_name: &str,
        queue_size: usize,
    ) -> Result<()> {
        if self.rpc_table.lock().unwrap().contains_key(method) {
            return Err(Error::Transport(format!(
                "method already registered: {method}"
            )));
        }
        let mut table = self.publish_table.lock().unwrap();
        if !table.contains_key(method) {
            let info = EndpointInfo {
                wire_form,
                method: method.to_string(),
                func_name: func_name.to_string(),
            };
            table.insert(method.to_string(), Arc::new(Distributor::new(info, queue_size)));
        }
        Ok(())
    }

    /// Post a message to a Publish endpoint's subscribers. Succeeds whether
    /// or not any subscribers (or even the method) exist.
    pub fn publish_raw(&self, method: &str, bytes: Bytes) -> Result<()> {
        let table = self.publish_table.lock().unwrap();
        if let Some(distributor) = table.get(method) {
            let wire_form = distributor.info().wire_form;
            distributor.update(wire_form, bytes);
        }
        Ok(())
    }

    /// Remove an RPC or Publish registration.
    pub fn del(&self, method: &str) -> Result<()> {
        self.rpc_table.lock().unwrap().remove(method);
        self.publish_table.lock().unwrap().remove(method);
        Ok(())
    }

    pub fn puller_size(&self, method: &str) -> usize {
        self.publish_table
            .lock()
            .unwrap()
            .get(method)
            .map(|d| d.puller_size())
            .unwrap_or(0)
    }

    /// Holds only a weak reference to `Server` so the accept loop never
    /// keeps the server alive on its own -- dropping the caller's last
    /// `Arc<Server>` must actually tear the server down.
    async fn accept_loop(weak: Weak<Server>, listener: Listener) {
        loop {
            match listener.accept().await {
                Ok(session) => {
                    let server = match weak.upgrade() {
                        Some(s) => s,
                        None => break,
                    };
                    tokio::spawn(async move {
                        server.handle_connection(session).await;
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "amrpc server: accept failed, stopping");
                    break;
                }
            }
        }
    }

    async fn handle_connection(self: Arc<Self>, mut session: Session) {
        let request = match session.read().await {
            Ok(Some(req)) => req,
            Ok(None) => return,
            Err(e) => {
                tracing::debug!(error = %e, "amrpc server: failed to read request");
                return;
            }
        };

        if request.header(wire::WS_SUBPROTOCOL_HEADER).is_some() {
            self.handle_subscribe(session, request).await;
            return;
        }

        if request.method.as_deref() == Some(DEBUG_REFLECTION_METHOD) && self.config.debug_enabled {
            let body = self.debug_reflection_json();
            let _ = session.write(&Envelope::ok(body)).await;
            let _ = session.close().await;
            return;
        }

        let response = self.dispatch_rpc(request).await;
        let _ = session.write(&response).await;
        let _ = session.close().await;
    }

    /// The seven-step RPC dispatch algorithm.
    async fn dispatch_rpc(&self, request: Envelope) -> Envelope {
        let method = request.method.clone().unwrap_or_default();

        // Step 1: liveness probe.
        if request.header(wire::CHECK_ENABLED).is_some() {
            return if self.rpc_table.lock().unwrap().contains_key(&method) {
                Envelope::ok(Vec::new())
            } else {
                Envelope::error(404, "remote method not found")
            };
        }

        let (info, callback) = {
            let table = self.rpc_table.lock().unwrap();
            match table.get(&method) {
                Some((info, cb)) => (info.clone(), cb.clone()),
                None => return Envelope::error(404, "remote method not found"),
            }
        };

        // Steps 2-3: content negotiation.
        let req_type = request
            .header(wire::CONTENT_TYPE)
            .map(WireForm::from_mime)
            .unwrap_or(WireForm::Bin);
        // Missing Accept defaults to empty, not the handler's own wire
        // form: `WireForm::from_mime("")` resolves to `Bin`, matching the
        // original's `find_or(message.headers, ACCEPT, "")` lookup.
        let res_type_string = request
            .header(wire::ACCEPT)
            .map(str::to_string)
            .unwrap_or_default();
        let res_type = WireForm::from_mime(&res_type_string);

        // Step 4: convert request body into the handler's wire form.
        let request_data = Data::new(req_type, request.body);
        let handler_bytes = match request_data.view(info.wire_form) {
            Ok(bytes) => bytes,
            Err(e) => return Envelope::error(500, e.to_string()),
        };

        // Step 5: invoke the callback, with a diagnostic-only latency check.
        let started = Instant::now();
        let result = callback(handler_bytes.to_vec()).await;
        if started.elapsed() > CALLBACK_LATENCY_WARN {
            tracing::warn!(method = %info.method, elapsed_ms = started.elapsed().as_millis(), "amrpc rpc callback exceeded 50ms");
        }
        let out_bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => return Envelope::error(500, e.to_string()),
        };

        // Step 6: convert the callback result into the requested Accept type.
        let response_data = Data::new(info.wire_form, out_bytes);
        let res_bytes = match response_data.view(res_type) {
            Ok(bytes) => bytes,
            Err(e) => return Envelope::error(500, e.to_string()),
        };

        // Step 7: respond.
        Envelope::ok(res_bytes.to_vec()).with_header(wire::CONTENT_TYPE, res_type_string)
    }

    async fn handle_subscribe(self: Arc<Self>, mut session: Session, request: Envelope) {
        let method = request.method.clone().unwrap_or_default();
        let subprotocol = request
            .header(wire::WS_SUBPROTOCOL_HEADER)
            .unwrap_or_default();
        let wire_form = WireForm::from_subprotocol(subprotocol);

        let distributor = self.publish_table.lock().unwrap().get(&method).cloned();
        let distributor = match distributor {
            Some(d) => d,
            None => {
                let _ = session
                    .write(&Envelope::error(404, "remote method not found"))
                    .await;
                return;
            }
        };

        let mut response = Envelope::ok(Vec::new())
            .with_header(wire::WS_SUBPROTOCOL_HEADER, wire_form.as_subprotocol())
            .with_header(wire::ACCEPT, wire_form.as_mime());
        response.status = 101;

        if session.write(&response).await.is_err() {
            return;
        }

        distributor.add_client(wire_form, "unknown".to_string(), session, &self.executor);
    }

    fn debug_reflection_json(&self) -> Vec<u8> {
        let rpc: HashMap<String, String> = self
            .rpc_table
            .lock()
            .unwrap()
            .iter()
            .map(|(method, (info, _))| (method.clone(), info.func_name.clone()))
            .collect();
        let publish: HashMap<String, String> = self
            .publish_table
            .lock()
            .unwrap()
            .iter()
            .map(|(method, distributor)| (method.clone(), distributor.info().func_name.clone()))
            .collect();
        serde_json::to_vec(&serde_json::json!({ "rpc": rpc, "publish": publish }))
            .unwrap_or_default()
    }
}

impl Drop for Server {
    /// Evict every Publish subscriber so in-flight Pullers observe the
    /// subscription ending instead of hanging forever once this server is
    /// gone.
    fn drop(&mut self) {
        let table = self.publish_table.lock().unwrap();
        for distributor in table.values() {
            distributor.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_reflection_lists_registered_methods() {
        let server = Server::bind("ipc://amrpc-test-reflection", ServerConfig::default()).unwrap();
        let callback: RawRpcFn = Arc::new(|bytes| Box::pin(async move { Ok(bytes) }));
        server
            .add_rpc_raw("/echo", WireForm::Bin, "echo", callback)
            .unwrap();
        server
            .add_publish_raw("/chat", WireForm::Text, "chat", 8)
            .unwrap();

        let body = server.debug_reflection_json();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["rpc"]["/echo"], "echo");
        assert_eq!(json["publish"]["/chat"], "chat");
    }

    #[test]
    fn duplicate_rpc_registration_is_rejected() {
        let server = Server::bind("ipc://amrpc-test-dup", ServerConfig::default()).unwrap();
        let callback: RawRpcFn = Arc::new(|bytes| Box::pin(async move { Ok(bytes) }));
        server
            .add_rpc_raw("/dup", WireForm::Bin, "dup", callback.clone())
            .unwrap();
        assert!(server.add_rpc_raw("/dup", WireForm::Bin, "dup", callback).is_err());
    }

    #[test]
    fn publish_for_unknown_method_is_a_no_op_success() {
        let server = Server::bind("ipc://amrpc-test-nopublish", ServerConfig::default()).unwrap();
        assert!(server.publish_raw("/nowhere", Bytes::from_static(b"x")).is_ok());
    }

    #[test]
    fn method_is_unique_across_rpc_and_publish_tables() {
        let server = Server::bind("ipc://amrpc-test-cross-table", ServerConfig::default()).unwrap();
        let callback: RawRpcFn = Arc::new(|bytes| Box::pin(async move { Ok(bytes) }));

        server
            .add_publish_raw("/shared", WireForm::Text, "shared", 8)
            .unwrap();
        assert!(server
            .add_rpc_raw("/shared", WireForm::Bin, "shared", callback.clone())
            .is_err());

        server
            .add_rpc_raw("/other", WireForm::Bin, "other", callback)
            .unwrap();
        assert!(server
            .add_publish_raw("/other", WireForm::Text, "other", 8)
            .is_err());
    }
}
