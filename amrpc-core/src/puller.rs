//! Client-side subscriber: opens a stream with a sub-protocol header
//! indicating the desired wire form, then runs a read-loop on the executor
//! that tears itself down the moment its owning `Puller` handle is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::transport::{self, Envelope};
use crate::wire::{self, WireForm};

const HANDLER_LATENCY_WARN: Duration = Duration::from_millis(50);

/// Client-side handle for a single subscription. Dropping it stops the
/// read-loop at its next iteration, cancelling an in-flight read rather
/// than waiting for the peer to send another frame.
pub struct Puller {
    alive: Arc<AtomicBool>,
    cancel: Arc<Notify>,
}

impl Puller {
    /// Open a stream to `method` on `uri`, announcing `wire_form` via the
    /// subscribe sub-protocol, and spawn a read-loop invoking `handler` with
    /// each decoded message (or the terminal error) until the subscription
    /// ends.
    pub fn create<F>(
        uri: &str,
        method: &str,
        wire_form: WireForm,
        executor: Arc<Executor>,
        handler: F,
    ) -> Result<Arc<Puller>>
    where
        F: Fn(Result<Vec<u8>>) + Send + Sync + 'static,
    {
        let uri = uri.to_string();
        let method = method.to_string();

        let mut session = executor.submit(async move {
            let mut session = transport::connect(&uri).await?;
            let request = Envelope::request(method.clone(), Vec::new())
                .with_header(wire::WS_SUBPROTOCOL_HEADER, wire_form.as_subprotocol());
            session.write(&request).await?;
            let response = session
                .read()
                .await?
                .ok_or_else(|| Error::Transport("connection closed before upgrade".into()))?;
            if response.status != 101 {
                return Err(if response.status == 404 {
                    Error::NotFound
                } else {
                    Error::UnknownStatus(response.status)
                });
            }
            Ok(session)
        })?;

        let alive = Arc::new(AtomicBool::new(true));
        let cancel = Arc::new(Notify::new());
        let puller = Arc::new(Puller {
            alive: alive.clone(),
            cancel: cancel.clone(),
        });
        let weak: Weak<Puller> = Arc::downgrade(&puller);

        executor.spawn(async move {
            loop {
                let strong = match weak.upgrade() {
                    Some(s) => s,
                    None => break,
                };
                if !strong.alive.load(Ordering::SeqCst) {
                    break;
                }
                drop(strong);

                let started = Instant::now();
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.notified() => break,
                    outcome = session.read() => outcome,
                };
                match outcome {
                    Ok(Some(envelope)) => {
                        handler(Ok(envelope.body));
                    }
                    Ok(None) => {
                        handler(Err(Error::Transport("server closed".into())));
                        break;
                    }
                    Err(e) => {
                        handler(Err(e));
                        break;
                    }
                }
                if started.elapsed() > HANDLER_LATENCY_WARN {
                    tracing::warn!(elapsed_ms = started.elapsed().as_millis(), "amrpc puller handler exceeded 50ms");
                }
            }
            let _ = session.close().await;
        });

        Ok(puller)
    }
}

impl Drop for Puller {
    /// Flips `alive` for the pre-read liveness check and wakes a cancel
    /// signal the read loop selects against, so an in-flight `session.read()`
    /// is interrupted immediately instead of waiting for the peer to send
    /// another frame (or never returning, if it doesn't).
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.cancel.notify_one();
    }
}
