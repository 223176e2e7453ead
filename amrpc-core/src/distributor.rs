//! Per-publish-endpoint fanout: bounded per-subscriber queues, a writer task
//! per subscriber, overflow eviction, and the membership signal.
//!
//! The original keeps each subscriber context alive via a shared pointer
//! held by the signal slot and observed weakly by the writer fiber; dropping
//! the strong reference on overflow is what tears the writer down. Rust's
//! ownership model makes that exact shared/weak dance awkward to replicate
//! faithfully, so this follows the redesign flagged for "shared-ownership
//! graphs": an arena of subscriber records keyed by an id, with eviction
//! implemented as explicit removal plus a flag the writer task observes.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::data::Data;
use crate::executor::Executor;
use crate::info::EndpointInfo;
use crate::transport::{Envelope, Session};
use crate::wire::WireForm;

struct SubscriberEntry {
    wire_form: WireForm,
    peer: String,
    queue: Mutex<VecDeque<Arc<Data>>>,
    notify: Notify,
    evicted: AtomicBool,
}

impl SubscriberEntry {
    /// Append `data`; returns true if the queue has now reached the
    /// distributor's high watermark and this subscriber should be evicted.
    fn push(&self, data: Arc<Data>, high_watermark: usize) -> bool {
        let mut queue = self.queue.lock().unwrap();
        queue.push_back(data);
        queue.len() >= high_watermark
    }

    fn pop(&self) -> Option<Arc<Data>> {
        self.queue.lock().unwrap().pop_front()
    }
}

pub struct Distributor {
    info: EndpointInfo,
    /// Stored as the caller's requested size + 1, per the original's
    /// off-by-one (`Distributor(Info&&, unsigned sz) : queue_size_(++sz)`).
    high_watermark: usize,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, Arc<SubscriberEntry>>>,
}

impl Distributor {
    pub fn new(info: EndpointInfo, queue_size: usize) -> Self {
        Distributor {
            info,
            high_watermark: queue_size + 1,
            next_id: AtomicU64::new(0),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn info(&self) -> &EndpointInfo {
        &self.info
    }

    pub fn puller_size(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Admit a subscriber and spawn its writer task on `executor`.
    pub fn add_client(self: &Arc<Self>, wire_form: WireForm, peer: String, session: Session, executor: &Executor) {
        let entry = Arc::new(SubscriberEntry {
            wire_form,
            peer,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            evicted: AtomicBool::new(false),
        });
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().unwrap().insert(id, entry.clone());

        let distributor = self.clone();
        executor.spawn(async move {
            distributor.run_writer(id, entry, session).await;
        });
    }

    async fn run_writer(self: Arc<Self>, id: u64, entry: Arc<SubscriberEntry>, mut session: Session) {
        loop {
            if entry.evicted.load(Ordering::SeqCst) {
                break;
            }

            while let Some(data) = entry.pop() {
                let bytes = match data.view(entry.wire_form) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(peer = %entry.peer, error = %e, "distributor: view failed for subscriber payload");
                        continue;
                    }
                };
                let envelope = Envelope::ok(bytes.to_vec());
                if session.write(&envelope).await.is_err() {
                    self.remove(id);
                    let _ = session.close().await;
                    return;
                }
            }

            // Opportunistically poll for peer activity/close without
            // blocking the loop: any frame from the peer, or EOF, ends the
            // subscription (mirrors "if the read-control future has fired").
            match tokio::time::timeout(Duration::from_millis(1), session.read()).await {
                Ok(Ok(None)) | Ok(Err(_)) => {
                    self.remove(id);
                    break;
                }
                Ok(Ok(Some(_))) => {
                    // a Puller never sends frames after subscribing; receiving
                    // one is treated the same as a close signal.
                    self.remove(id);
                    break;
                }
                Err(_elapsed) => {}
            }

            entry.notify.notified().await;
        }
        let _ = session.close().await;
    }

    fn remove(&self, id: u64) {
        self.subscribers.lock().unwrap().remove(&id);
    }

    /// Evict every current subscriber. Each writer task observes `evicted`
    /// at its next wakeup, closes its session, and exits -- the same path
    /// a single slow-consumer eviction takes. Called when the owning
    /// `Server` is dropped so in-flight Pullers see their subscription end
    /// rather than hang forever.
    pub fn shutdown(&self) {
        let subs = self.subscribers.lock().unwrap();
        for entry in subs.values() {
            entry.evicted.store(true, Ordering::SeqCst);
            entry.notify.notify_one();
        }
    }

    /// Fan a message out to every current subscriber, evicting any whose
    /// queue has now reached the high watermark.
    pub fn update(&self, wire_form: WireForm, bytes: bytes::Bytes) {
        let mut subs = self.subscribers.lock().unwrap();
        if subs.is_empty() {
            return;
        }
        let data = Arc::new(Data::new(wire_form, bytes));

        #[cfg(debug_assertions)]
        {
            if let Err(e) = data.view(wire_form) {
                panic!(
                    "can not convert data {:?} to {:?}: {}",
                    wire_form, wire_form, e
                );
            }
        }

        subs.retain(|_, entry| {
            let overflowed = entry.push(data.clone(), self.high_watermark);
            entry.notify.notify_one();
            if overflowed {
                entry.evicted.store(true, Ordering::SeqCst);
            }
            !overflowed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> EndpointInfo {
        EndpointInfo {
            wire_form: WireForm::Text,
            method: "/test".to_string(),
            func_name: "test".to_string(),
        }
    }

    #[test]
    fn update_on_empty_distributor_is_a_no_op() {
        let d = Distributor::new(info(), 4);
        d.update(WireForm::Text, bytes::Bytes::from_static(b"\"x\""));
        assert_eq!(d.puller_size(), 0);
    }

    #[test]
    fn high_watermark_is_queue_size_plus_one() {
        let d = Distributor::new(info(), 3);
        assert_eq!(d.high_watermark, 4);
    }
}
