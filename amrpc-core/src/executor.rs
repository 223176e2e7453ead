//! The "fiber executor": a dedicated multi-thread Tokio runtime that hosts
//! all dispatch, conversion, writer-loop, and reader-loop work for one
//! `Server` or client handle.
//!
//! Public registration/publish methods that need to run real async I/O
//! call [`Executor::submit`], which blocks the calling thread until the
//! work completes -- the analogue of the original's
//! `addTaskRemoteFuture().get()`. `Handle::block_on` can't implement that
//! directly: it panics if the calling thread is already driving any Tokio
//! runtime (the test harness's runtime, or this very executor's own
//! accept/writer loop calling back into a registered callback), and a
//! Server's own callbacks do exactly that. Instead `submit` hands the
//! future to a dedicated task running on the executor's runtime over an
//! unbounded channel, and blocks on a plain `std::sync::mpsc` reply --
//! a real OS-level block with no Tokio context to trip over.

use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

pub struct Executor {
    runtime: Runtime,
    job_tx: mpsc::UnboundedSender<BoxFuture<()>>,
}

impl Executor {
    pub fn new(thread_name: &str) -> std::io::Result<Arc<Executor>> {
        let runtime = Builder::new_multi_thread()
            .thread_name(thread_name.to_string())
            .enable_all()
            .build()?;

        let (job_tx, mut job_rx) = mpsc::unbounded_channel::<BoxFuture<()>>();
        runtime.spawn(async move {
            while let Some(job) = job_rx.recv().await {
                tokio::spawn(job);
            }
        });

        Ok(Arc::new(Executor { runtime, job_tx }))
    }

    /// Spawn a task on the executor without waiting for it.
    pub fn spawn<F>(&self, fut: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(fut)
    }

    /// Submit work to the executor's own runtime and block the calling
    /// thread until it completes. Safe to call from any thread, including
    /// one already driving this or another Tokio runtime.
    pub fn submit<F>(&self, fut: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (reply_tx, reply_rx) = std_mpsc::channel();
        let job: BoxFuture<()> = Box::pin(async move {
            let result = fut.await;
            let _ = reply_tx.send(result);
        });
        self.job_tx
            .send(job)
            .expect("executor's owning task has stopped");
        reply_rx
            .recv()
            .expect("executor dropped the job before replying")
    }

    pub fn handle(&self) -> tokio::runtime::Handle {
        self.runtime.handle().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_runs_to_completion() {
        let exec = Executor::new("amrpc-test-executor").unwrap();
        let result = exec.submit(async { 1 + 1 });
        assert_eq!(result, 2);
    }

    #[test]
    fn spawn_runs_concurrently() {
        let exec = Executor::new("amrpc-test-executor").unwrap();
        let handle = exec.spawn(async { 41 + 1 });
        let result = exec.submit(handle);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn submit_from_inside_a_running_task_does_not_panic() {
        // Regression: submitting work from a callback that is itself
        // running as a task on this same executor must not deadlock or
        // panic the way `Handle::block_on` would from inside a runtime.
        let exec = Executor::new("amrpc-test-executor-reentrant").unwrap();
        let inner = exec.clone();
        let result = exec.submit(async move { inner.submit(async { 7 }) });
        assert_eq!(result, 7);
    }
}
