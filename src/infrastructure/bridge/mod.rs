//! Bridge - the single execution context for native calls
//!
//! The legacy ABI is not reentrant, so every call into a module (lifecycle,
//! events, menus, outbound polling) runs on one dedicated thread, one job at a
//! time, in submission order.

pub mod pump;
pub mod queue;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::application::errors::HostError;
use crate::domain::entities::OutboundAction;
use crate::domain::traits::ActionSource;

pub use pump::{deliver, PumpHandle};
pub use queue::{ActionQueue, ActionSender};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Upper bound on actions moved per poll
pub const MAX_POLL_BATCH: usize = 256;

/// Handle to the native worker. Cheap to clone; all clones share one worker.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

struct Inner {
    jobs: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    queue: ActionQueue,
    upstream: RwLock<Option<Arc<dyn ActionSource>>>,
    call_timeout: Duration,
    shut_down: AtomicBool,
}

impl Inner {
    fn drain_outbound(&self, max: usize) -> Vec<OutboundAction> {
        let mut actions = Vec::new();
        let upstream = self.upstream.read().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(upstream) = upstream {
            actions.extend(upstream.drain(max));
        }
        if actions.len() < max {
            actions.extend(self.queue.drain(max - actions.len()));
        }
        actions
    }

    fn close_outbound(&self) -> Vec<OutboundAction> {
        let upstream = self.upstream.read().unwrap_or_else(|e| e.into_inner()).clone();
        let mut actions = Vec::new();
        if let Some(upstream) = upstream {
            actions.extend(upstream.drain(usize::MAX));
            upstream.close();
        }
        self.queue.close();
        actions.extend(self.queue.drain(usize::MAX));
        actions
    }
}

/// A submitted native call whose result has not been collected yet
pub struct PendingCall<T> {
    operation: String,
    rx: oneshot::Receiver<Result<T, String>>,
    timeout: Duration,
}

impl<T> PendingCall<T> {
    pub async fn wait(self) -> Result<T, HostError> {
        match tokio::time::timeout(self.timeout, self.rx).await {
            Err(_) => Err(HostError::Timeout {
                operation: self.operation,
                timeout: self.timeout,
            }),
            Ok(Err(_)) => Err(HostError::BridgeClosed),
            Ok(Ok(Err(reason))) => Err(HostError::Crashed {
                operation: self.operation,
                reason,
            }),
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }
}

impl Bridge {
    /// Start the native worker thread
    pub fn new(call_timeout: Duration, queue_capacity: usize) -> Result<Self, HostError> {
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let worker = std::thread::Builder::new()
            .name("native-main".to_string())
            .spawn(move || run_worker(rx))?;

        Ok(Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(Some(tx)),
                worker: Mutex::new(Some(worker)),
                queue: ActionQueue::new(queue_capacity),
                upstream: RwLock::new(None),
                call_timeout,
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    /// Also poll `source` (the primary bridge library) on every pump tick
    pub fn attach_upstream(&self, source: Arc<dyn ActionSource>) {
        *self.inner.upstream.write().unwrap_or_else(|e| e.into_inner()) = Some(source);
    }

    /// Producer handle for the outbound action queue
    pub fn action_sender(&self) -> ActionSender {
        self.inner.queue.sender()
    }

    pub fn call_timeout(&self) -> Duration {
        self.inner.call_timeout
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Queue `f` on the native worker without waiting for it.
    ///
    /// Submission order is execution order, so callers that need ordering
    /// must submit in that order.
    pub fn submit<F, T>(&self, operation: impl Into<String>, f: F) -> Result<PendingCall<T>, HostError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message);
            let _ = tx.send(result);
        });

        let jobs = self.inner.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let sender = jobs.as_ref().ok_or(HostError::BridgeClosed)?;
        sender.send(job).map_err(|_| HostError::BridgeClosed)?;

        Ok(PendingCall {
            operation: operation.into(),
            rx,
            timeout: self.inner.call_timeout,
        })
    }

    /// Run `f` on the native worker and wait for its result
    pub async fn call<F, T>(&self, operation: impl Into<String>, f: F) -> Result<T, HostError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit(operation, f)?.wait().await
    }

    /// Drain pending outbound actions on the native worker
    pub async fn poll_outbound(&self) -> Result<Vec<OutboundAction>, HostError> {
        let inner = self.inner.clone();
        self.call("poll", move || inner.drain_outbound(MAX_POLL_BATCH)).await
    }

    /// Tear down the native call boundary.
    ///
    /// Runs after every plugin is unloaded: closes the outbound queue behind
    /// whatever is already submitted, stops the worker and returns the actions
    /// that were still buffered so the host can deliver them.
    pub async fn shutdown(&self) -> Vec<OutboundAction> {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            tracing::warn!("Bridge shutdown requested more than once");
            return Vec::new();
        }

        let inner = self.inner.clone();
        let (drained, worker_alive) = match self.call("shutdown", move || inner.close_outbound()).await {
            Ok(actions) => (actions, true),
            Err(e) => {
                tracing::warn!("Native worker did not finish shutdown cleanly: {}", e);
                (self.inner.close_outbound(), !matches!(e, HostError::Timeout { .. }))
            }
        };

        let sender = self.inner.jobs.lock().unwrap_or_else(|e| e.into_inner()).take();
        drop(sender);

        let worker = self.inner.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        match worker {
            Some(handle) if worker_alive => {
                if let Ok(Err(_)) = tokio::task::spawn_blocking(move || handle.join()).await {
                    tracing::error!("Native worker panicked");
                }
            }
            Some(_) => tracing::warn!("Leaving hung native worker behind"),
            None => {}
        }

        tracing::info!("Bridge shut down ({} pending actions drained)", drained.len());
        drained
    }
}

fn run_worker(mut rx: mpsc::UnboundedReceiver<Job>) {
    tracing::debug!("Native worker started");
    while let Some(job) = rx.blocking_recv() {
        job();
    }
    tracing::debug!("Native worker stopped");
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
