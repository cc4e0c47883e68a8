//! Single-worker FIFO for blocking data-access operations.
//!
//! Submitting never blocks on I/O: operations are appended under a short lock
//! and picked up by one long-lived worker thread, which runs them strictly in
//! submission order. Each finished operation is reported exactly once through
//! the outcome handler, on the worker thread.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, ErrorCategory, Result};
use crate::logging::OperationTimer;

type Job<T> = Box<dyn FnOnce() -> Result<T> + Send + 'static>;

struct PendingOperation<T> {
    name: String,
    job: Job<T>,
}

/// Completion or failure of one queued operation.
#[derive(Debug)]
pub enum OperationOutcome<T> {
    Completed { name: String, result: T },
    Failed { name: String, message: String, category: ErrorCategory },
}

impl<T> OperationOutcome<T> {
    pub fn name(&self) -> &str {
        match self {
            OperationOutcome::Completed { name, .. } | OperationOutcome::Failed { name, .. } => {
                name
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, OperationOutcome::Completed { .. })
    }
}

struct QueueState<T> {
    pending: VecDeque<PendingOperation<T>>,
    running: Option<String>,
    shutdown: bool,
}

struct Shared<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
    idle: Condvar,
}

/// Cloneable submit side of an [`OperationQueue`].
///
/// Outcome handlers receive one so they can enqueue follow-up operations.
pub struct QueueHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for QueueHandle<T> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone() }
    }
}

impl<T: Send + 'static> QueueHandle<T> {
    /// Append an operation. Returns `false` if the queue has shut down.
    pub fn submit<F>(&self, name: impl Into<String>, operation: F) -> bool
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let name = name.into();
        let mut state = self.shared.state.lock();
        if state.shutdown {
            log::warn!("Operation queue is shut down, dropping operation: {name}");
            return false;
        }
        log::debug!("Queued operation: {name}");
        state.pending.push_back(PendingOperation { name, job: Box::new(operation) });
        self.shared.available.notify_one();
        true
    }

    /// Number of operations waiting to start.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Name of the operation currently running, if any.
    pub fn current_operation(&self) -> Option<String> {
        self.shared.state.lock().running.clone()
    }

    pub fn is_idle(&self) -> bool {
        let state = self.shared.state.lock();
        state.pending.is_empty() && state.running.is_none()
    }

    /// Drop operations that have not started. The running one is unaffected.
    pub fn clear_pending(&self) -> usize {
        let mut state = self.shared.state.lock();
        let cleared = state.pending.len();
        state.pending.clear();
        if cleared > 0 {
            log::info!("Cleared {cleared} pending operations");
        }
        if state.running.is_none() {
            self.shared.idle.notify_all();
        }
        cleared
    }

    /// Block until nothing is pending or running, or `timeout` passes.
    /// Returns whether the queue went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while !state.pending.is_empty() || state.running.is_some() {
            if self.shared.idle.wait_until(&mut state, deadline).timed_out() {
                return state.pending.is_empty() && state.running.is_none();
            }
        }
        true
    }
}

/// Owns the worker thread. Dropping the queue lets queued operations finish,
/// then joins the worker.
pub struct OperationQueue<T: Send + 'static> {
    handle: QueueHandle<T>,
    worker: Option<thread::JoinHandle<()>>,
}

impl<T: Send + 'static> OperationQueue<T> {
    /// Start the worker. `on_outcome` runs on the worker after every operation.
    pub fn new<F>(on_outcome: F) -> Result<Self>
    where
        F: Fn(OperationOutcome<T>, &QueueHandle<T>) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                running: None,
                shutdown: false,
            }),
            available: Condvar::new(),
            idle: Condvar::new(),
        });
        let handle = QueueHandle { shared };

        let worker = thread::Builder::new()
            .name("docscope-db-worker".to_string())
            .spawn({
                let handle = handle.clone();
                move || run_worker(handle, on_outcome)
            })
            .map_err(Error::from)?;

        Ok(Self { handle, worker: Some(worker) })
    }

    pub fn handle(&self) -> QueueHandle<T> {
        self.handle.clone()
    }

    pub fn submit<F>(&self, name: impl Into<String>, operation: F) -> bool
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.handle.submit(name, operation)
    }

    pub fn pending(&self) -> usize {
        self.handle.pending()
    }

    pub fn current_operation(&self) -> Option<String> {
        self.handle.current_operation()
    }

    pub fn is_idle(&self) -> bool {
        self.handle.is_idle()
    }

    pub fn clear_pending(&self) -> usize {
        self.handle.clear_pending()
    }

    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.handle.wait_idle(timeout)
    }

    /// Stop accepting work, let queued operations finish, and join the worker.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.handle.shared.state.lock();
            state.shutdown = true;
            self.handle.shared.available.notify_all();
        }
        if let Some(worker) = self.worker.take()
            && worker.thread().id() != thread::current().id()
        {
            let _ = worker.join();
        }
    }
}

impl<T: Send + 'static> Drop for OperationQueue<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<T, F>(handle: QueueHandle<T>, on_outcome: F)
where
    T: Send + 'static,
    F: Fn(OperationOutcome<T>, &QueueHandle<T>),
{
    let shared = &handle.shared;
    loop {
        let PendingOperation { name, job } = {
            let mut state = shared.state.lock();
            loop {
                if let Some(operation) = state.pending.pop_front() {
                    state.running = Some(operation.name.clone());
                    break operation;
                }
                if state.shutdown {
                    return;
                }
                shared.idle.notify_all();
                shared.available.wait(&mut state);
            }
        };

        let timer = OperationTimer::start(name.as_str());
        let outcome = match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(result) => {
                timer.finish(&result);
                match result {
                    Ok(result) => OperationOutcome::Completed { name: name.clone(), result },
                    Err(err) => OperationOutcome::Failed {
                        name: name.clone(),
                        message: format!("Operation {name} failed: {err}"),
                        category: err.category(),
                    },
                }
            }
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                let message = format!("Operation {name} panicked: {detail}");
                log::error!("{message}");
                OperationOutcome::Failed {
                    name: name.clone(),
                    message,
                    category: ErrorCategory::Operation,
                }
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(|| on_outcome(outcome, &handle))).is_err() {
            log::error!("Outcome handler panicked for operation {name}");
        }

        let mut state = shared.state.lock();
        state.running = None;
        if state.pending.is_empty() {
            shared.idle.notify_all();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
