//! Event dispatcher.
//!
//! Callbacks are registered per event name and run off the async runtime: a
//! fixed pool of worker tasks drains a bounded queue and hands each callback
//! to Tokio's blocking pool, so a callback that sleeps or blocks ties up one
//! worker slot and nothing else. `emit` never waits: when the queue is full
//! the job is dropped and logged, so a stalled subscriber cannot back up the
//! read loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ws::{DispatchedEvent, Event};

/// A subscriber callback.
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

struct Job {
    name: String,
    callback: Callback,
    event: Arc<Event>,
}

/// Worker tasks, spawned on the first emit that runs inside a runtime.
struct WorkerPool {
    size: usize,
    pending: Option<mpsc::Receiver<Job>>,
    handles: Vec<JoinHandle<()>>,
}

pub struct Dispatcher {
    handlers: RwLock<HashMap<String, Vec<Callback>>>,
    streams: Mutex<Vec<mpsc::Sender<DispatchedEvent>>>,
    jobs: mpsc::Sender<Job>,
    pool: Mutex<WorkerPool>,
    dropped: AtomicU64,
}

impl Dispatcher {
    /// Dispatcher with `workers` concurrent callbacks and a queue of
    /// `queue_capacity` jobs.
    ///
    /// Does not need a runtime: workers start on the first `emit` made from
    /// inside one, and jobs queued before that are kept.
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let (jobs, rx) = mpsc::channel(queue_capacity.max(1));

        Self {
            handlers: RwLock::new(HashMap::new()),
            streams: Mutex::new(Vec::new()),
            jobs,
            pool: Mutex::new(WorkerPool {
                size: workers.max(1),
                pending: Some(rx),
                handles: Vec::new(),
            }),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a callback for `name`. Registrations are append-only.
    pub fn on<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!("Registered callback for '{}'", name);
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name)
            .or_default()
            .push(Arc::new(callback));
    }

    pub fn has_subscribers(&self, name: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .is_some_and(|callbacks| !callbacks.is_empty())
    }

    /// Queue every callback registered for `name` and publish to open streams.
    pub fn emit(&self, name: &str, event: impl Into<Arc<Event>>) {
        let event = event.into();
        self.publish(name, &event);
        self.start_workers();

        let callbacks = match self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            Some(callbacks) => callbacks.clone(),
            None => return,
        };

        for callback in callbacks {
            let job = Job {
                name: name.to_string(),
                callback,
                event: Arc::clone(&event),
            };
            match self.jobs.try_send(job) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Dispatch queue full, dropping '{}' callback", name);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!("Dispatcher stopped, dropping '{}' callback", name);
                }
            }
        }
    }

    /// Open a new event stream receiving every emitted event.
    pub fn subscribe_stream(&self, capacity: usize) -> mpsc::Receiver<DispatchedEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Callbacks dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn start_workers(&self) {
        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if pool.pending.is_none() {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!("No runtime yet, dispatch jobs stay queued");
            return;
        };
        let Some(rx) = pool.pending.take() else {
            return;
        };

        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        pool.handles = (0..pool.size)
            .map(|id| runtime.spawn(worker(id, Arc::clone(&rx))))
            .collect();
        tracing::debug!("Started {} dispatch workers", pool.size);
    }

    fn publish(&self, name: &str, event: &Arc<Event>) {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        if streams.is_empty() {
            return;
        }

        streams.retain(|tx| {
            let item = DispatchedEvent {
                name: name.to_string(),
                event: Arc::clone(event),
            };
            match tx.try_send(item) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!("Event stream full, dropping '{}'", name);
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let pool = self.pool.get_mut().unwrap_or_else(PoisonError::into_inner);
        for handle in &pool.handles {
            handle.abort();
        }
    }
}

async fn worker(id: usize, jobs: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = {
            let mut rx = jobs.lock().await;
            rx.recv().await
        };
        let Some(Job {
            name,
            callback,
            event,
        }) = job
        else {
            tracing::debug!("Dispatch worker {} exiting", id);
            return;
        };

        // One callback in flight per worker.
        let run = tokio::task::spawn_blocking(move || callback(&event));
        if let Err(e) = run.await {
            if e.is_panic() {
                tracing::error!("Callback for '{}' panicked on worker {}", name, id);
            } else {
                tracing::debug!("Callback for '{}' cancelled: {}", name, e);
            }
        }
    }
}
