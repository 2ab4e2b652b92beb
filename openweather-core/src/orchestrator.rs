//! Asynchronous units of work with serialized completion delivery.
//!
//! Each submitted unit runs on a bounded worker pool. Completion callbacks are
//! never run on the worker: they are queued to a single dispatcher task, which
//! runs them one at a time in arrival order. Callers therefore never observe
//! two callbacks running concurrently.
//!
//! Identical in-flight requests are not coalesced; each unit does its own work.

use parking_lot::Mutex;
use std::{
    collections::HashMap,
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    task::{Context, Poll},
};
use tokio::{
    runtime::Handle,
    sync::{Notify, Semaphore, mpsc, oneshot},
};

use crate::error::WeatherError;

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    Ready,
    Executing,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Cancel,
    Activate,
    Complete,
}

impl UnitState {
    fn next(self, transition: Transition) -> Self {
        match (self, transition) {
            (UnitState::Ready, Transition::Cancel) => UnitState::Cancelled,
            (UnitState::Ready, Transition::Activate) => UnitState::Executing,
            (UnitState::Cancelled, Transition::Activate) => UnitState::Finished,
            (UnitState::Executing, Transition::Complete) => UnitState::Finished,
            (state, _) => state,
        }
    }

    /// No more work will happen for this unit.
    pub fn is_done(&self) -> bool {
        matches!(self, UnitState::Finished | UnitState::Cancelled)
    }
}

#[derive(Debug)]
struct UnitOfWork {
    id: u64,
    state: Mutex<UnitState>,
    cancelled: Notify,
}

impl UnitOfWork {
    fn new(id: u64) -> Self {
        Self { id, state: Mutex::new(UnitState::Ready), cancelled: Notify::new() }
    }

    fn state(&self) -> UnitState {
        *self.state.lock()
    }

    /// Apply `transition` and return the resulting state.
    fn apply(&self, transition: Transition) -> UnitState {
        let mut state = self.state.lock();
        *state = state.next(transition);
        *state
    }

    fn cancel(&self) -> bool {
        let cancelled = self.apply(Transition::Cancel) == UnitState::Cancelled;
        if cancelled {
            // A stored permit wakes the worker even if it is not waiting yet.
            self.cancelled.notify_one();
        }
        cancelled
    }

    /// Returns `true` when the unit should run its work.
    fn activate(&self) -> bool {
        self.apply(Transition::Activate) == UnitState::Executing
    }

    fn complete(&self) {
        self.apply(Transition::Complete);
    }
}

type Delivery = Box<dyn FnOnce() + Send>;

struct Inner {
    runtime: Handle,
    permits: Arc<Semaphore>,
    units: Mutex<HashMap<u64, Arc<UnitOfWork>>>,
    next_id: AtomicU64,
    deliveries: mpsc::UnboundedSender<Delivery>,
    closed: Arc<AtomicBool>,
}

impl Inner {
    fn forget(&self, id: u64) {
        self.units.lock().remove(&id);
    }

    fn deliver(&self, id: u64, delivery: Delivery) {
        self.forget(id);

        if self.closed.load(Ordering::SeqCst) {
            tracing::debug!("Unit {id} finished after shutdown; result dropped");
            return;
        }

        if self.deliveries.send(delivery).is_err() {
            tracing::debug!("Callback dispatcher gone; result of unit {id} dropped");
        }
    }
}

/// Owns the worker pool and the callback dispatcher.
///
/// Dropping the orchestrator shuts it down: units that have not started are
/// cancelled, running units finish but their results are discarded.
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(runtime: Handle, max_concurrency: usize) -> Self {
        let (deliveries, mut queue) = mpsc::unbounded_channel::<Delivery>();
        let closed = Arc::new(AtomicBool::new(false));

        let dispatcher_closed = Arc::clone(&closed);
        runtime.spawn(async move {
            while let Some(delivery) = queue.recv().await {
                if dispatcher_closed.load(Ordering::SeqCst) {
                    tracing::debug!("Dropping queued callback after shutdown");
                    continue;
                }
                delivery();
            }
            tracing::debug!("Callback dispatcher stopped");
        });

        Self {
            inner: Arc::new(Inner {
                runtime,
                permits: Arc::new(Semaphore::new(max_concurrency.clamp(1, Semaphore::MAX_PERMITS))),
                units: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                deliveries,
                closed,
            }),
        }
    }

    /// Schedule `work` and run `callback` with its result on the dispatcher.
    ///
    /// `work` is only invoked if the unit is still ready when a worker slot
    /// frees up. A cancelled unit never invokes `work` or `callback`.
    pub fn submit<T, W, Fut, C>(&self, work: W, callback: C) -> UnitHandle
    where
        T: Send + 'static,
        W: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, WeatherError>> + Send + 'static,
        C: FnOnce(Result<T, WeatherError>) + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let unit = Arc::new(UnitOfWork::new(id));
        let handle = UnitHandle { unit: Arc::clone(&unit) };

        {
            let mut units = self.inner.units.lock();
            if self.inner.closed.load(Ordering::SeqCst) {
                unit.cancel();
                unit.activate();
                tracing::debug!("Unit {id} submitted after shutdown; dropped");
                return handle;
            }
            units.insert(id, Arc::clone(&unit));
        }

        let permits = Arc::clone(&self.inner.permits);
        let owner = Arc::downgrade(&self.inner);

        self.inner.runtime.spawn(async move {
            // Wait for a worker slot unless the unit is cancelled first. The
            // semaphore is closed on shutdown.
            let permit = tokio::select! {
                permit = permits.acquire_owned() => permit.ok(),
                _ = unit.cancelled.notified() => None,
            };
            if permit.is_none() {
                unit.cancel();
            }

            if !unit.activate() {
                tracing::debug!("Unit {id} cancelled before start");
                if let Some(inner) = owner.upgrade() {
                    inner.forget(id);
                }
                return;
            }

            tracing::debug!("Unit {id} executing");
            let result = work().await;
            unit.complete();
            drop(permit);

            deliver_or_drop(&owner, id, Box::new(move || callback(result)));
        });

        handle
    }

    /// Like [`Orchestrator::submit`], but hands the result back through a future.
    pub fn submit_future<T, W, Fut>(&self, work: W) -> FetchHandle<T>
    where
        T: Send + 'static,
        W: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, WeatherError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let unit = self.submit(work, move |result| {
            // The receiver may have been dropped; nobody is waiting then.
            let _ = tx.send(result);
        });

        FetchHandle { unit, rx }
    }

    /// Cancel every unit that has not started and stop delivering results.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let units: Vec<_> = self.inner.units.lock().values().cloned().collect();
        let cancelled = units.iter().filter(|unit| unit.cancel()).count();
        self.inner.permits.close();

        tracing::debug!("Orchestrator shut down; cancelled {cancelled} pending units");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Units submitted but not yet finished.
    pub fn pending(&self) -> usize {
        self.inner.units.lock().len()
    }
}

fn deliver_or_drop(owner: &Weak<Inner>, id: u64, delivery: Delivery) {
    match owner.upgrade() {
        Some(inner) => inner.deliver(id, delivery),
        None => tracing::debug!("Unit {id} outlived its orchestrator; result dropped"),
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pending", &self.pending())
            .field("available_workers", &self.inner.permits.available_permits())
            .field("closed", &self.is_shut_down())
            .finish()
    }
}

/// Observe or cancel one submitted unit.
#[derive(Debug, Clone)]
pub struct UnitHandle {
    unit: Arc<UnitOfWork>,
}

impl UnitHandle {
    pub fn id(&self) -> u64 {
        self.unit.id
    }

    pub fn state(&self) -> UnitState {
        self.unit.state()
    }

    /// Cancel the unit if it has not started yet. Returns whether it was cancelled.
    pub fn cancel(&self) -> bool {
        self.unit.cancel()
    }
}

/// Future of a submitted unit's result.
///
/// Resolves to `None` when the result is never delivered: the unit was
/// cancelled, or the orchestrator shut down before completion.
#[derive(Debug)]
pub struct FetchHandle<T> {
    unit: UnitHandle,
    rx: oneshot::Receiver<Result<T, WeatherError>>,
}

impl<T> FetchHandle<T> {
    pub fn unit(&self) -> &UnitHandle {
        &self.unit
    }

    pub fn state(&self) -> UnitState {
        self.unit.state()
    }

    pub fn cancel(&self) -> bool {
        self.unit.cancel()
    }
}

impl<T> Future for FetchHandle<T> {
    type Output = Option<Result<T, WeatherError>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx).poll(cx).map(Result::ok)
    }
}
