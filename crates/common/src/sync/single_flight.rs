//! Single-flight execution
//!
//! The first caller installs a shared future under the lock before anything
//! is awaited; callers arriving while it is pending receive a clone of the
//! same future and observe the same result. The slot is cleared by the
//! operation itself when it settles, so the next call starts a fresh flight.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::trace;

/// Shared handle to an in-flight operation
pub type FlightFuture<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct Flight<T, E> {
    id: u64,
    future: FlightFuture<T, E>,
}

/// Deduplicates concurrent executions of one logical operation
pub struct SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    slot: Arc<Mutex<Option<Flight<T, E>>>>,
    next_id: AtomicU64,
    name: &'static str,
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self { slot: Arc::new(Mutex::new(None)), next_id: AtomicU64::new(1), name }
    }

    /// Join the in-flight operation, or start one with `start`
    ///
    /// `start` is only invoked when no flight is pending. The returned future
    /// must be awaited (by this caller or a joiner) for the flight to finish.
    pub fn run<F, Fut>(&self, start: F) -> FlightFuture<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if let Some(flight) = slot.as_ref() {
            trace!(flight = self.name, id = flight.id, "joining in-flight operation");
            return flight.future.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let operation = start();
        let release = Arc::clone(&self.slot);
        let future = async move {
            let result = operation.await;
            let mut slot = release.lock();
            if slot.as_ref().is_some_and(|flight| flight.id == id) {
                *slot = None;
            }
            result
        }
        .boxed()
        .shared();

        trace!(flight = self.name, id, "starting operation");
        *slot = Some(Flight { id, future: future.clone() });
        future
    }

    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Forget the pending flight without cancelling it
    ///
    /// Existing holders still receive its result; the next `run` starts anew.
    pub fn detach(&self) {
        self.slot.lock().take();
    }
}
