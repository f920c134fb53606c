//! Concurrency admission
//!
//! At most `max_concurrent` requests hold a slot. Further requests wait in a
//! strict FIFO queue; a released slot is handed directly to the oldest live
//! waiter, so later arrivals can never overtake earlier ones.
//!
//! Enqueueing is synchronous: the queue position is fixed the moment
//! [`AdmissionQueue::enqueue`] returns, before the caller awaits anything.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use courier_domain::{CourierError, Method, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::trace;

/// A logical request while it waits for or holds a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequestRecord {
    /// Submission sequence number, unique per client
    pub id: u64,
    pub method: Method,
    pub url: String,
    pub retry_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl PendingRequestRecord {
    pub fn new(id: u64, method: Method, url: impl Into<String>) -> Self {
        Self { id, method, url: url.into(), retry_count: 0, enqueued_at: Utc::now() }
    }
}

struct Waiter {
    record: PendingRequestRecord,
    grant: oneshot::Sender<AdmissionPermit>,
}

#[derive(Default)]
struct AdmissionState {
    active: HashMap<u64, PendingRequestRecord>,
    waiting: VecDeque<Waiter>,
}

/// Future position in the admission queue
pub type AdmissionTicket = oneshot::Receiver<AdmissionPermit>;

/// FIFO concurrency limiter
#[derive(Clone)]
pub struct AdmissionQueue {
    state: Arc<Mutex<AdmissionState>>,
    max_concurrent: usize,
}

impl AdmissionQueue {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(AdmissionState::default())),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Take a place in line; the ticket resolves to a permit when admitted
    ///
    /// Dropping the ticket before admission gives the place up.
    pub fn enqueue(&self, record: PendingRequestRecord) -> AdmissionTicket {
        let (grant, ticket) = oneshot::channel();
        let mut state = self.state.lock();

        if state.active.len() < self.max_concurrent && state.waiting.is_empty() {
            let id = record.id;
            state.active.insert(id, record);
            drop(state);
            trace!(request_id = id, "admitted immediately");
            // The ticket is still held here, so the send cannot fail.
            let _ = grant.send(self.permit(id));
        } else {
            trace!(request_id = record.id, waiting = state.waiting.len() + 1, "queued for a slot");
            state.waiting.push_back(Waiter { record, grant });
        }
        ticket
    }

    /// Enqueue and wait for a slot
    pub async fn acquire(&self, record: PendingRequestRecord) -> Result<AdmissionPermit> {
        redeem(self.enqueue(record)).await
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.state.lock().waiting.iter().filter(|w| !w.grant.is_closed()).count()
    }

    pub fn active_records(&self) -> Vec<PendingRequestRecord> {
        let mut records: Vec<_> = self.state.lock().active.values().cloned().collect();
        records.sort_by_key(|record| record.id);
        records
    }

    pub fn waiting_records(&self) -> Vec<PendingRequestRecord> {
        self.state
            .lock()
            .waiting
            .iter()
            .filter(|w| !w.grant.is_closed())
            .map(|w| w.record.clone())
            .collect()
    }

    fn permit(&self, id: u64) -> AdmissionPermit {
        AdmissionPermit { queue: self.clone(), id }
    }

    fn release(&self, id: u64) {
        let mut grants = Vec::new();
        {
            let mut state = self.state.lock();
            state.active.remove(&id);
            while state.active.len() < self.max_concurrent {
                let Some(waiter) = state.waiting.pop_front() else { break };
                if waiter.grant.is_closed() {
                    continue;
                }
                let next = waiter.record.id;
                state.active.insert(next, waiter.record);
                grants.push((waiter.grant, next));
            }
        }

        // Granted outside the lock: a refused permit is dropped here and
        // releases its slot again.
        for (grant, next) in grants {
            trace!(request_id = next, "slot handed to next waiter");
            let _ = grant.send(self.permit(next));
        }
    }
}

/// Wait for a ticket to be admitted
pub async fn redeem(ticket: AdmissionTicket) -> Result<AdmissionPermit> {
    ticket.await.map_err(|_| CourierError::cancelled("admission queue closed"))
}

/// An occupied slot; dropping it admits the next waiter
pub struct AdmissionPermit {
    queue: AdmissionQueue,
    id: u64,
}

impl AdmissionPermit {
    pub fn request_id(&self) -> u64 {
        self.id
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.queue.release(self.id);
    }
}

impl std::fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPermit").field("request_id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64) -> PendingRequestRecord {
        PendingRequestRecord::new(id, Method::Get, format!("/items/{id}"))
    }

    #[tokio::test]
    async fn test_slots_are_granted_in_fifo_order() {
        let queue = AdmissionQueue::new(2);
        let first = queue.acquire(record(1)).await.unwrap();
        let second = queue.acquire(record(2)).await.unwrap();

        let mut third = queue.enqueue(record(3));
        let mut fourth = queue.enqueue(record(4));
        assert_eq!(queue.active_count(), 2);
        assert_eq!(queue.waiting_count(), 2);
        assert!(third.try_recv().is_err());

        drop(second);
        let third = third.try_recv().unwrap();
        assert_eq!(third.request_id(), 3);
        assert!(fourth.try_recv().is_err());

        drop(first);
        assert_eq!(fourth.try_recv().unwrap().request_id(), 4);
        drop(third);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_is_skipped() {
        let queue = AdmissionQueue::new(1);
        let holder = queue.acquire(record(1)).await.unwrap();
        let abandoned = queue.enqueue(record(2));
        let mut next = queue.enqueue(record(3));

        drop(abandoned);
        assert_eq!(queue.waiting_count(), 1);

        drop(holder);
        let permit = next.try_recv().unwrap();
        assert_eq!(permit.request_id(), 3);
        assert_eq!(queue.active_records().iter().map(|r| r.id).collect::<Vec<_>>(), vec![3]);
    }

    #[tokio::test]
    async fn test_new_arrival_does_not_overtake_waiters() {
        let queue = AdmissionQueue::new(1);
        let holder = queue.acquire(record(1)).await.unwrap();
        let mut waiting = queue.enqueue(record(2));
        drop(holder);

        let mut late = queue.enqueue(record(3));
        let granted = waiting.try_recv().unwrap();
        assert_eq!(granted.request_id(), 2);
        assert!(late.try_recv().is_err());
    }
}
