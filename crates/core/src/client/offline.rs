//! Offline hold
//!
//! Requests that would attempt a network call while offline park here,
//! keyed by submission sequence number. When connectivity returns the hold is
//! drained in ascending sequence order and each parked request is given an
//! admission ticket, so replays enter the admission queue in the order they
//! were originally submitted.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::admission::{AdmissionQueue, AdmissionTicket, PendingRequestRecord};

struct HeldRequest {
    record: PendingRequestRecord,
    resume: oneshot::Sender<AdmissionTicket>,
}

#[derive(Default)]
pub struct OfflineHold {
    held: Mutex<BTreeMap<u64, HeldRequest>>,
}

impl OfflineHold {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a request; the receiver yields its admission ticket on flush
    pub fn hold(&self, record: PendingRequestRecord) -> oneshot::Receiver<AdmissionTicket> {
        let (resume, wake) = oneshot::channel();
        debug!(request_id = record.id, url = %record.url, "holding request while offline");
        self.held.lock().insert(record.id, HeldRequest { record, resume });
        wake
    }

    /// Release every parked request into `admission` in submission order
    ///
    /// Returns how many requests were resumed. Requests whose caller has
    /// gone away are dropped without taking a queue position.
    pub fn flush(&self, admission: &AdmissionQueue) -> usize {
        let drained = std::mem::take(&mut *self.held.lock());
        if drained.is_empty() {
            return 0;
        }

        let mut resumed = 0;
        for (_, held) in drained {
            if held.resume.is_closed() {
                continue;
            }
            let ticket = admission.enqueue(held.record);
            // A refused ticket gives its place up when dropped.
            if held.resume.send(ticket).is_ok() {
                resumed += 1;
            }
        }
        info!(resumed, "flushed requests held while offline");
        resumed
    }

    pub fn len(&self) -> usize {
        self.held.lock().values().filter(|held| !held.resume.is_closed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<PendingRequestRecord> {
        self.held
            .lock()
            .values()
            .filter(|held| !held.resume.is_closed())
            .map(|held| held.record.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use courier_domain::Method;

    use super::*;

    #[tokio::test]
    async fn test_flush_resumes_in_submission_order() {
        let hold = OfflineHold::new();
        let admission = AdmissionQueue::new(1);

        let mut third = hold.hold(PendingRequestRecord::new(3, Method::Get, "/c"));
        let mut first = hold.hold(PendingRequestRecord::new(1, Method::Get, "/a"));
        let mut second = hold.hold(PendingRequestRecord::new(2, Method::Get, "/b"));
        assert_eq!(hold.records().iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);

        assert_eq!(hold.flush(&admission), 3);
        assert!(hold.is_empty());

        let mut first = first.try_recv().unwrap();
        let mut second = second.try_recv().unwrap();
        let mut third = third.try_recv().unwrap();

        let permit = first.try_recv().unwrap();
        assert_eq!(permit.request_id(), 1);
        assert!(second.try_recv().is_err());
        drop(permit);
        let permit = second.try_recv().unwrap();
        assert_eq!(permit.request_id(), 2);
        drop(permit);
        assert_eq!(third.try_recv().unwrap().request_id(), 3);
    }

    #[test]
    fn test_abandoned_requests_are_not_resumed() {
        let hold = OfflineHold::new();
        let admission = AdmissionQueue::new(4);
        drop(hold.hold(PendingRequestRecord::new(1, Method::Get, "/a")));
        let _kept = hold.hold(PendingRequestRecord::new(2, Method::Get, "/b"));

        assert_eq!(hold.len(), 1);
        assert_eq!(hold.flush(&admission), 1);
        assert_eq!(admission.active_count(), 1);
    }
}
