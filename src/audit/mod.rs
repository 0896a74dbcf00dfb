use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

use crate::domain::AuditEntry;
use crate::errors::Result;
use crate::store::HrStore;

/// out-of-band audit recorder
///
/// mutating-call entries go through a bounded in-process queue drained by a
/// background worker, so request latency never waits on audit persistence;
/// delivery is at-least-once and may be reordered. when the queue
/// saturates the oldest entry is dropped and counted. auth events bypass
/// the queue and are durable before the response completes.
#[derive(Clone)]
pub struct AuditRecorder {
    inner: Arc<Inner>,
}

struct Inner {
    queue: Mutex<VecDeque<AuditEntry>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
    store: Arc<dyn HrStore>,
}

impl AuditRecorder {
    /// build a recorder without starting the worker (tests drain manually)
    pub fn new(store: Arc<dyn HrStore>, capacity: usize) -> Self {
        AuditRecorder {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                notify: Notify::new(),
                capacity: capacity.max(1),
                dropped: AtomicU64::new(0),
                store,
            }),
        }
    }

    /// build a recorder and start its background worker
    pub fn spawn(store: Arc<dyn HrStore>, capacity: usize) -> Self {
        let recorder = Self::new(store, capacity);
        let worker = recorder.clone();
        tokio::spawn(async move {
            loop {
                worker.inner.notify.notified().await;
                worker.flush();
            }
        });
        recorder
    }

    /// non-blocking enqueue; drops the oldest entry when saturated
    pub fn enqueue(&self, entry: AuditEntry) {
        let mut queue = self.inner.queue.lock();
        if queue.len() >= self.inner.capacity {
            queue.pop_front();
            let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(dropped, "audit queue saturated, dropping oldest entry");
        }
        queue.push_back(entry);
        drop(queue);
        self.inner.notify.notify_one();
    }

    /// durable write on the caller's path, used for LOGIN/LOGOUT/ACCESS_DENIED
    pub fn record_inline(&self, entry: AuditEntry) -> Result<()> {
        self.inner.store.append_audit(&entry)?;
        Ok(())
    }

    /// drain the queue into the store; returns how many entries persisted
    pub fn flush(&self) -> usize {
        let mut written = 0;
        loop {
            let Some(entry) = self.inner.queue.lock().pop_front() else {
                return written;
            };
            if let Err(err) = self.inner.store.append_audit(&entry) {
                // at-least-once: the entry goes back for a later attempt
                warn!(error = %err, "audit write failed, requeueing entry");
                self.inner.queue.lock().push_front(entry);
                return written;
            }
            written += 1;
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AuditQuery;
    use crate::store::MemoryStore;
    use crate::types::AuditAction;
    use chrono::Utc;

    fn entry(n: u32) -> AuditEntry {
        AuditEntry::new(
            "admin",
            AuditAction::Create,
            "employee",
            n.to_string(),
            serde_json::json!({"n": n}),
            "10.0.0.1",
            None,
            None,
            Utc::now() + chrono::Duration::milliseconds(n as i64),
        )
    }

    #[test]
    fn test_oldest_dropped_on_saturation() {
        let store = Arc::new(MemoryStore::new());
        let recorder = AuditRecorder::new(store.clone() as Arc<dyn HrStore>, 3);

        for n in 0..5 {
            recorder.enqueue(entry(n));
        }
        assert_eq!(recorder.queue_depth(), 3);
        assert_eq!(recorder.dropped_count(), 2);

        assert_eq!(recorder.flush(), 3);
        assert_eq!(recorder.queue_depth(), 0);

        // the two oldest entries (0, 1) were the casualties
        let kept = store.audit_entries(&AuditQuery::default()).unwrap();
        let mut ids: Vec<&str> = kept.iter().map(|e| e.entity_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["2", "3", "4"]);
    }

    #[test]
    fn test_inline_record_is_immediate() {
        let store = Arc::new(MemoryStore::new());
        let recorder = AuditRecorder::new(store.clone() as Arc<dyn HrStore>, 8);
        recorder.record_inline(entry(7)).unwrap();
        assert_eq!(store.audit_entries(&AuditQuery::default()).unwrap().len(), 1);
        assert_eq!(recorder.queue_depth(), 0);
    }

    #[tokio::test]
    async fn test_worker_drains_in_background() {
        let store = Arc::new(MemoryStore::new());
        let recorder = AuditRecorder::spawn(store.clone() as Arc<dyn HrStore>, 8);
        recorder.enqueue(entry(1));
        recorder.enqueue(entry(2));

        for _ in 0..50 {
            if store.audit_entries(&AuditQuery::default()).unwrap().len() == 2 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("worker did not drain the queue");
    }
}
