//! Admission control for sandbox creation: a fixed pool of permits with a
//! hard cap on how long a submission may queue for one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// How many sandboxes may run at once.
pub const DEFAULT_CAPACITY: usize = 15;

/// Submissions queued longer than this are rejected rather than left hanging
/// behind a backlog.
pub const DEFAULT_QUEUE_WAIT: Duration = Duration::from_secs(40);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("server is busy, try again later")]
    ServerBusy,
}

/// Counting semaphore guarding the sandbox pool. Cheap to clone; clones
/// share the same permits.
#[derive(Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    queue_wait: Duration,
}

/// Entitles the holder to one concurrent sandbox. Returned to the pool on
/// drop, so release happens exactly once on every exit path.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl Default for AdmissionGate {
    fn default() -> Self {
        AdmissionGate::new(DEFAULT_CAPACITY, DEFAULT_QUEUE_WAIT)
    }
}

impl AdmissionGate {
    pub fn new(capacity: usize, queue_wait: Duration) -> AdmissionGate {
        AdmissionGate {
            permits: Arc::new(Semaphore::new(capacity)),
            queue_wait,
        }
    }

    /// Waits for a permit. Returns `ServerBusy` once the queue-wait cap
    /// elapses; dropping the future while queued leaves nothing held.
    pub async fn admit(&self) -> Result<AdmissionPermit, AdmissionError> {
        let acquire = Arc::clone(&self.permits).acquire_owned();
        match tokio::time::timeout(self.queue_wait, acquire).await {
            Ok(acquired) => {
                let permit = acquired.expect("admission semaphore is never closed");
                Ok(AdmissionPermit { _permit: permit })
            }
            Err(_) => Err(AdmissionError::ServerBusy),
        }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_capacity() {
        let gate = AdmissionGate::new(3, Duration::from_millis(10));
        let _a = gate.admit().await.unwrap();
        let _b = gate.admit().await.unwrap();
        let _c = gate.admit().await.unwrap();
        assert_eq!(gate.available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_after_queue_wait() {
        let gate = AdmissionGate::new(1, Duration::from_secs(40));
        let held = gate.admit().await.unwrap();
        let err = gate.admit().await.unwrap_err();
        assert_eq!(err, AdmissionError::ServerBusy);
        drop(held);
    }

    #[tokio::test]
    async fn dropping_a_permit_frees_a_slot() {
        let gate = AdmissionGate::new(1, Duration::from_millis(50));
        let held = gate.admit().await.unwrap();
        drop(held);
        let again = gate.admit().await;
        assert!(again.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn queued_waiter_wins_when_a_permit_frees_up() {
        let gate = AdmissionGate::new(1, Duration::from_secs(40));
        let held = gate.admit().await.unwrap();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.admit().await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(held);
        let outcome = waiter.await.unwrap();
        assert!(outcome.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sixteenth_submission_is_turned_away() {
        let gate = AdmissionGate::new(DEFAULT_CAPACITY, Duration::from_secs(40));
        let mut held = Vec::new();
        for _ in 0..DEFAULT_CAPACITY {
            held.push(gate.admit().await.unwrap());
        }
        assert_eq!(gate.admit().await.unwrap_err(), AdmissionError::ServerBusy);
        drop(held);
    }
}
