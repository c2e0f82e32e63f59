//! C10 — Batch Planner (spec §4.10): groups pending fetches from the
//! traversal's current depth and dispatches them under a concurrency limit
//! and a per-batch deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;

pub struct BatchPlanner {
    batch_size: usize,
    same_depth_batching: bool,
    max_concurrent_requests: usize,
    max_concurrent_batches: usize,
    batch_timeout: Duration,
}

/// Outcome of dispatching a single pending fetch within a batch.
pub enum BatchItemOutcome<T> {
    Completed(T),
    TimedOut,
}

impl BatchPlanner {
    pub fn new(
        batch_size: usize,
        same_depth_batching: bool,
        max_concurrent_requests: usize,
        max_concurrent_batches: usize,
        batch_timeout: Duration,
    ) -> Self {
        Self { batch_size, same_depth_batching, max_concurrent_requests, max_concurrent_batches, batch_timeout }
    }

    /// Splits `pending` into batches of at most `batchSize`, honouring
    /// `sameDepthBatching` (all of one depth's frontier is one logical
    /// cohort; this planner is invoked once per depth so the split is
    /// purely a size cap here).
    pub fn plan<I: Clone>(&self, pending: Vec<I>) -> Vec<Vec<I>> {
        if !self.same_depth_batching || self.batch_size == 0 {
            return vec![pending];
        }
        pending.chunks(self.batch_size).map(|c| c.to_vec()).collect()
    }

    /// Dispatches one batch: runs `fetch_one` for every pending fetch under a
    /// semaphore of size `maxConcurrentRequests`, with the whole batch
    /// bounded by `batchTimeout`. Completed fetches are kept even if the
    /// batch as a whole times out; the rest surface as `TimedOut` (spec
    /// §4.10 "On partial timeout, completed fetches are kept").
    pub async fn dispatch<I, F, Fut, T>(&self, batch: Vec<I>, fetch_one: F) -> Vec<(I, BatchItemOutcome<T>)>
    where
        I: Clone + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_requests.max(1)));
        let fetch_one = Arc::new(fetch_one);
        let deadline = self.batch_timeout;

        let mut handles = Vec::with_capacity(batch.len());
        for item in batch {
            let semaphore = semaphore.clone();
            let fetch_one = fetch_one.clone();
            let item_clone = item.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                tokio::time::timeout(deadline, fetch_one(item_clone)).await
            });
            handles.push((item, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (item, handle) in handles {
            match handle.await {
                Ok(Ok(value)) => results.push((item, BatchItemOutcome::Completed(value))),
                Ok(Err(_elapsed)) => results.push((item, BatchItemOutcome::TimedOut)),
                Err(join_err) => {
                    warn!(error = %join_err, "batch fetch task panicked");
                    results.push((item, BatchItemOutcome::TimedOut));
                }
            }
        }
        results
    }

    pub fn max_concurrent_batches(&self) -> usize {
        self.max_concurrent_batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Item {
        name: String,
    }

    fn fetch(name: &str) -> Item {
        Item { name: name.to_string() }
    }

    #[test]
    fn plan_chunks_by_batch_size() {
        let planner = BatchPlanner::new(2, true, 4, 2, Duration::from_secs(5));
        let pending = vec![fetch("a"), fetch("b"), fetch("c")];
        let batches = planner.plan(pending);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].len(), 1);
    }

    #[tokio::test]
    async fn dispatch_keeps_completed_and_flags_timeouts() {
        let planner = BatchPlanner::new(10, true, 4, 2, Duration::from_millis(30));
        let batch = vec![fetch("fast"), fetch("slow")];
        let results = planner
            .dispatch(batch, |item| async move {
                if item.name == "slow" {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                item.name.clone()
            })
            .await;
        assert_eq!(results.len(), 2);
        let slow = results.iter().find(|(f, _)| f.name == "slow").unwrap();
        assert!(matches!(slow.1, BatchItemOutcome::TimedOut));
        let fast = results.iter().find(|(f, _)| f.name == "fast").unwrap();
        assert!(matches!(fast.1, BatchItemOutcome::Completed(_)));
    }
}
