//! Bounded concurrent execution with an optional batch deadline.
//!
//! Lookups run through `buffer_unordered`, so at most `max_concurrency` are in
//! flight and results arrive in completion order tagged with their input
//! index. Callers that need input order put them back by index.

use futures::stream::{self, Stream, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Runs indexed tasks with a concurrency cap and an optional deadline.
#[derive(Debug, Clone)]
pub struct ConcurrentProcessor {
    max_concurrency: usize,
    deadline: Option<Duration>,
}

impl ConcurrentProcessor {
    /// Create a processor; the limit is raised to 1 if given 0.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            deadline: None,
        }
    }

    /// Bound the whole run. The clock starts when [`stream`](Self::stream) is called.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run `tasks`, yielding `(index, output)` as each finishes.
    ///
    /// The output is `None` for tasks cut off by the deadline, including those
    /// that had not started when it passed.
    pub fn stream<'a, I, Fut, T>(&self, tasks: I) -> impl Stream<Item = (usize, Option<T>)> + 'a
    where
        I: IntoIterator<Item = Fut>,
        I::IntoIter: 'a,
        Fut: Future<Output = T> + 'a,
        T: 'a,
    {
        let deadline = self.deadline.map(|budget| Instant::now() + budget);

        stream::iter(tasks.into_iter().enumerate())
            .map(move |(index, task)| async move {
                let output = match deadline {
                    Some(at) if Instant::now() >= at => None,
                    Some(at) => tokio::time::timeout_at(at, task).await.ok(),
                    None => Some(task.await),
                };
                (index, output)
            })
            .buffer_unordered(self.max_concurrency)
    }

    /// Run `tasks` and return their outputs in input order.
    pub async fn run_ordered<I, Fut, T>(&self, tasks: I) -> Vec<Option<T>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = T>,
    {
        let tasks: Vec<Fut> = tasks.into_iter().collect();
        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(tasks.len()).collect();

        let results = self.stream(tasks);
        futures::pin_mut!(results);
        while let Some((index, output)) = results.next().await {
            slots[index] = output;
        }

        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_run_ordered_restores_input_order() {
        let processor = ConcurrentProcessor::new(4);
        let tasks = (0..6u64).map(|i| async move {
            // Later inputs finish first
            tokio::time::sleep(Duration::from_millis(60 - i * 10)).await;
            i
        });

        let results = processor.run_ordered(tasks).await;
        assert_eq!(results, (0..6u64).map(Some).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrency_cap() {
        let processor = ConcurrentProcessor::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..8).map(|_| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        });

        processor.run_ordered(tasks).await;
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_deadline_marks_pending_tasks() {
        let processor =
            ConcurrentProcessor::new(1).with_deadline(Some(Duration::from_millis(100)));
        let tasks = [10u64, 500, 10].into_iter().map(|ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            ms
        });

        let results = processor.run_ordered(tasks).await;
        assert_eq!(results, vec![Some(10), None, None]);
    }

    #[test]
    fn test_zero_concurrency_is_raised() {
        let processor = ConcurrentProcessor::new(0);
        assert_eq!(processor.max_concurrency, 1);
    }
}
