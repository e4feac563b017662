// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{sync::Arc, time::Duration};

use tokio::{sync::Semaphore, task::JoinHandle};
use tracing::{debug, error};

use crate::{
    error::{DownloadError, PartialCompletionSnafu},
    fetcher::SegmentFetcher,
    retry::{RetryPolicy, fetch_with_retry},
    types::Segment,
};

/// Runs one retrying fetch task per segment and waits for all of them.
///
/// A failing segment never cancels its siblings; the outcome is decided only
/// after every task has settled.
pub struct Orchestrator<F: ?Sized> {
    fetcher:  Arc<F>,
    policy:   RetryPolicy,
    deadline: Option<Duration>,
    limit:    Option<Arc<Semaphore>>,
}

impl<F> Orchestrator<F>
where
    F: SegmentFetcher + ?Sized + 'static,
{
    pub const fn new(fetcher: Arc<F>, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            policy,
            deadline: None,
            limit: None,
        }
    }

    /// Per-request deadline handed to the fetcher
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Cap the number of segments in flight. Tasks are still spawned for
    /// every segment but wait for a slot before fetching.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
        self.limit = max_concurrency.map(|n| Arc::new(Semaphore::new(n.max(1))));
        self
    }

    /// Fetch every segment. Returns the filled segments in index order, or
    /// [`DownloadError::PartialCompletion`] if any of them gave up.
    pub async fn run(&self, segments: Vec<Segment>) -> Result<Vec<Segment>, DownloadError> {
        let planned: Vec<Segment> = segments.clone();
        debug!(parts = segments.len(), "starting segment tasks");

        let handles: Vec<JoinHandle<Segment>> = segments
            .into_iter()
            .map(|segment| self.spawn_worker(segment))
            .collect();

        let settled = Self::collect_results(planned, handles).await;

        let failed: Vec<usize> = settled
            .iter()
            .filter(|s| !s.is_complete())
            .map(Segment::index)
            .collect();
        if !failed.is_empty() {
            return PartialCompletionSnafu { failed }.fail();
        }

        Ok(settled)
    }

    fn spawn_worker(&self, mut segment: Segment) -> JoinHandle<Segment> {
        let fetcher = Arc::clone(&self.fetcher);
        let policy = self.policy.clone();
        let deadline = self.deadline;
        let limit = self.limit.clone();

        tokio::spawn(async move {
            let _permit = match limit {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };

            let index = segment.index();
            match fetch_with_retry(&*fetcher, index, segment.range(), &policy, deadline).await {
                Ok(data) => segment.complete(data),
                Err(e) => error!(index, error = %e, "segment {index} gave up"),
            }
            segment
        })
    }

    /// Wait for every task. A task that panicked leaves its segment unfilled.
    async fn collect_results(
        planned: Vec<Segment>,
        handles: Vec<JoinHandle<Segment>>,
    ) -> Vec<Segment> {
        let mut settled = Vec::with_capacity(handles.len());
        for (planned, handle) in planned.into_iter().zip(handles) {
            match handle.await {
                Ok(segment) => settled.push(segment),
                Err(e) => {
                    error!(index = planned.index(), error = %e, "segment task did not finish");
                    settled.push(planned);
                }
            }
        }
        settled
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::{
        error::FetchError,
        planner::plan,
        retry::Backoff,
        types::ByteRange,
    };

    fn pattern(offset: u64) -> u8 { u8::try_from(offset % 251).unwrap() }

    /// Serves a deterministic byte pattern. Ranges starting at an offset in
    /// `failures` fail that many times first.
    #[derive(Default)]
    struct ScriptedFetcher {
        failures:  HashMap<u64, usize>,
        delays:    HashMap<u64, Duration>,
        calls:     Mutex<HashMap<u64, usize>>,
        in_flight: AtomicUsize,
        peak:      AtomicUsize,
    }

    impl ScriptedFetcher {
        fn calls_for(&self, start: u64) -> usize {
            self.calls
                .lock()
                .unwrap()
                .get(&start)
                .copied()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl SegmentFetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            range: ByteRange,
            _deadline: Option<Duration>,
        ) -> Result<Bytes, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let call = {
                let mut calls = self.calls.lock().unwrap();
                let entry = calls.entry(range.start).or_default();
                *entry += 1;
                *entry
            };
            if let Some(delay) = self.delays.get(&range.start) {
                tokio::time::sleep(*delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if call <= self.failures.get(&range.start).copied().unwrap_or_default() {
                return Err(FetchError::Status {
                    status: 500,
                    start:  range.start,
                    end:    range.end,
                });
            }
            Ok((range.start..=range.end).map(pattern).collect())
        }
    }

    fn concat(segments: &[Segment]) -> Vec<u8> {
        segments
            .iter()
            .flat_map(|s| s.data().unwrap().iter().copied())
            .collect()
    }

    #[tokio::test]
    async fn test_all_segments_complete_in_order() {
        let fetcher = Arc::new(ScriptedFetcher {
            // later segments finish first
            delays: HashMap::from([(0, Duration::from_millis(40)), (251, Duration::from_millis(20))]),
            ..Default::default()
        });
        let orchestrator = Orchestrator::new(Arc::clone(&fetcher), RetryPolicy::default());

        let segments = orchestrator.run(plan(1000, 4).unwrap()).await.unwrap();

        assert_eq!(segments.len(), 4);
        assert!(segments.iter().all(Segment::is_complete));
        let expected: Vec<u8> = (0..1000).map(pattern).collect();
        assert_eq!(concat(&segments), expected);
    }

    #[tokio::test]
    async fn test_segment_recovers_within_retry_budget() {
        let segments = plan(300, 3).unwrap();
        let second = segments[1].range().start;
        let fetcher = Arc::new(ScriptedFetcher {
            failures: HashMap::from([(second, 2)]),
            ..Default::default()
        });
        let orchestrator = Orchestrator::new(
            Arc::clone(&fetcher),
            RetryPolicy::new(5, Backoff::Immediate),
        );

        let segments = orchestrator.run(segments).await.unwrap();

        assert!(segments.iter().all(Segment::is_complete));
        assert_eq!(fetcher.calls_for(second), 3);
        assert_eq!(fetcher.calls_for(0), 1);
    }

    #[tokio::test]
    async fn test_exhausted_segment_fails_whole_job() {
        let segments = plan(400, 4).unwrap();
        let starts: Vec<u64> = segments.iter().map(|s| s.range().start).collect();
        let fetcher = Arc::new(ScriptedFetcher {
            failures: HashMap::from([(starts[1], usize::MAX)]),
            // a slow sibling must still be waited for
            delays: HashMap::from([(starts[3], Duration::from_millis(50))]),
            ..Default::default()
        });
        let orchestrator = Orchestrator::new(
            Arc::clone(&fetcher),
            RetryPolicy::new(3, Backoff::Immediate),
        );

        let result = orchestrator.run(segments).await;

        match result {
            Err(DownloadError::PartialCompletion { failed }) => assert_eq!(failed, vec![1]),
            other => panic!("expected partial completion, got {other:?}"),
        }
        assert_eq!(fetcher.calls_for(starts[1]), 3);
        for start in [starts[0], starts[2], starts[3]] {
            assert_eq!(fetcher.calls_for(start), 1);
        }
    }

    #[tokio::test]
    async fn test_max_concurrency_bounds_in_flight_requests() {
        let segments = plan(800, 8).unwrap();
        let delays = segments
            .iter()
            .map(|s| (s.range().start, Duration::from_millis(10)))
            .collect();
        let fetcher = Arc::new(ScriptedFetcher {
            delays,
            ..Default::default()
        });
        let orchestrator = Orchestrator::new(Arc::clone(&fetcher), RetryPolicy::default())
            .with_max_concurrency(Some(2));

        let segments = orchestrator.run(segments).await.unwrap();

        assert_eq!(segments.len(), 8);
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);
    }
}
