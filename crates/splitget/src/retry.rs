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

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use backon::{BackoffBuilder, Retryable};
use bytes::Bytes;
use snafu::{ResultExt, ensure};
use tracing::{info, warn};

use crate::{
    error::{DownloadError, FetchError, InvalidRetryBudgetSnafu, RetryExhaustedSnafu},
    fetcher::SegmentFetcher,
    types::ByteRange,
};

/// Decides how long to wait before the next attempt of a segment.
///
/// `failed` is the number of attempts that have failed so far, starting at 1.
pub trait BackoffStrategy: fmt::Debug + Send + Sync {
    fn delay(&self, failed: usize) -> Duration;
}

/// Built-in backoff strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Retry right away
    #[default]
    Immediate,
    /// Same delay before every retry
    Constant(Duration),
    /// Doubling delay starting at `min`, capped at `max`
    Exponential { min: Duration, max: Duration },
}

impl BackoffStrategy for Backoff {
    fn delay(&self, failed: usize) -> Duration {
        match *self {
            Self::Immediate => Duration::ZERO,
            Self::Constant(delay) => delay,
            Self::Exponential { min, max } => {
                let exponent = u32::try_from(failed.saturating_sub(1)).unwrap_or(u32::MAX);
                min.saturating_mul(2u32.saturating_pow(exponent)).min(max)
            }
        }
    }
}

/// How many times a segment is attempted and how long to wait in between
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per segment, including the first one
    pub max_attempts: usize,
    pub backoff:      Arc<dyn BackoffStrategy>,
}

impl Default for RetryPolicy {
    fn default() -> Self { Self::new(5, Backoff::Immediate) }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, backoff: impl BackoffStrategy + 'static) -> Self {
        Self {
            max_attempts,
            backoff: Arc::new(backoff),
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    fn backoff_builder(&self) -> PolicyBackoffBuilder {
        PolicyBackoffBuilder {
            strategy: Arc::clone(&self.backoff),
            retries:  self.max_attempts.saturating_sub(1),
        }
    }
}

/// Adapts a [`BackoffStrategy`] to backon. Yields one delay per retry, so
/// the first attempt plus `retries` delays add up to `max_attempts` calls.
#[derive(Debug)]
struct PolicyBackoffBuilder {
    strategy: Arc<dyn BackoffStrategy>,
    retries:  usize,
}

impl BackoffBuilder for PolicyBackoffBuilder {
    type Backoff = PolicyBackoff;

    fn build(self) -> Self::Backoff {
        PolicyBackoff {
            strategy: self.strategy,
            retries:  self.retries,
            failed:   0,
        }
    }
}

#[derive(Debug)]
struct PolicyBackoff {
    strategy: Arc<dyn BackoffStrategy>,
    retries:  usize,
    failed:   usize,
}

impl Iterator for PolicyBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.failed >= self.retries {
            return None;
        }
        self.failed += 1;
        Some(self.strategy.delay(self.failed))
    }
}

/// Fetch one segment, retrying up to `policy.max_attempts` times.
///
/// Stops at the first success. When every attempt fails the last cause is
/// returned inside [`DownloadError::RetryExhausted`].
pub async fn fetch_with_retry<F>(
    fetcher: &F,
    index: usize,
    range: ByteRange,
    policy: &RetryPolicy,
    deadline: Option<Duration>,
) -> Result<Bytes, DownloadError>
where
    F: SegmentFetcher + ?Sized,
{
    ensure!(policy.max_attempts > 0, InvalidRetryBudgetSnafu);

    let attempts = AtomicUsize::new(0);
    let result = (|| attempt(fetcher, index, range, deadline, &attempts))
        .retry(policy.backoff_builder())
        .await;

    result.context(RetryExhaustedSnafu {
        index,
        attempts: attempts.load(Ordering::Relaxed),
    })
}

async fn attempt<F>(
    fetcher: &F,
    index: usize,
    range: ByteRange,
    deadline: Option<Duration>,
    attempts: &AtomicUsize,
) -> Result<Bytes, FetchError>
where
    F: SegmentFetcher + ?Sized,
{
    let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
    match fetcher.fetch(range, deadline).await {
        Ok(data) => {
            info!(index, attempt, bytes = data.len(), "segment {index} is ok");
            Ok(data)
        }
        Err(e) => {
            warn!(index, attempt, %range, error = %e, "segment {index} attempt {attempt} failed");
            Err(e)
        }
    }
}
