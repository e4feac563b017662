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

use std::time::Duration;

use bon::Builder;
use jiff::SignedDuration;
use smart_default::SmartDefault;

use crate::retry::RetryPolicy;

/// Configuration for the downloader
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct DownloaderConfig {
    /// Number of segments a resource is split into (default: 16)
    #[default = 16]
    #[builder(default = 16)]
    pub parts: usize,

    /// Per-segment retry policy (default: 5 attempts, no delay)
    #[default(RetryPolicy::default())]
    #[builder(default)]
    pub retry: RetryPolicy,

    /// Deadline for a single ranged request. `None` waits indefinitely.
    pub request_timeout: Option<SignedDuration>,

    /// Timeout for establishing connections (default: 30s)
    #[default(SignedDuration::from_secs(30))]
    #[builder(default = SignedDuration::from_secs(30))]
    pub connect_timeout: SignedDuration,

    /// Upper bound on segments fetched at the same time. `None` runs one
    /// task per segment with no limit.
    pub max_concurrency: Option<usize>,

    /// Custom User-Agent header
    pub user_agent: Option<String>,
}

impl DownloaderConfig {
    /// Request deadline as a std duration, negative values count as zero
    #[must_use]
    pub fn request_deadline(&self) -> Option<Duration> {
        self.request_timeout.map(SignedDuration::unsigned_abs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{Backoff, BackoffStrategy};

    #[test]
    fn test_default_config() {
        let config = DownloaderConfig::default();
        assert_eq!(config.parts, 16);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff.delay(1), Duration::ZERO);
        assert!(config.request_timeout.is_none());
        assert!(config.max_concurrency.is_none());
        assert_eq!(config.connect_timeout, SignedDuration::from_secs(30));
    }

    #[test]
    fn test_builder_matches_default() {
        let built = DownloaderConfig::builder().build();
        let default = DownloaderConfig::default();
        assert_eq!(built.parts, default.parts);
        assert_eq!(built.retry.max_attempts, default.retry.max_attempts);
        assert_eq!(built.connect_timeout, default.connect_timeout);
    }

    #[test]
    fn test_request_deadline_conversion() {
        let config = DownloaderConfig::builder()
            .request_timeout(SignedDuration::from_millis(1500))
            .retry(RetryPolicy::new(3, Backoff::Constant(Duration::from_millis(10))))
            .build();
        assert_eq!(config.request_deadline(), Some(Duration::from_millis(1500)));
        assert_eq!(config.retry.max_attempts, 3);
    }
}
