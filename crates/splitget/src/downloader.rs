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

use std::sync::Arc;

use jiff::Timestamp;
use snafu::{ResultExt, ensure};
use tracing::info;

use crate::{
    assembler::Assembler,
    config::DownloaderConfig,
    error::{ClientBuildSnafu, DownloadError, InvalidRetryBudgetSnafu},
    fetcher::HttpSegmentFetcher,
    orchestrator::Orchestrator,
    planner::plan,
    probe::ResourceProber,
    types::{DownloadJob, DownloadResult},
};

/// HTTP range downloader
///
/// Components:
/// - `ResourceProber`: checks range support, size and filename with HEAD
/// - `plan`: splits the byte range into segments
/// - `Orchestrator`: fetches every segment concurrently with retries
/// - `Assembler`: writes the segments to the output file in order
pub struct Downloader {
    config: DownloaderConfig,
    client: reqwest::Client,
    prober: ResourceProber,
}

impl Downloader {
    /// Create a new downloader with the given configuration
    pub fn new(config: DownloaderConfig) -> Result<Self, DownloadError> {
        let client = Self::build_client(&config)?;
        let prober = ResourceProber::new(client.clone());
        Ok(Self {
            config,
            client,
            prober,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &DownloaderConfig { &self.config }

    /// Download `url` into `destination` using the configured part count
    /// and retry budget
    pub async fn download_to(
        &self,
        url: &str,
        destination: impl Into<std::path::PathBuf>,
    ) -> Result<DownloadResult, DownloadError> {
        let job = DownloadJob::from_config(url, destination, &self.config);
        self.download(&job).await
    }

    /// Run a download job.
    ///
    /// 1. Probe the resource (range support, length, filename)
    /// 2. Plan the segments
    /// 3. Fetch all segments concurrently and wait for every one
    /// 4. Merge them into `destination/filename`
    ///
    /// Nothing is written unless every segment was fetched.
    pub async fn download(&self, job: &DownloadJob) -> Result<DownloadResult, DownloadError> {
        let start_time = Timestamp::now();
        ensure!(job.max_attempts > 0, InvalidRetryBudgetSnafu);

        let metadata = self.prober.probe(&job.url).await?;
        let segments = plan(metadata.content_length, job.parts)?;
        info!(
            url = %job.url,
            content_length = metadata.content_length,
            parts = segments.len(),
            filename = %metadata.filename,
            "starting download"
        );

        let fetcher = Arc::new(HttpSegmentFetcher::new(
            self.client.clone(),
            job.url.clone(),
        ));
        let policy = self
            .config
            .retry
            .clone()
            .with_max_attempts(job.max_attempts);
        let orchestrator = Orchestrator::new(fetcher, policy)
            .with_deadline(self.config.request_deadline())
            .with_max_concurrency(self.config.max_concurrency);

        let segments = orchestrator.run(segments).await?;
        let written = Assembler::merge(&segments, &job.destination, &metadata.filename).await?;

        let duration = start_time.until(Timestamp::now()).unwrap_or_default();
        info!(path = %written.path.display(), size = written.size, "download finished");

        Ok(DownloadResult {
            path: written.path,
            size: written.size,
            parts: segments.len(),
            duration,
        })
    }

    fn build_client(config: &DownloaderConfig) -> Result<reqwest::Client, DownloadError> {
        let mut builder =
            reqwest::Client::builder().connect_timeout(config.connect_timeout.unsigned_abs());

        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua);
        }

        builder.build().context(ClientBuildSnafu)
    }
}
