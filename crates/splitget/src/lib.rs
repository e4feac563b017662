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

//! Download a single HTTP resource in parallel byte-range segments.
//!
//! The resource is probed with HEAD, split into contiguous segments, every
//! segment is fetched on its own task with bounded retries, and the bytes
//! are written to one file in their original order once all segments are
//! in.

mod assembler;
mod config;
mod disposition;
mod downloader;
mod error;
mod fetcher;
mod orchestrator;
mod planner;
mod probe;
mod retry;
mod types;

pub use assembler::Assembler;
pub use config::DownloaderConfig;
pub use disposition::filename_from_disposition;
pub use downloader::Downloader;
pub use error::{DownloadError, FetchError};
pub use fetcher::{HttpSegmentFetcher, SegmentFetcher};
pub use orchestrator::Orchestrator;
pub use planner::plan;
pub use probe::{ResourceProber, metadata_from_headers};
pub use retry::{Backoff, BackoffStrategy, RetryPolicy, fetch_with_retry};
pub use types::{ByteRange, DownloadJob, DownloadResult, ResourceMetadata, Segment, WrittenFile};
