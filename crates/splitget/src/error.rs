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

use std::path::PathBuf;

use snafu::Snafu;

/// Failure of a single ranged request. Recoverable by retrying the segment.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FetchError {
    #[snafu(display("Network error: {source}"))]
    Network { source: reqwest::Error },

    #[snafu(display("HTTP error {status} for range {start}-{end}"))]
    Status { status: u16, start: u64, end: u64 },

    #[snafu(display("Failed to read response body: {source}"))]
    Body { source: reqwest::Error },

    #[snafu(display("Expected {expected} bytes for range, got {actual}"))]
    LengthMismatch { expected: u64, actual: u64 },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DownloadError {
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild { source: reqwest::Error },

    #[snafu(display("Probe request to {url} failed: {source}"))]
    Probe { url: String, source: reqwest::Error },

    #[snafu(display("Probe of {url} returned HTTP {status}"))]
    ProbeStatus { status: u16, url: String },

    #[snafu(display("Server does not support Range requests for {url}"))]
    RangeUnsupported { url: String },

    #[snafu(display("Missing or non-numeric Content-Length for {url}"))]
    MissingContentLength { url: String },

    #[snafu(display("Malformed Content-Disposition {value:?}: {reason}"))]
    MalformedDisposition { value: String, reason: String },

    #[snafu(display("Cannot split {content_length} bytes into {parts} parts"))]
    InvalidPartition { parts: usize, content_length: u64 },

    #[snafu(display("Remote resource is empty"))]
    EmptyResource,

    #[snafu(display("Retry budget must allow at least one attempt"))]
    InvalidRetryBudget,

    #[snafu(display("Segment {index} failed after {attempts} attempts: {source}"))]
    RetryExhausted {
        index:    usize,
        attempts: usize,
        source:   FetchError,
    },

    #[snafu(display("Download failed: partial completion, segments {failed:?} did not complete"))]
    PartialCompletion { failed: Vec<usize> },

    #[snafu(display("Segment {index} is missing"))]
    SegmentMissing { index: usize },

    #[snafu(display("File write error at {}: {source}", path.display()))]
    Write {
        path:   PathBuf,
        source: std::io::Error,
    },
}
