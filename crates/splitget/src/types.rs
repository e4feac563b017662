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

use std::{fmt, path::PathBuf};

use bon::Builder;
use bytes::Bytes;
use jiff::Span;

use crate::config::DownloaderConfig;

/// A request to download one remote resource into a directory
#[derive(Debug, Clone, Builder)]
pub struct DownloadJob {
    /// URL to download from
    #[builder(into)]
    pub url:          String,
    /// Existing directory the resolved filename is written into
    #[builder(into)]
    pub destination:  PathBuf,
    /// Number of segments the resource is split into
    #[builder(default = 16)]
    pub parts:        usize,
    /// Attempts allowed per segment before it is given up
    #[builder(default = 5)]
    pub max_attempts: usize,
}

impl DownloadJob {
    /// Build a job taking part count and retry budget from the config
    pub fn from_config(
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        config: &DownloaderConfig,
    ) -> Self {
        Self {
            url:          url.into(),
            destination:  destination.into(),
            parts:        config.parts,
            max_attempts: config.retry.max_attempts,
        }
    }
}

/// What the probe learned about the remote resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMetadata {
    pub content_length: u64,
    pub supports_range: bool,
    pub filename:       String,
}

/// Inclusive byte range `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end:   u64,
}

#[allow(clippy::len_without_is_empty)]
impl ByteRange {
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self { Self { start, end } }

    /// Number of bytes covered by the range
    #[must_use]
    pub const fn len(&self) -> u64 { self.end - self.start + 1 }

    /// Value for the `Range` request header
    #[must_use]
    pub fn header_value(&self) -> String { format!("bytes={}-{}", self.start, self.end) }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One planned slice of the resource.
///
/// The data is written once by the task that fetched it and is only
/// readable after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    index: usize,
    range: ByteRange,
    data:  Option<Bytes>,
}

impl Segment {
    #[must_use]
    pub const fn new(index: usize, range: ByteRange) -> Self {
        Self {
            index,
            range,
            data: None,
        }
    }

    /// Position of the segment in the output (0-based)
    #[must_use]
    pub const fn index(&self) -> usize { self.index }

    #[must_use]
    pub const fn range(&self) -> ByteRange { self.range }

    /// Whether the segment has been fetched successfully
    #[must_use]
    pub const fn is_complete(&self) -> bool { self.data.is_some() }

    /// Fetched bytes, `None` until the segment completed
    #[must_use]
    pub const fn data(&self) -> Option<&Bytes> { self.data.as_ref() }

    pub(crate) fn complete(&mut self, data: Bytes) {
        debug_assert!(self.data.is_none(), "segment {} filled twice", self.index);
        self.data = Some(data);
    }
}

/// File produced by the assembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Result of a successful download
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// Path where the file was saved
    pub path:     PathBuf,
    /// Size of the downloaded file in bytes
    pub size:     u64,
    /// Number of segments the resource was fetched in
    pub parts:    usize,
    /// Total duration of the download operation
    pub duration: Span,
}
