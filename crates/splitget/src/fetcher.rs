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

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::StatusCode;
use snafu::{ResultExt, ensure};

use crate::{
    error::{BodySnafu, FetchError, LengthMismatchSnafu, NetworkSnafu, StatusSnafu},
    types::ByteRange,
};

/// Retrieves one inclusive byte range of a remote resource.
///
/// Either the full range is returned or the call fails; there is no partial
/// result.
#[async_trait]
pub trait SegmentFetcher: Send + Sync {
    async fn fetch(
        &self,
        range: ByteRange,
        deadline: Option<Duration>,
    ) -> Result<Bytes, FetchError>;
}

/// Fetches ranges of a single URL over HTTP
#[derive(Debug, Clone)]
pub struct HttpSegmentFetcher {
    client: reqwest::Client,
    url:    String,
}

impl HttpSegmentFetcher {
    pub const fn new(client: reqwest::Client, url: String) -> Self { Self { client, url } }
}

#[async_trait]
impl SegmentFetcher for HttpSegmentFetcher {
    async fn fetch(
        &self,
        range: ByteRange,
        deadline: Option<Duration>,
    ) -> Result<Bytes, FetchError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(reqwest::header::RANGE, range.header_value());
        if let Some(deadline) = deadline {
            request = request.timeout(deadline);
        }

        let response = request.send().await.context(NetworkSnafu)?;

        // A plain 200 carries the resource from offset 0, so it can only
        // stand in for a range that starts there.
        let status = response.status();
        ensure!(
            status.is_success() && (status == StatusCode::PARTIAL_CONTENT || range.start == 0),
            StatusSnafu {
                status: status.as_u16(),
                start:  range.start,
                end:    range.end,
            }
        );

        let expected = range.len();
        if let Some(advertised) = response.content_length() {
            ensure!(
                advertised == expected,
                LengthMismatchSnafu {
                    expected,
                    actual: advertised,
                }
            );
        }

        // Never buffer more than the range, whatever the server streams
        let mut buffer = BytesMut::with_capacity(usize::try_from(expected).unwrap_or_default());
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context(BodySnafu)?;
            let received = (buffer.len() + chunk.len()) as u64;
            ensure!(
                received <= expected,
                LengthMismatchSnafu {
                    expected,
                    actual: received,
                }
            );
            buffer.extend_from_slice(&chunk);
        }

        let actual = buffer.len() as u64;
        ensure!(actual == expected, LengthMismatchSnafu { expected, actual });

        Ok(buffer.freeze())
    }
}
