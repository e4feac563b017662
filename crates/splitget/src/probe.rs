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

use jiff::Zoned;
use reqwest::header::{ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, HeaderMap};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::debug;

use crate::{
    disposition::filename_from_disposition,
    error::{
        DownloadError, MalformedDispositionSnafu, MissingContentLengthSnafu, ProbeSnafu,
        ProbeStatusSnafu, RangeUnsupportedSnafu,
    },
    types::ResourceMetadata,
};

/// Fetches resource metadata from the server with a HEAD request
pub struct ResourceProber {
    client: reqwest::Client,
}

impl ResourceProber {
    pub const fn new(client: reqwest::Client) -> Self { Self { client } }

    /// Probe `url` without downloading its body
    pub async fn probe(&self, url: &str) -> Result<ResourceMetadata, DownloadError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .context(ProbeSnafu { url })?;

        ensure!(
            response.status().is_success(),
            ProbeStatusSnafu {
                status: response.status().as_u16(),
                url,
            }
        );

        let metadata = metadata_from_headers(url, response.headers())?;
        debug!(
            url,
            content_length = metadata.content_length,
            filename = %metadata.filename,
            "probed resource"
        );
        Ok(metadata)
    }
}

/// Interpret the headers of a probe response
pub fn metadata_from_headers(
    url: &str,
    headers: &HeaderMap,
) -> Result<ResourceMetadata, DownloadError> {
    // Only an exact "bytes" token counts, "none" or lists do not
    let supports_range = headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("bytes"));
    ensure!(supports_range, RangeUnsupportedSnafu { url });

    let content_length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .context(MissingContentLengthSnafu { url })?;

    let filename = match headers.get(CONTENT_DISPOSITION) {
        None => None,
        Some(value) => {
            let value = value.to_str().map_err(|_| {
                MalformedDispositionSnafu {
                    value:  String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    reason: "header is not visible ascii".to_string(),
                }
                .build()
            })?;
            filename_from_disposition(value)?
        }
    }
    .unwrap_or_else(date_stamped_filename);

    Ok(ResourceMetadata {
        content_length,
        supports_range,
        filename,
    })
}

/// Fallback name when the server does not suggest one: today's date
fn date_stamped_filename() -> String { Zoned::now().strftime("%Y-%m-%d").to_string() }

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    const URL: &str = "http://example.com/file";

    fn headers(pairs: &[(reqwest::header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_full_metadata() {
        let map = headers(&[
            (ACCEPT_RANGES, "bytes"),
            (CONTENT_LENGTH, "1000"),
            (CONTENT_DISPOSITION, "attachment; filename=\"data.bin\""),
        ]);
        let metadata = metadata_from_headers(URL, &map).unwrap();
        assert_eq!(
            metadata,
            ResourceMetadata {
                content_length: 1000,
                supports_range: true,
                filename:       "data.bin".to_string(),
            }
        );
    }

    #[test]
    fn test_accept_ranges_case_insensitive() {
        let map = headers(&[(ACCEPT_RANGES, "Bytes"), (CONTENT_LENGTH, "1")]);
        assert!(metadata_from_headers(URL, &map).is_ok());
    }

    #[test]
    fn test_accept_ranges_must_match_exactly() {
        for value in ["none", "bytes, other", "xbytes", "bytesx"] {
            let map = headers(&[(ACCEPT_RANGES, value), (CONTENT_LENGTH, "10")]);
            assert!(
                matches!(
                    metadata_from_headers(URL, &map),
                    Err(DownloadError::RangeUnsupported { .. })
                ),
                "{value:?} should not count as range support"
            );
        }
    }

    #[test]
    fn test_missing_accept_ranges() {
        let map = headers(&[(CONTENT_LENGTH, "10")]);
        assert!(matches!(
            metadata_from_headers(URL, &map),
            Err(DownloadError::RangeUnsupported { .. })
        ));
    }

    #[test]
    fn test_missing_or_bad_content_length() {
        let map = headers(&[(ACCEPT_RANGES, "bytes")]);
        assert!(matches!(
            metadata_from_headers(URL, &map),
            Err(DownloadError::MissingContentLength { .. })
        ));

        let map = headers(&[(ACCEPT_RANGES, "bytes"), (CONTENT_LENGTH, "ten")]);
        assert!(matches!(
            metadata_from_headers(URL, &map),
            Err(DownloadError::MissingContentLength { .. })
        ));
    }

    #[test]
    fn test_absent_disposition_uses_date() {
        let map = headers(&[(ACCEPT_RANGES, "bytes"), (CONTENT_LENGTH, "10")]);
        let metadata = metadata_from_headers(URL, &map).unwrap();

        let name = metadata.filename;
        assert_eq!(name.len(), 10, "{name}");
        assert_eq!(&name[4..5], "-");
        assert_eq!(&name[7..8], "-");
        assert!(
            name.chars()
                .filter(|c| *c != '-')
                .all(|c| c.is_ascii_digit())
        );
    }

    #[test]
    fn test_malformed_disposition() {
        let map = headers(&[
            (ACCEPT_RANGES, "bytes"),
            (CONTENT_LENGTH, "10"),
            (CONTENT_DISPOSITION, "attachment; filename=\"broken"),
        ]);
        assert!(matches!(
            metadata_from_headers(URL, &map),
            Err(DownloadError::MalformedDisposition { .. })
        ));
    }
}
