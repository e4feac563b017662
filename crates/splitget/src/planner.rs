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

use snafu::ensure;

use crate::{
    error::{DownloadError, EmptyResourceSnafu, InvalidPartitionSnafu},
    types::{ByteRange, Segment},
};

/// Split `content_length` bytes into `parts` contiguous segments.
///
/// Every segment but the last spans `content_length / parts + 1` bytes and
/// the last one runs to the end of the resource, absorbing the remainder.
/// When that stride would leave later segments without bytes (for example
/// 10 bytes in 6 parts), a segment's end is pulled back just far enough that
/// each remaining segment keeps one byte. Only in that case do non-last
/// segments come out shorter than `content_length / parts + 1`; whenever the
/// plain stride fits, the layout is exactly the stride layout above.
pub fn plan(content_length: u64, parts: usize) -> Result<Vec<Segment>, DownloadError> {
    ensure!(content_length > 0, EmptyResourceSnafu);
    ensure!(
        parts > 0 && to_u64(parts) <= content_length,
        InvalidPartitionSnafu {
            parts,
            content_length,
        }
    );

    let size = content_length / to_u64(parts);
    let last = parts - 1;
    let mut segments = Vec::with_capacity(parts);
    let mut start = 0u64;

    for index in 0..parts {
        let end = if index == last {
            content_length - 1
        } else {
            let reserved = to_u64(last - index);
            (start + size).min(content_length - 1 - reserved)
        };
        segments.push(Segment::new(index, ByteRange::new(start, end)));
        start = end + 1;
    }

    Ok(segments)
}

fn to_u64(n: usize) -> u64 { u64::try_from(n).unwrap_or(u64::MAX) }
