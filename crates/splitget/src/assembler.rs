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

use std::path::Path;

use bytes::Bytes;
use snafu::{OptionExt, ResultExt, ensure};
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};
use tracing::info;

use crate::{
    error::{DownloadError, SegmentMissingSnafu, WriteSnafu},
    types::{Segment, WrittenFile},
};

const WRITE_BUFFER: usize = 512 * 1024;

/// Concatenates fetched segments into the output file
pub struct Assembler;

impl Assembler {
    /// Write `segments` to `destination/filename` in index order.
    ///
    /// The file is created or truncated. A write error leaves whatever was
    /// already written on disk.
    pub async fn merge(
        segments: &[Segment],
        destination: &Path,
        filename: &str,
    ) -> Result<WrittenFile, DownloadError> {
        let parts = Self::ordered_data(segments)?;

        let path = destination.join(filename);
        let file = File::create(&path).await.context(WriteSnafu { path: &path })?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER, file);
        let mut size = 0u64;

        for data in parts {
            writer
                .write_all(data)
                .await
                .context(WriteSnafu { path: &path })?;
            size += data.len() as u64;
        }

        writer.flush().await.context(WriteSnafu { path: &path })?;
        writer
            .get_mut()
            .sync_all()
            .await
            .context(WriteSnafu { path: &path })?;

        info!(path = %path.display(), size, "assembled {} segments", segments.len());
        Ok(WrittenFile { path, size })
    }

    /// Every segment must be complete and sit at its own index
    fn ordered_data(segments: &[Segment]) -> Result<Vec<&Bytes>, DownloadError> {
        segments
            .iter()
            .enumerate()
            .map(|(position, segment)| {
                ensure!(
                    segment.index() == position,
                    SegmentMissingSnafu { index: position }
                );
                segment.data().context(SegmentMissingSnafu {
                    index: segment.index(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ByteRange;

    fn filled(index: usize, start: u64, data: &'static [u8]) -> Segment {
        let mut segment = Segment::new(index, ByteRange::new(start, start + data.len() as u64 - 1));
        segment.complete(Bytes::from_static(data));
        segment
    }

    #[tokio::test]
    async fn test_merge_writes_in_index_order() {
        let dir = tempfile::tempdir().unwrap();
        let segments = vec![
            filled(0, 0, b"hello "),
            filled(1, 6, b"segmented "),
            filled(2, 16, b"world"),
        ];

        let written = Assembler::merge(&segments, dir.path(), "out.txt")
            .await
            .unwrap();

        assert_eq!(written.path, dir.path().join("out.txt"));
        assert_eq!(written.size, 21);
        let content = tokio::fs::read(&written.path).await.unwrap();
        assert_eq!(content, b"hello segmented world");
    }

    #[tokio::test]
    async fn test_merge_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        tokio::fs::write(&path, vec![7u8; 4096]).await.unwrap();

        Assembler::merge(&[filled(0, 0, b"abc")], dir.path(), "out.bin")
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_merge_rejects_incomplete_segment_before_creating_file() {
        let dir = tempfile::tempdir().unwrap();
        let segments = vec![filled(0, 0, b"abc"), Segment::new(1, ByteRange::new(3, 5))];

        let result = Assembler::merge(&segments, dir.path(), "out.bin").await;

        assert!(matches!(
            result,
            Err(DownloadError::SegmentMissing { index: 1 })
        ));
        assert!(!dir.path().join("out.bin").exists());
    }

    #[tokio::test]
    async fn test_merge_rejects_out_of_order_segments() {
        let dir = tempfile::tempdir().unwrap();
        let segments = vec![filled(1, 3, b"def"), filled(0, 0, b"abc")];

        let result = Assembler::merge(&segments, dir.path(), "out.bin").await;

        assert!(matches!(
            result,
            Err(DownloadError::SegmentMissing { index: 0 })
        ));
    }

    #[tokio::test]
    async fn test_merge_into_missing_directory_is_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let result = Assembler::merge(&[filled(0, 0, b"abc")], &missing, "out.bin").await;

        assert!(matches!(result, Err(DownloadError::Write { .. })));
    }
}
