use std::{
    fmt,
    io::{Error, ErrorKind, Result},
    sync::Arc,
};

use tokio_util::sync::CancellationToken;

use crate::content::ContentSource;

/// Result of a positional read from a composed range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Number of bytes written to the start of the buffer.
    pub bytes_read: usize,
    /// The read hit the end of the data before the buffer could be filled.
    pub end_of_data: bool,
}

#[derive(Clone)]
struct Segment {
    /// Offset of the segment start within the whole range
    offset: u64,
    /// Offset one past the last byte of the segment
    end: u64,
    source: Arc<dyn ContentSource>,
}

/// Concatenation of independently backed byte ranges into a single random access range.
///
/// Segments can only be appended, each one starts where the previous one ended.
#[derive(Clone, Default)]
pub struct Segments {
    segments: Vec<Segment>,
    size: u64,
}

impl Segments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a segment of `len` bytes backed by `source`.
    /// Zero length segments are dropped.
    ///
    /// # Errors
    /// Fails with [`crate::Error::ArchiveTooLarge`] if the total size would not fit into `u64`,
    /// the segments are left unchanged in that case.
    pub fn push(
        &mut self,
        source: Arc<dyn ContentSource>,
        len: u64,
    ) -> std::result::Result<(), crate::Error> {
        if len == 0 {
            return Ok(());
        }
        let offset = self.size;
        let end = offset
            .checked_add(len)
            .ok_or(crate::Error::ArchiveTooLarge { offset, len })?;
        self.size = end;
        self.segments.push(Segment {
            offset,
            end,
            source,
        });
        Ok(())
    }

    /// Total size of all segments.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of non-empty segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Reads data from the composed range at `offset`.
    ///
    /// Reads that run past the end of the range return the available data with `end_of_data` set.
    /// A segment source failing, or ending before its declared length, aborts the read with an
    /// error. The cancellation token is passed to every segment source involved.
    pub async fn read_at(
        &self,
        buf: &mut [u8],
        offset: u64,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome> {
        if buf.is_empty() {
            return Ok(ReadOutcome {
                bytes_read: 0,
                end_of_data: false,
            });
        }
        if offset >= self.size {
            return Ok(ReadOutcome {
                bytes_read: 0,
                end_of_data: true,
            });
        }

        let first = self.segments.partition_point(|segment| segment.end <= offset);
        let mut bytes_read = 0;

        for (i, segment) in self.segments[first..].iter().enumerate() {
            if bytes_read == buf.len() {
                break;
            }
            let segment_start = if i == 0 { offset - segment.offset } else { 0 };
            let segment_remaining = segment.end - segment.offset - segment_start;
            let to_read = (buf.len() - bytes_read)
                .min(usize::try_from(segment_remaining).unwrap_or(usize::MAX));

            let target = &mut buf[bytes_read..bytes_read + to_read];
            let n = segment.source.read_at(target, segment_start, cancel).await?;
            if n < to_read {
                return Err(Error::new(
                    ErrorKind::UnexpectedEof,
                    format!(
                        "segment at offset {} ended after {} of {} B",
                        segment.offset,
                        segment_start + n as u64,
                        segment.end - segment.offset
                    ),
                ));
            }
            bytes_read += n;
        }

        Ok(ReadOutcome {
            bytes_read,
            end_of_data: bytes_read < buf.len(),
        })
    }
}

impl fmt::Debug for Segments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segments")
            .field("segment_count", &self.segments.len())
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
