use std::{fmt::Write as _, io::Result, sync::Arc};

use chrono::{DateTime, FixedOffset};
use tokio_util::sync::CancellationToken;

use crate::{
    reader::ArchiveReader,
    segments::{ReadOutcome, Segments},
};

/// Zip file data, laid out from a [`Template`](crate::Template).
///
/// Only the metadata (headers and central directory) is kept in memory, entry content is
/// fetched from the entry sources on demand.
/// The archive is immutable and cheap to clone, reads at different offsets may run concurrently.
#[derive(Clone, Debug)]
pub struct Archive {
    segments: Arc<Segments>,
    fingerprint: [u8; 16],
    created: Option<DateTime<FixedOffset>>,
}

impl Archive {
    pub(crate) fn new(
        segments: Segments,
        fingerprint: [u8; 16],
        created: Option<DateTime<FixedOffset>>,
    ) -> Self {
        Archive {
            segments: Arc::new(segments),
            fingerprint,
            created,
        }
    }

    /// Size of the archive in bytes.
    pub fn size(&self) -> u64 {
        self.segments.size()
    }

    /// Reads archive data at `offset`.
    ///
    /// The cancellation token is passed to the sources of the entries this read touches.
    /// See [`Segments::read_at`] for the details.
    pub async fn read_at(
        &self,
        buf: &mut [u8],
        offset: u64,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome> {
        self.segments.read_at(buf, offset, cancel).await
    }

    /// MD5 of the archive metadata.
    ///
    /// Covers prefix size, all headers and the central directory, but not the entry content.
    pub fn fingerprint(&self) -> [u8; 16] {
        self.fingerprint
    }

    /// Fingerprint formatted as a quoted hex string, usable as an HTTP entity tag.
    pub fn etag(&self) -> String {
        let mut etag = String::with_capacity(34);
        etag.push('"');
        for byte in self.fingerprint {
            let _ = write!(etag, "{byte:02x}");
        }
        etag.push('"');
        etag
    }

    /// Creation time of the archive.
    ///
    /// This is the time set in the template, or the latest modification time of the entries.
    /// `None` for archives without entries and without explicit creation time.
    pub fn created(&self) -> Option<DateTime<FixedOffset>> {
        self.created
    }

    /// Returns a new sequential reader positioned at the start of the archive.
    pub fn reader(&self) -> ArchiveReader {
        ArchiveReader::new(self.clone())
    }
}
