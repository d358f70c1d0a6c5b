use std::{
    io::{Error as IoError, ErrorKind, Result, SeekFrom},
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::{future::BoxFuture, FutureExt as _};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};
use tokio_util::sync::CancellationToken;

use crate::{archive::Archive, Error};

/// Upper limit on the size of a single read from the archive.
const READ_SIZE: usize = 64 * 1024;

type PendingRead = BoxFuture<'static, Result<Vec<u8>>>;

/// Sequential reader over an [`Archive`], implementing `AsyncRead` and `AsyncSeek`.
///
/// All reads share one cancellation token, cancelling it makes the sources that support
/// cancellation abort the read in progress.
pub struct ArchiveReader {
    archive: Archive,
    position: u64,
    cancel: CancellationToken,
    pending: Option<PendingRead>,
}

impl ArchiveReader {
    pub(crate) fn new(archive: Archive) -> Self {
        ArchiveReader {
            archive,
            position: 0,
            cancel: CancellationToken::new(),
            pending: None,
        }
    }

    /// Return the total size of the file in bytes.
    pub fn size(&self) -> u64 {
        self.archive.size()
    }

    /// Return current position in the ZIP file in bytes.
    /// If not seeking, this is the number of bytes already read.
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Token passed to the entry sources on every read of this reader.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Archive this reader reads from.
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// Seeks to given offset from start of zip file.
    ///
    /// Always succeeds, seeking past end of file causes `tell()` to return the
    /// set offset and reads returning empty buffers (=EOF).
    pub fn seek_from_start(&mut self, offset: u64) {
        self.position = offset;
        self.pending = None;
    }

    fn start_read(&self, len: usize) -> PendingRead {
        let archive = self.archive.clone();
        let cancel = self.cancel.clone();
        let offset = self.position;
        async move {
            let mut buf = vec![0; len];
            let outcome = archive.read_at(&mut buf, offset, &cancel).await?;
            buf.truncate(outcome.bytes_read);
            Ok(buf)
        }
        .boxed()
    }
}

impl AsyncRead for ArchiveReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 || this.position >= this.archive.size() {
            return Poll::Ready(Ok(()));
        }

        let mut pending = match this.pending.take() {
            Some(pending) => pending,
            None => this.start_read(buf.remaining().min(READ_SIZE)),
        };
        let data = match pending.poll_unpin(cx) {
            Poll::Ready(result) => result?,
            Poll::Pending => {
                this.pending = Some(pending);
                return Poll::Pending;
            }
        };
        let n = data.len().min(buf.remaining());
        buf.put_slice(&data[..n]);
        this.position += n as u64;
        Poll::Ready(Ok(()))
    }
}

impl AsyncSeek for ArchiveReader {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> Result<()> {
        let resolve_offset = |base: u64, offset: i64| -> Result<u64> {
            if let Some(result) = base.checked_add_signed(offset) {
                Ok(result)
            } else if offset < 0 {
                Err(IoError::new(
                    ErrorKind::InvalidInput,
                    Error::SeekingBeforeStart,
                ))
            } else {
                Err(IoError::new(
                    ErrorKind::InvalidInput,
                    "seek position overflows u64",
                ))
            }
        };
        let pos = match position {
            SeekFrom::Start(pos) => pos,
            SeekFrom::Current(offset) => resolve_offset(self.tell(), offset)?,
            SeekFrom::End(offset) => resolve_offset(self.size(), offset)?,
        };

        self.get_mut().seek_from_start(pos);
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<u64>> {
        Poll::Ready(Ok(self.tell()))
    }
}

impl std::fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("archive", &self.archive)
            .field("position", &self.position)
            .field("read_pending", &self.pending.is_some())
            .finish_non_exhaustive()
    }
}

impl Clone for ArchiveReader {
    /// The clone gets its own cancellation token and no pending read.
    fn clone(&self) -> Self {
        let mut cloned = ArchiveReader::new(self.archive.clone());
        cloned.seek_from_start(self.tell());
        cloned
    }
}
