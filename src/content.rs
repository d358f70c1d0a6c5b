use std::{fs::File, io::Result, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

/// Random access to a byte range with support for cancellation.
///
/// This is the interface for everything that backs a part of an archive: entry content,
/// archive prefix and the in-memory headers.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Reads data starting at `offset` into `buf`.
    ///
    /// Must fill the whole buffer, unless the source ends before that. Returning fewer bytes than
    /// requested means that the end of the source was reached.
    /// The cancellation token belongs to the read that caused this call; a source that supports it
    /// should stop waiting and return an error once it is cancelled.
    async fn read_at(&self, buf: &mut [u8], offset: u64, cancel: &CancellationToken)
        -> Result<usize>;
}

#[async_trait]
impl<T: ContentSource + ?Sized> ContentSource for Arc<T> {
    async fn read_at(
        &self,
        buf: &mut [u8],
        offset: u64,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        self.as_ref().read_at(buf, offset, cancel).await
    }
}

/// Plain positional reads without cancellation.
///
/// Has the same contract as [`ContentSource::read_at`]: only a short read at the end of the
/// data may return fewer bytes than requested.
/// Wrap implementations in [`IgnoreCancellation`] to use them as content.
pub trait ReadAt: Send + Sync {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize>;
}

/// Adapter that turns a [`ReadAt`] into a [`ContentSource`], dropping the cancellation token.
/// The wrapped reads are treated as immediate.
#[derive(Clone, Debug, Default)]
pub struct IgnoreCancellation<R>(R);

impl<R: ReadAt> IgnoreCancellation<R> {
    pub fn new(inner: R) -> Self {
        IgnoreCancellation(inner)
    }

    pub fn get_ref(&self) -> &R {
        &self.0
    }

    pub fn into_inner(self) -> R {
        self.0
    }
}

#[async_trait]
impl<R: ReadAt> ContentSource for IgnoreCancellation<R> {
    async fn read_at(
        &self,
        buf: &mut [u8],
        offset: u64,
        _cancel: &CancellationToken,
    ) -> Result<usize> {
        self.0.read_at(buf, offset)
    }
}

fn read_slice_at(data: &[u8], buf: &mut [u8], offset: u64) -> usize {
    let Ok(start) = usize::try_from(offset) else {
        return 0;
    };
    let Some(available) = data.get(start..) else {
        return 0;
    };
    let n = buf.len().min(available.len());
    buf[..n].copy_from_slice(&available[..n]);
    n
}

impl ReadAt for Bytes {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        Ok(read_slice_at(self, buf, offset))
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        Ok(read_slice_at(self, buf, offset))
    }
}

impl ReadAt for &'static [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        Ok(read_slice_at(self, buf, offset))
    }
}

/// Positional reads from a file. Does not move the file cursor on unix.
/// The read blocks the calling thread.
impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = match read_file_at(self, &mut buf[filled..], offset + filled as u64) {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

#[cfg(unix)]
fn read_file_at(file: &File, buf: &mut [u8], offset: u64) -> Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(windows)]
fn read_file_at(file: &File, buf: &mut [u8], offset: u64) -> Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}
