use std::io::{Error, ErrorKind, Result};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::content::ContentSource;

fn copy_at(data: &[u8], buf: &mut [u8], offset: u64) -> usize {
    let start = (offset as usize).min(data.len());
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    n
}

/// Content source that reads only zeros, of any size.
#[derive(Clone, Debug)]
pub struct Zeros {
    size: u64,
}

impl Zeros {
    pub fn new(size: u64) -> Self {
        Zeros { size }
    }
}

#[async_trait]
impl ContentSource for Zeros {
    async fn read_at(
        &self,
        buf: &mut [u8],
        offset: u64,
        _cancel: &CancellationToken,
    ) -> Result<usize> {
        let remaining = self.size.saturating_sub(offset);
        let n = (buf.len() as u64).min(remaining) as usize;
        buf[..n].fill(0);
        Ok(n)
    }
}

/// Content source that yields to the runtime before every read.
#[derive(Clone, Debug)]
pub struct LazyReader {
    data: Vec<u8>,
}

impl From<&[u8]> for LazyReader {
    fn from(value: &[u8]) -> Self {
        LazyReader {
            data: value.to_vec(),
        }
    }
}

#[async_trait]
impl ContentSource for LazyReader {
    async fn read_at(
        &self,
        buf: &mut [u8],
        offset: u64,
        _cancel: &CancellationToken,
    ) -> Result<usize> {
        tokio::task::yield_now().await;
        Ok(copy_at(&self.data, buf, offset))
    }
}

/// Copies its data to the output, but then fails anyway.
#[derive(Clone, Debug)]
pub struct Failing {
    data: &'static [u8],
}

impl Failing {
    pub const MESSAGE: &'static str = "funky failure";

    pub fn new(data: &'static [u8]) -> Self {
        Failing { data }
    }
}

#[async_trait]
impl ContentSource for Failing {
    async fn read_at(
        &self,
        buf: &mut [u8],
        offset: u64,
        _cancel: &CancellationToken,
    ) -> Result<usize> {
        copy_at(self.data, buf, offset);
        Err(Error::other(Self::MESSAGE))
    }
}

/// Holds less data than it is registered with.
#[derive(Clone, Debug)]
pub struct ShortRead {
    data: &'static [u8],
}

impl ShortRead {
    pub fn new(data: &'static [u8]) -> Self {
        ShortRead { data }
    }
}

#[async_trait]
impl ContentSource for ShortRead {
    async fn read_at(
        &self,
        buf: &mut [u8],
        offset: u64,
        _cancel: &CancellationToken,
    ) -> Result<usize> {
        Ok(copy_at(self.data, buf, offset))
    }
}

/// Fails if the read it serves is already cancelled.
#[derive(Clone, Debug)]
pub struct CancellationCheck {
    data: &'static [u8],
}

impl CancellationCheck {
    pub fn new(data: &'static [u8]) -> Self {
        CancellationCheck { data }
    }
}

#[async_trait]
impl ContentSource for CancellationCheck {
    async fn read_at(
        &self,
        buf: &mut [u8],
        offset: u64,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        if cancel.is_cancelled() {
            return Err(Error::new(ErrorKind::Interrupted, "read cancelled"));
        }
        Ok(copy_at(self.data, buf, offset))
    }
}

/// Waits until either the read is cancelled (fails), or the source is released (succeeds).
#[derive(Clone, Debug)]
pub struct Stalled {
    data: &'static [u8],
    release: CancellationToken,
}

impl Stalled {
    pub fn new(data: &'static [u8]) -> Self {
        Stalled {
            data,
            release: CancellationToken::new(),
        }
    }

    /// Cancelling the returned token lets all waiting reads finish.
    pub fn release_token(&self) -> CancellationToken {
        self.release.clone()
    }
}

#[async_trait]
impl ContentSource for Stalled {
    async fn read_at(
        &self,
        buf: &mut [u8],
        offset: u64,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::new(ErrorKind::Interrupted, "read cancelled")),
            _ = self.release.cancelled() => Ok(copy_at(self.data, buf, offset)),
        }
    }
}

/// Panics when read. For entries whose content must never be touched.
#[derive(Clone, Debug)]
pub struct Unreadable;

#[async_trait]
impl ContentSource for Unreadable {
    async fn read_at(
        &self,
        _buf: &mut [u8],
        _offset: u64,
        _cancel: &CancellationToken,
    ) -> Result<usize> {
        unimplemented!("This test struct doesn't support reading")
    }
}
