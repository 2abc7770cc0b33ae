use crate::{errors::ErrorKind, limits::ReqLimits};
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::sleep,
};

/// Growable read buffer owned by a single connection.
///
/// ```text
/// 0            parse_offset        read_offset         storage.len()
/// [ consumed   | pending requests   | free              ]
/// ```
///
/// `parse_offset <= read_offset <= storage.len()` holds after every call.
/// Bytes before `parse_offset` belong to requests that were already answered
/// and are dropped by [`shift`](Self::shift).
#[derive(Debug)]
pub(crate) struct ConnectionBuffer {
    storage: Vec<u8>,
    read_offset: usize,
    parse_offset: usize,
    max_size: usize,
}

impl ConnectionBuffer {
    #[inline]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        let initial = limits.initial_buffer_size.clamp(1, limits.max_request_size.max(1));

        Self {
            storage: vec![0; initial],
            read_offset: 0,
            parse_offset: 0,
            max_size: limits.max_request_size,
        }
    }

    /// Reads once from `stream` into the free tail, growing a full buffer first.
    ///
    /// Returns the number of bytes read; `0` means the peer closed its side.
    /// Fails with [`ErrorKind::RequestTimeout`] when nothing arrives in time
    /// and with [`ErrorKind::HeaderTooLarge`] when a full buffer is already
    /// at its maximum size.
    pub(crate) async fn fill<S>(&mut self, stream: &mut S, time: Duration) -> Result<usize, ErrorKind>
    where
        S: AsyncRead + Unpin,
    {
        if self.read_offset == self.storage.len() {
            self.grow()?;
        }

        tokio::select! {
            biased;

            read_result = stream.read(&mut self.storage[self.read_offset..]) => {
                let n = read_result?;
                self.read_offset += n;
                Ok(n)
            }
            _ = sleep(time) => Err(ErrorKind::RequestTimeout),
        }
    }

    /// Bytes received but not yet consumed by a request.
    #[inline(always)]
    pub(crate) fn unparsed(&self) -> &[u8] {
        &self.storage[self.parse_offset..self.read_offset]
    }

    /// Marks the next `len` unparsed bytes as answered.
    #[inline]
    pub(crate) fn consume(&mut self, len: usize) {
        debug_assert!(self.parse_offset + len <= self.read_offset);
        self.parse_offset = (self.parse_offset + len).min(self.read_offset);
    }

    /// Makes room for a whole request of `total` bytes starting at the
    /// parse offset.
    ///
    /// Pending bytes are moved to the front first if that is not enough.
    pub(crate) fn reserve_request(&mut self, total: usize) -> Result<(), ErrorKind> {
        if total > self.max_size {
            return Err(ErrorKind::PayloadTooLarge);
        }
        if self.parse_offset + total <= self.storage.len() {
            return Ok(());
        }

        self.shift();
        if total > self.storage.len() {
            self.resize(total)?;
        }
        Ok(())
    }

    /// Moves the pending bytes to the front of the storage.
    #[inline]
    pub(crate) fn shift(&mut self) {
        if self.parse_offset == 0 {
            return;
        }

        self.storage.copy_within(self.parse_offset..self.read_offset, 0);
        self.read_offset -= self.parse_offset;
        self.parse_offset = 0;
    }

    #[inline]
    fn grow(&mut self) -> Result<(), ErrorKind> {
        let current = self.storage.len();
        if current >= self.max_size {
            return Err(ErrorKind::HeaderTooLarge);
        }

        let target = current.saturating_mul(2).min(self.max_size);
        tracing::debug!(from = current, to = target, "growing connection buffer");
        self.resize(target)
    }

    #[inline]
    fn resize(&mut self, target: usize) -> Result<(), ErrorKind> {
        let additional = target.saturating_sub(self.storage.len());
        self.storage
            .try_reserve_exact(additional)
            .map_err(|_| ErrorKind::OutOfMemory)?;
        self.storage.resize(target, 0);
        Ok(())
    }
}
