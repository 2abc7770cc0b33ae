//! Putting response descriptors on the wire.

use crate::{
    errors::{ErrorKind, SendError},
    http::response::{Body, ResponseDescriptor},
    limits::{ConnLimits, RespLimits},
};
use std::{fs::File, io, io::Write as _, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

/// Renders the status line and header block of `resp`, blank line included.
pub(crate) fn render_head(resp: &ResponseDescriptor, out: &mut Vec<u8>) {
    out.clear();
    out.extend_from_slice(resp.status.first_line());

    // Writing into a `Vec` cannot fail.
    let _ = write!(out, "Content-Length: {}\r\n", resp.content_length());
    if let Some(content_type) = resp.content_type {
        let _ = write!(out, "Content-Type: {content_type}\r\n");
    }

    let connection: &[u8] = match resp.should_close {
        true => b"Connection: close\r\n\r\n",
        false => b"Connection: keep-alive\r\n\r\n",
    };
    out.extend_from_slice(connection);
}

/// Writes all of `bytes`, resuming after short writes and interrupts.
///
/// Each individual write must finish within `time`.
pub(crate) async fn send_all<S>(stream: &mut S, bytes: &[u8], time: Duration) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut offset = 0;

    while offset < bytes.len() {
        match timeout(time, stream.write(&bytes[offset..])).await {
            Ok(Ok(0)) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(Ok(n)) => offset += n,
            Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(io::Error::new(io::ErrorKind::TimedOut, "write timeout")),
        }
    }

    Ok(())
}

/// Sends `resp` and releases its body.
///
/// The descriptor is consumed: its bytes are freed or its file closed when
/// this returns, whichever phase failed.
pub(crate) async fn write_response(
    stream: &mut TcpStream,
    resp: ResponseDescriptor,
    head: &mut Vec<u8>,
    conn_limits: &ConnLimits,
    resp_limits: &RespLimits,
) -> Result<(), SendError> {
    let time = conn_limits.socket_write_timeout;

    render_head(&resp, head);
    send_all(stream, head, time)
        .await
        .map_err(SendError::Header)?;

    match &resp.body {
        Body::Owned(bytes) if bytes.is_empty() => Ok(()),
        Body::Owned(bytes) => send_all(stream, bytes, time).await.map_err(SendError::Body),
        Body::File { file, size } => {
            send_file(stream, file, *size, resp_limits.file_chunk_size, time)
                .await
                .map_err(SendError::File)
        }
    }
}

/// Sends the canned response for a rejected request.
#[inline]
pub(crate) async fn send_error<S>(stream: &mut S, error: &ErrorKind, time: Duration) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    send_all(stream, error.as_http(), time).await
}

/// Shuts the write side down and drains whatever the client still sends,
/// for at most `linger`.
pub(crate) async fn close_gracefully(stream: &mut TcpStream, linger: Duration) {
    if stream.shutdown().await.is_err() {
        return;
    }

    let mut sink = [0u8; 1024];
    let _ = timeout(linger, async {
        while let Ok(n) = stream.read(&mut sink).await {
            if n == 0 {
                break;
            }
        }
    })
    .await;
}

fn short_file(sent: u64, size: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("file ended after {sent} of {size} bytes"),
    )
}

/// Streams `size` bytes of `file` with `sendfile(2)`, at most `chunk` bytes
/// per call.
#[cfg(target_os = "linux")]
async fn send_file(
    stream: &TcpStream,
    file: &File,
    size: u64,
    chunk: usize,
    time: Duration,
) -> io::Result<()> {
    use std::os::fd::AsRawFd;
    use tokio::io::Interest;

    let socket_fd = stream.as_raw_fd();
    let file_fd = file.as_raw_fd();
    let chunk = chunk.max(1);

    let mut offset: libc::off_t = 0;
    let mut sent: u64 = 0;

    while sent < size {
        let count = usize::try_from(size - sent).unwrap_or(usize::MAX).min(chunk);

        match timeout(time, stream.writable()).await {
            Ok(ready) => ready?,
            Err(_) => return Err(io::Error::new(io::ErrorKind::TimedOut, "write timeout")),
        }

        let result = stream.try_io(Interest::WRITABLE, || {
            // SAFETY: both descriptors stay open for the duration of the call
            // and `offset` is a valid, exclusively borrowed `off_t`.
            let n = unsafe { libc::sendfile(socket_fd, file_fd, &mut offset, count) };
            match n {
                n if n < 0 => Err(io::Error::last_os_error()),
                n => Ok(n as usize),
            }
        });

        match result {
            Ok(0) => return Err(short_file(sent, size)),
            Ok(n) => sent += n as u64,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Streams `size` bytes of `file` through a buffer of at most `chunk` bytes.
#[cfg(not(target_os = "linux"))]
async fn send_file(
    stream: &mut TcpStream,
    file: &File,
    size: u64,
    chunk: usize,
    time: Duration,
) -> io::Result<()> {
    use std::io::Read;

    let mut buf = vec![0; chunk.max(1)];
    let mut reader = file;
    let mut sent: u64 = 0;

    while sent < size {
        let want = usize::try_from(size - sent).unwrap_or(usize::MAX).min(buf.len());
        let n = match reader.read(&mut buf[..want]) {
            Ok(0) => return Err(short_file(sent, size)),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        send_all(stream, &buf[..n], time).await?;
        sent += n as u64;
    }

    Ok(())
}
