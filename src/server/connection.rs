use crate::{
    errors::ErrorKind,
    http::{request::RequestInfo, response::ResponseDescriptor, router, types::log_str},
    limits::{ConnLimits, ReqLimits, RespLimits},
    server::{buffer::ConnectionBuffer, writer},
    StaticRoot,
};
use memchr::memmem;
use std::{io, sync::Arc};
use tokio::net::TcpStream;

/// State of one accepted connection.
///
/// Created when the connection is taken from the queue and dropped with it;
/// the only thing shared with other connections is the read-only root.
pub(crate) struct HttpConnection {
    root: Arc<StaticRoot>,
    buffer: ConnectionBuffer,
    head: Vec<u8>,

    conn_limits: ConnLimits,
    req_limits: ReqLimits,
    resp_limits: RespLimits,
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(
        root: Arc<StaticRoot>,
        conn_limits: ConnLimits,
        req_limits: ReqLimits,
        resp_limits: RespLimits,
    ) -> Self {
        Self {
            root,
            buffer: ConnectionBuffer::new(&req_limits),
            head: Vec::with_capacity(128),

            conn_limits,
            req_limits,
            resp_limits,
        }
    }
}

impl HttpConnection {
    /// Serves requests until the peer leaves, a response asks to close, or
    /// a request is rejected.
    pub(crate) async fn run(&mut self, stream: &mut TcpStream) -> Result<(), io::Error> {
        let result = match self.impl_run(stream).await {
            Ok(()) => Ok(()),
            Err(ErrorKind::Io(e)) => return Err(e.0),
            Err(err) => {
                tracing::warn!(
                    status = err.status().as_u16(),
                    error = %err,
                    "rejecting request"
                );
                writer::send_error(stream, &err, self.conn_limits.socket_write_timeout).await
            }
        };

        writer::close_gracefully(stream, self.conn_limits.linger_timeout).await;
        result
    }

    #[inline]
    pub(crate) async fn impl_run(&mut self, stream: &mut TcpStream) -> Result<(), ErrorKind> {
        loop {
            if self
                .buffer
                .fill(stream, self.conn_limits.socket_read_timeout)
                .await?
                == 0
            {
                return Ok(());
            }

            while let Some(response) = self.process_next()? {
                let should_close = response.should_close();

                if let Err(e) = writer::write_response(
                    stream,
                    response,
                    &mut self.head,
                    &self.conn_limits,
                    &self.resp_limits,
                )
                .await
                {
                    tracing::error!(phase = e.phase(), error = %e, "dropping connection");
                    return Ok(());
                }

                if should_close {
                    tracing::debug!("closing connection on request");
                    return Ok(());
                }
            }

            self.buffer.shift();
        }
    }

    /// Answers the next complete request in the buffer.
    ///
    /// Returns `None` when more bytes are needed, after making sure the
    /// buffer can hold the whole request once its size is known.
    pub(crate) fn process_next(&mut self) -> Result<Option<ResponseDescriptor>, ErrorKind> {
        let unparsed = self.buffer.unparsed();
        let Some(terminator) = memmem::find(unparsed, b"\r\n\r\n") else {
            return Ok(None);
        };
        let header_size = terminator + 4;

        let mut request = RequestInfo::parse(&unparsed[..terminator + 2], &self.req_limits)?;

        let total = header_size
            .checked_add(request.content_length())
            .filter(|&total| total <= self.req_limits.max_request_size)
            .ok_or(ErrorKind::PayloadTooLarge)?;

        if unparsed.len() < total {
            drop(request);
            self.buffer.reserve_request(total)?;
            return Ok(None);
        }

        request.extract_body(&unparsed[header_size..total]);
        request.resolve_path()?;

        let response = router::handle(&request, &self.root);
        tracing::info!(
            method = log_str(request.method_bytes()),
            path = log_str(request.normalized_path()),
            body = request.body().len(),
            status = response.status().as_u16(),
            "request"
        );

        drop(request);
        self.buffer.consume(total);
        Ok(Some(response))
    }
}
