//! Response descriptors produced by the router and consumed by the writer.

use crate::http::types::StatusCode;
use std::fs::File;

/// Payload of a response.
///
/// A response carries either bytes it owns or an open file, never both.
/// Dropping the descriptor frees the bytes or closes the file, once.
#[derive(Debug)]
pub enum Body {
    /// In-memory body. An empty vector is a valid empty body.
    Owned(Vec<u8>),
    /// Regular file streamed to the socket by the kernel.
    File {
        file: File,
        /// Size taken from `fstat` when the file was opened.
        size: u64,
    },
}

impl Body {
    #[inline(always)]
    pub const fn empty() -> Self {
        Body::Owned(Vec::new())
    }

    /// Number of bytes announced in `Content-Length`.
    #[inline]
    pub fn len(&self) -> u64 {
        match self {
            Body::Owned(bytes) => bytes.len() as u64,
            Body::File { size, .. } => *size,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    pub const fn is_file(&self) -> bool {
        matches!(self, Body::File { .. })
    }
}

/// Everything the writer needs to put one response on the wire.
///
/// # Examples
/// ```
/// use rooted_web::{ResponseDescriptor, StatusCode};
///
/// let resp = ResponseDescriptor::text(StatusCode::Ok, b"Hello").keep_alive(false);
///
/// assert_eq!(resp.status(), StatusCode::Ok);
/// assert_eq!(resp.content_length(), 5);
/// assert!(resp.should_close());
/// ```
#[derive(Debug)]
pub struct ResponseDescriptor {
    pub(crate) status: StatusCode,
    pub(crate) content_type: Option<&'static str>,
    pub(crate) body: Body,
    pub(crate) should_close: bool,
}

impl ResponseDescriptor {
    #[inline]
    pub const fn new(status: StatusCode, body: Body) -> Self {
        Self {
            status,
            content_type: None,
            body,
            should_close: false,
        }
    }

    /// Response without a body and without `Content-Type`.
    #[inline]
    pub const fn empty(status: StatusCode) -> Self {
        Self::new(status, Body::empty())
    }

    /// `text/plain` response holding an owned copy of `body`.
    ///
    /// If the copy cannot be allocated the response becomes
    /// [`internal_error`](Self::internal_error).
    pub fn text(status: StatusCode, body: &[u8]) -> Self {
        let mut owned = Vec::new();
        if owned.try_reserve_exact(body.len()).is_err() {
            tracing::error!(size = body.len(), "response body allocation failed");
            return Self::internal_error();
        }
        owned.extend_from_slice(body);

        Self::new(status, Body::Owned(owned)).content_type("text/plain")
    }

    /// File-backed response. `size` is announced as `Content-Length`.
    #[inline]
    pub const fn file(file: File, size: u64, content_type: &'static str) -> Self {
        Self {
            status: StatusCode::Ok,
            content_type: Some(content_type),
            body: Body::File { file, size },
            should_close: false,
        }
    }

    /// `500` with an empty body.
    #[inline]
    pub const fn internal_error() -> Self {
        Self::empty(StatusCode::InternalServerError)
    }

    #[inline]
    pub fn content_type(mut self, value: &'static str) -> Self {
        self.content_type = Some(value);
        self
    }

    /// Sets `Connection: keep-alive` when `true`, `Connection: close` otherwise.
    #[inline]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.should_close = !keep_alive;
        self
    }
}

// Accessors
impl ResponseDescriptor {
    #[inline(always)]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[inline(always)]
    pub const fn status_text(&self) -> &'static str {
        self.status.reason()
    }

    #[inline(always)]
    pub const fn get_content_type(&self) -> Option<&'static str> {
        self.content_type
    }

    #[inline(always)]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    #[inline(always)]
    pub fn content_length(&self) -> u64 {
        self.body.len()
    }

    #[inline(always)]
    pub const fn should_close(&self) -> bool {
        self.should_close
    }
}
