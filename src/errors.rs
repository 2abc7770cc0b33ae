use crate::StatusCode;
use std::{error, fmt, io};

/// Reasons a request is rejected before a handler ever sees it.
///
/// Every variant maps to a fixed status code (see [`ErrorKind::status`]).
/// The response sent for any of them has an empty body and closes the
/// connection.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// Request line without both separators, or with an empty method.
    BadRequestLine,
    /// Header line without a colon, with an empty name or an empty value.
    BadHeaderSyntax,
    /// Version other than the literal `HTTP/1.1`.
    InvalidVersion,
    /// Non-numeric, overflowing or repeated `Content-Length`.
    InvalidContentLength,
    /// `GET`/`HEAD` request announcing a body.
    BodyNotAllowed,
    /// Request line directly followed by the blank line.
    MissingRequiredHeaders,
    /// Any `Transfer-Encoding` header.
    UnsupportedTransferEncoding,
    /// Maps to `405`. Never raised while parsing: an unknown method still
    /// parses, and the router answers it with an ordinary `405` response
    /// rather than a rejection.
    UnsupportedMethod,
    /// Header block does not fit into the maximum request size.
    HeaderTooLarge,
    /// More header lines than [`ReqLimits::header_count`](crate::limits::ReqLimits::header_count).
    TooManyHeaders,
    /// Header block plus declared body exceed the maximum request size.
    PayloadTooLarge,
    /// No bytes arrived before the read deadline.
    RequestTimeout,
    /// Malformed percent-encoding or a path rising above the served root.
    BadRequestPath,

    /// The connection buffer could not be grown.
    OutOfMemory,
    /// The admission queue is full.
    ServiceUnavailable,
    Io(IoError),
}

macro_rules! http_errors {
    ($($name:ident: $status:ident => $line:literal;)*) => {
        /// Returns the status code sent for this error.
        pub const fn status(&self) -> StatusCode {
            match self { $(
                Self::$name { .. } => StatusCode::$status,
            )* }
        }

        pub(crate) const fn as_http(&self) -> &'static [u8] {
            match self { $(
                Self::$name { .. } => concat!(
                    "HTTP/1.1 ", $line, "\r\n",
                    "Content-Length: 0\r\n",
                    "Connection: close\r\n\r\n",
                ),
            )* }.as_bytes()
        }
    };
}

impl ErrorKind {
    http_errors! {
        BadRequestLine: BadRequest => "400 Bad Request";
        BadHeaderSyntax: BadRequest => "400 Bad Request";
        InvalidVersion: HttpVersionNotSupported => "505 HTTP Version Not Supported";
        InvalidContentLength: BadRequest => "400 Bad Request";
        BodyNotAllowed: BadRequest => "400 Bad Request";
        MissingRequiredHeaders: BadRequest => "400 Bad Request";
        UnsupportedTransferEncoding: NotImplemented => "501 Not Implemented";
        UnsupportedMethod: MethodNotAllowed => "405 Method Not Allowed";
        HeaderTooLarge: RequestHeaderFieldsTooLarge => "431 Request Header Fields Too Large";
        TooManyHeaders: BadRequest => "400 Bad Request";
        PayloadTooLarge: PayloadTooLarge => "413 Payload Too Large";
        RequestTimeout: RequestTimeout => "408 Request Timeout";
        BadRequestPath: BadRequest => "400 Bad Request";

        OutOfMemory: InternalServerError => "500 Internal Server Error";
        ServiceUnavailable: ServiceUnavailable => "503 Service Unavailable";
        Io: ServiceUnavailable => "503 Service Unavailable";
    }
}

impl error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => ErrorKind::RequestTimeout,
            _ => ErrorKind::Io(IoError(err)),
        }
    }
}

#[derive(Debug)]
pub struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

/// Transport failure while a response was on its way out.
///
/// Each variant names the phase that failed, so the connection loop can
/// report where the response was cut off.
#[derive(Debug)]
pub enum SendError {
    /// Status line and headers could not be sent; no body was attempted.
    Header(io::Error),
    /// The in-memory body could not be sent.
    Body(io::Error),
    /// Streaming the file failed or the file ended early.
    File(io::Error),
}

impl SendError {
    pub const fn phase(&self) -> &'static str {
        match self {
            SendError::Header(_) => "header",
            SendError::Body(_) => "body",
            SendError::File(_) => "file",
        }
    }
}

impl error::Error for SendError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            SendError::Header(e) | SendError::Body(e) | SendError::File(e) => Some(e),
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Header(e) | SendError::Body(e) | SendError::File(e) => {
                write!(f, "{} send failed: {}", self.phase(), e)
            }
        }
    }
}
