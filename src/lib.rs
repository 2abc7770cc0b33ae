//! rooted_web - HTTP/1.1 server with a sandboxed static root
//!
//! Accepts raw TCP streams, parses pipelined HTTP/1.1 requests out of a
//! bounded, growable per-connection buffer and answers them either from a
//! small fixed API or from a directory of static files.
//!
//! # Routes
//!
//! | Method | Path                  | Response                                    |
//! |--------|-----------------------|---------------------------------------------|
//! | `GET`  | `/api`, `/api/`       | `200`, `Hello`                              |
//! | `POST` | `/api/echo`           | `200`, the request body                     |
//! | `GET`  | any other `/api/...`  | `404`, `Route Not Found`                    |
//! | other  | `/api/...`            | `405`                                       |
//! | `GET`  | anything else         | file below the served root, `/` is `index.html` |
//! | other  | anything else         | `405`                                       |
//!
//! # Safety of the served root
//!
//! Paths are percent-decoded first and normalized second, so `%2e%2e` is
//! seen as `..` before traversal is checked. A path rising above `/` is
//! rejected with `400`. Files are then opened relative to a directory handle
//! taken at startup, never relative to the working directory.
//!
//! # Limits
//!
//! Every request, header block and body included, must fit into
//! [`ReqLimits::max_request_size`](limits::ReqLimits::max_request_size).
//! Malformed requests are answered with an empty-bodied error response and
//! the connection is closed. See [`limits`] for all knobs.
//!
//! # Examples
//!
//! ```no_run
//! use rooted_web::{Server, StaticRoot, limits::ReqLimits};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     Server::builder()
//!         .listener(rooted_web::bind("127.0.0.1:8080".parse().unwrap(), 1024)?)
//!         .root(StaticRoot::open("public")?)
//!         .request_limits(ReqLimits {
//!             max_request_size: 64 * 1024,
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//!
//!     Ok(())
//! }
//! ```

pub(crate) mod http {
    pub(crate) mod path;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod router;
    pub(crate) mod static_files;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod buffer;
    pub(crate) mod connection;
    pub(crate) mod server_impl;
    pub(crate) mod writer;
}
pub(crate) mod errors;
pub mod limits;

pub use crate::{
    errors::{ErrorKind, IoError, SendError},
    http::{
        path::{normalize, percent_decode},
        request::{Header, RequestInfo},
        response::{Body, ResponseDescriptor},
        router::{handle, Route},
        static_files::{content_type, serve, StaticRoot},
        types::{Method, StatusCode},
    },
    server::server_impl::{bind, Server, ServerBuilder},
};

#[cfg(test)]
pub mod tools {
    use std::str::from_utf8;

    #[inline]
    pub fn str(value: Option<&[u8]>) -> Option<&str> {
        Some(from_utf8(value?).unwrap())
    }

    #[inline]
    pub fn str_op(value: &[u8]) -> &str {
        from_utf8(value).unwrap()
    }

    #[inline]
    pub fn str_2<'a>(value: (&'a [u8], &'a [u8])) -> (&'a str, &'a str) {
        (from_utf8(value.0).unwrap(), from_utf8(value.1).unwrap())
    }
}
