//! Web server configuration limits and timeouts
//!
//! # Security-First Defaults
//!
//! Default limits are intentionally conservative to prevent:
//! - Resource exhaustion attacks
//! - Unbounded buffer growth
//! - Slowloris attacks
//! - Header flooding
//!
//! # Memory Consumption
//!
//! Each active connection starts with
//! [`initial_buffer_size`](ReqLimits::initial_buffer_size) bytes and may grow
//! up to [`max_request_size`](ReqLimits::max_request_size). Static files are
//! streamed by the kernel and never buffered in user space.
//!
//! # Examples
//!
//! ```no_run
//! use rooted_web::{Server, StaticRoot, limits::{ConnLimits, ReqLimits, ServerLimits}};
//! use tokio::net::TcpListener;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
//!         .root(StaticRoot::open("public").unwrap())
//!         .server_limits(ServerLimits {
//!             max_connections: 500,
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             socket_read_timeout: Duration::from_secs(5),
//!             ..ConnLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             max_request_size: 64 * 1024,
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

use std::time::Duration;

/// Controls server-level concurrency and queueing.
///
/// # Connection management
/// ```text
///                            [------------]
///                            [ Tcp accept ]
///                            [------------]
///                                  ||
///                                  || TCP_STREAM
///                                  \/
/// [--------------]   Yes   /----------------\   No   [-------------]
/// [ Add to queue ] <====== | Queue if full? | =====> [ Sending 503 ]
/// [--------------]         \----------------/        [-------------]
///        ||
///        \==================\\          //====================\
///                            V          V                    ||
/// [---------]   Yes   /-------------------------\   No   [------]
/// [ Worker  ] <====== | Is there a free worker? | =====> [ Wait ]
/// [---------]         \-------------------------/        [------]
/// ```
///
/// # Worker
/// A worker is a long-running task created once in
/// [`ServerBuilder::build`](crate::ServerBuilder::build). For every stream it
/// takes from the queue it spawns a dedicated connection task and waits for
/// it. Nothing mutable is shared between connection tasks, and a panic inside
/// one of them ends only that connection.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of workers, i.e. connections processed at once (default: `100`).
    pub max_connections: usize,

    /// Maximum number of accepted connections waiting for a worker (default: `250`).
    ///
    /// When the queue is full, new connections receive an immediate `503`.
    pub max_pending_connections: usize,

    /// How workers wait while the queue is empty (default: `Sleep(50μs)`).
    pub wait_strategy: WaitStrategy,

    /// Tasks answering queue overflow with `503` (default: `1`).
    ///
    /// Set to 0 to silently close overflowing connections instead.
    pub count_503_handlers: usize,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 100,
            max_pending_connections: 250,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(50)),
            count_503_handlers: 1,
        }
    }
}

/// Strategy for worker task waiting when no connections are available
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// While waiting, uses [`tokio::task::yield_now()`]
    ///
    /// Keeps latency minimal at the price of a busy CPU.
    Yield,

    /// While waiting, uses [`tokio::time::sleep()`]
    Sleep(Duration),
}

/// Connection-level timeouts
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Deadline for every socket read (default: `10 seconds`)
    ///
    /// When it elapses the client receives `408 Request Timeout` and the
    /// connection is closed. This applies between keep-alive requests too.
    pub socket_read_timeout: Duration,

    /// Deadline for every individual socket write (default: `10 seconds`)
    pub socket_write_timeout: Duration,

    /// How long unread client bytes are drained after the write side has
    /// been shut down (default: `1 second`)
    ///
    /// Closing a socket with unread data resets the connection, and the
    /// peer may discard the final response along with it.
    pub linger_timeout: Duration,
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(10),
            socket_write_timeout: Duration::from_secs(10),
            linger_timeout: Duration::from_secs(1),
        }
    }
}

/// HTTP request parsing limits and buffer growth strategy
///
/// # Memory Allocation Strategy
///
/// ```text
/// accept -> [ initial_buffer_size ] -> grows on demand -> [ max_request_size ]
/// ```
///
/// The buffer is doubled while a header block is still incomplete and resized
/// to the exact request size once `Content-Length` is known. A header block
/// that does not fit into `max_request_size` is answered with `431`, a request
/// whose header block plus declared body exceeds it with `413`.
///
/// # Example
/// ```
/// use rooted_web::limits::ReqLimits;
///
/// let limits = ReqLimits::default();
/// assert!(limits.initial_buffer_size <= limits.max_request_size);
/// ```
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Buffer allocated per connection before anything is read (default: `4 KB`)
    pub initial_buffer_size: usize,

    /// Upper bound for request line + headers + body (default: `16 KB`)
    pub max_request_size: usize,

    /// Maximum number of header lines per request (default: `100 headers`)
    pub header_count: usize,
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            initial_buffer_size: 4 * 1024,
            max_request_size: 16 * 1024,
            header_count: 100,
        }
    }
}

/// Configuration for response serialization.
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Maximum number of file bytes handed to one `sendfile` call (default: `64 KB`)
    pub file_chunk_size: usize,
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            file_chunk_size: 64 * 1024,
        }
    }
}
