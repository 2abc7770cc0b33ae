use crate::{
    errors::ErrorKind,
    limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits, WaitStrategy},
    server::{connection::HttpConnection, writer},
    StaticRoot,
};
use crossbeam::queue::SegQueue;
use socket2::{Domain, Protocol, Socket, Type};
use std::{io, net::SocketAddr, sync::Arc};
use tokio::{
    net::{TcpListener, TcpStream},
    task::yield_now,
    time::sleep as tokio_sleep,
};

/// Creates a non-blocking listener with `SO_REUSEADDR` and an explicit
/// accept backlog.
///
/// Must be called from within a Tokio runtime.
///
/// # Examples
/// ```no_run
/// # #[tokio::main]
/// # async fn main() -> std::io::Result<()> {
/// let listener = rooted_web::bind("127.0.0.1:8080".parse().unwrap(), 1024)?;
/// # Ok(())
/// # }
/// ```
pub fn bind(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    TcpListener::from_std(socket.into())
}

/// HTTP server accepting connections and handing them to a fixed pool of
/// workers.
///
/// Every worker serves one connection at a time in a task of its own, so a
/// panic while serving a request ends that connection only. Connections that
/// cannot be queued are answered with `503 Service Unavailable`.
///
/// # Examples
/// ```no_run
/// use rooted_web::{Server, StaticRoot};
/// use tokio::net::TcpListener;
///
/// #[tokio::main]
/// async fn main() {
///     Server::builder()
///         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
///         .root(StaticRoot::open("public").unwrap())
///         .build()
///         .launch()
///         .await;
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    stream_queue: TcpQueue,
    error_queue: TcpQueue,
    server_limits: ServerLimits,
}

impl Server {
    /// Creates a new [`ServerBuilder`] instance.
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            listener: None,
            root: None,

            server_limits: None,
            connection_limits: None,
            request_limits: None,
            response_limits: None,
        }
    }

    /// Accepts connections forever.
    ///
    /// Accept errors (for example running out of descriptors) are logged and
    /// the loop carries on.
    #[inline]
    pub async fn launch(self) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, workers = self.server_limits.max_connections, "listening");
        }

        loop {
            let value = match self.listener.accept().await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };

            match self.stream_queue.len() < self.server_limits.max_pending_connections {
                true => self.stream_queue.push(value),
                false => self.error_queue.push(value),
            }
        }
    }

    #[inline]
    async fn get_stream(queue: &TcpQueue, wait: &WaitStrategy) -> (TcpStream, SocketAddr) {
        loop {
            if let Some(value) = queue.pop() {
                return value;
            }

            match wait {
                WaitStrategy::Yield => yield_now().await,
                WaitStrategy::Sleep(time) => tokio_sleep(*time).await,
            }
        }
    }
}

/// Builder for [`Server`].
///
/// [`listener`](Self::listener) and [`root`](Self::root) are required, every
/// limit falls back to its `Default`.
pub struct ServerBuilder {
    listener: Option<TcpListener>,
    root: Option<Arc<StaticRoot>>,

    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
    request_limits: Option<ReqLimits>,
    response_limits: Option<RespLimits>,
}

impl ServerBuilder {
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Directory static files are served from.
    #[inline(always)]
    pub fn root(mut self, root: StaticRoot) -> Self {
        self.root = Some(Arc::new(root));
        self
    }

    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.response_limits = Some(limits);
        self
    }

    /// Spawns the workers and `503` handlers and returns the server.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Panics
    /// When [`listener`](Self::listener) or [`root`](Self::root) was not set.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        let (listener, root, limits) = self.get_all_parts();

        let stream_queue = Arc::new(SegQueue::new());
        let error_queue = Arc::new(SegQueue::new());

        for _ in 0..limits.0.max_connections {
            Self::spawn_worker(&stream_queue, &limits, &root);
        }
        if limits.0.count_503_handlers != 0 {
            for _ in 0..limits.0.count_503_handlers {
                Self::spawn_alarmist(&error_queue, &limits);
            }
        } else {
            Self::spawn_quiet_alarmist(&error_queue, &limits);
        }

        Server {
            listener,
            stream_queue,
            error_queue,
            server_limits: limits.0,
        }
    }

    #[inline]
    fn spawn_worker(queue: &TcpQueue, limits: &AllLimits, root: &Arc<StaticRoot>) {
        let queue = queue.clone();
        let root = root.clone();
        let (server_limits, conn_limits, req_limits, resp_limits) = limits.clone();

        tokio::spawn(async move {
            loop {
                let (mut stream, addr) =
                    Server::get_stream(&queue, &server_limits.wait_strategy).await;

                let mut conn = HttpConnection::new(
                    root.clone(),
                    conn_limits.clone(),
                    req_limits.clone(),
                    resp_limits.clone(),
                );
                let task = tokio::spawn(async move {
                    if let Err(e) = conn.run(&mut stream).await {
                        tracing::debug!(%addr, error = %e, "connection ended with i/o error");
                    }
                });

                if let Err(e) = task.await {
                    tracing::error!(%addr, error = %e, "connection task failed");
                }
            }
        });
    }

    #[inline]
    fn spawn_alarmist(queue: &TcpQueue, limits: &AllLimits) {
        let queue = queue.clone();
        let (server_limits, conn_limits, ..) = limits.clone();

        tokio::spawn(async move {
            loop {
                let (mut stream, addr) =
                    Server::get_stream(&queue, &server_limits.wait_strategy).await;

                tracing::warn!(%addr, "queue full, answering 503");
                let _ = writer::send_error(
                    &mut stream,
                    &ErrorKind::ServiceUnavailable,
                    conn_limits.socket_write_timeout,
                )
                .await;
                writer::close_gracefully(&mut stream, conn_limits.linger_timeout).await;
            }
        });
    }

    #[inline]
    fn spawn_quiet_alarmist(queue: &TcpQueue, limits: &AllLimits) {
        let queue = queue.clone();
        let (server_limits, ..) = limits.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = Server::get_stream(&queue, &server_limits.wait_strategy).await;

                drop(stream);
            }
        });
    }

    #[inline]
    #[track_caller]
    fn get_all_parts(self) -> (TcpListener, Arc<StaticRoot>, AllLimits) {
        (
            self.listener
                .expect("The `listener` method must be called to create"),
            self.root
                .expect("The `root` method must be called to create"),
            (
                self.server_limits.unwrap_or_default(),
                self.connection_limits.unwrap_or_default(),
                self.request_limits.unwrap_or_default(),
                self.response_limits.unwrap_or_default(),
            ),
        )
    }
}

type TcpQueue = Arc<SegQueue<(TcpStream, SocketAddr)>>;
type AllLimits = (ServerLimits, ConnLimits, ReqLimits, RespLimits);
