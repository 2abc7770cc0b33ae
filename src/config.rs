use std::{env, io, net::SocketAddr, path::PathBuf};

/// Startup settings read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// `ROOTED_ADDR`, default `0.0.0.0:8080`
    pub listen_addr: SocketAddr,
    /// `ROOTED_ROOT`, default `public`
    pub root: PathBuf,
    /// `ROOTED_BACKLOG`, default `1024`
    pub backlog: i32,
    /// `ROOTED_LOG`, default `info`
    pub log_level: tracing::Level,
}

impl Config {
    pub fn load() -> io::Result<Self> {
        let listen_addr = env::var("ROOTED_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|e| invalid("ROOTED_ADDR", e))?;
        let root = env::var("ROOTED_ROOT")
            .unwrap_or_else(|_| "public".to_string())
            .into();
        let backlog = env::var("ROOTED_BACKLOG")
            .unwrap_or_else(|_| "1024".to_string())
            .parse()
            .map_err(|e| invalid("ROOTED_BACKLOG", e))?;
        let log_level = env::var("ROOTED_LOG")
            .unwrap_or_else(|_| "info".to_string())
            .parse()
            .map_err(|e| invalid("ROOTED_LOG", e))?;

        Ok(Self {
            listen_addr,
            root,
            backlog,
            log_level,
        })
    }
}

fn invalid(name: &str, err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("{name}: {err}"))
}
