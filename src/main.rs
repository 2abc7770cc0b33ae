mod config;

use config::Config;
use rooted_web::{Server, StaticRoot};
use std::io;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(cfg.log_level)
        .init();

    let root = StaticRoot::open(&cfg.root).map_err(|e| {
        tracing::error!(root = %cfg.root.display(), error = %e, "cannot open served directory");
        e
    })?;
    let listener = rooted_web::bind(cfg.listen_addr, cfg.backlog)?;

    tracing::info!(root = %cfg.root.display(), "serving static files");

    Server::builder()
        .listener(listener)
        .root(root)
        .build()
        .launch()
        .await;

    Ok(())
}
