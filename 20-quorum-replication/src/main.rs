use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use quorum_replication::{api, cli::Config, node::Node, server::Server};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::parse();
    let node = Arc::new(Node::from_config(&config)?);
    let router = api::router(Arc::clone(&node), config.max_inflight_requests);
    let server = Server::bind(config.listen_addr(), router).await?;
    let addr = server.local_addr()?;

    info!(
        role = %node.role(),
        followers = ?node.followers(),
        write_quorum = node.write_quorum(),
        "node listening on {}",
        addr
    );
    if let Err(err) = server.run_until_ctrl_c().await {
        warn!("node exited with error: {err:?}");
        return Err(err);
    }

    Ok(())
}
