//! `roomlink-relay`: the standalone signaling relay server.

use anyhow::Context;
use clap::Parser;
use roomlink::{RelayConfig, SignalingRelay};
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "roomlink-relay", version, about = "Room-scoped WebRTC signaling relay")]
struct Opt {
    /// Address to listen on
    #[clap(long = "listen", default_value = "127.0.0.1:4000")]
    listen: SocketAddr,

    /// Base path the WebSocket handshake must request
    #[clap(long = "path", default_value = "/signal")]
    path: String,

    /// Allowed Origin header values; repeat for several, omit to allow any
    #[clap(long = "allow-origin")]
    allow_origin: Vec<String>,

    /// Log filter, e.g. "info" or "roomlink=debug"
    #[clap(long = "log", default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(opt.log.clone())),
        )
        .init();

    let config = RelayConfig {
        listen: opt.listen,
        path: opt.path,
        allowed_origins: opt.allow_origin,
    };
    let relay = SignalingRelay::bind(config)
        .await
        .context("failed to start signaling relay")?;

    let shutdown = relay.shutdown_token();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => tracing::error!("cannot listen for interrupt: {e}"),
        }
    });

    relay.run().await.context("relay terminated abnormally")
}
