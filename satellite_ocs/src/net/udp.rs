use crate::config::Config;
use anyhow::{Context, Result};
use tokio::net::UdpSocket;

/// Uplink socket. Commands are fire-and-forget, so there is no reply socket.
pub async fn bind(cfg: &Config) -> Result<UdpSocket> {
    UdpSocket::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding uplink socket {}", cfg.bind_addr))
}
