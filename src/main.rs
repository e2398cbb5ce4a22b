use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::fmt;

mod card;
mod chamber;
mod engine;
mod error;
mod event;
mod hand;
mod room;
mod transport;

use room::RoomConfig;
use transport::WebSocketServer;

/// Process-level configuration, read once at startup: CLI arg, falling
/// back to an env var, falling back to a literal default.
struct ServerConfig {
    host: String,
    port: u16,
    room: RoomConfig,
}

impl ServerConfig {
    fn from_env() -> Self {
        let port = std::env::args()
            .nth(1)
            .and_then(|a| a.parse::<u16>().ok())
            .or_else(|| std::env::var("PRESIDENTS_PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(9000);
        let host = std::env::var("PRESIDENTS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        ServerConfig {
            host,
            port,
            room: RoomConfig::default(),
        }
    }

    fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt::init();

    let config = ServerConfig::from_env();
    let addr = config.addr()?;
    let server = Arc::new(WebSocketServer::new(config.room));

    info!(%addr, "starting Presidents server");

    if let Err(e) = server.start(addr).await {
        error!(error = %e, "server exited with an error");
    }

    Ok(())
}
