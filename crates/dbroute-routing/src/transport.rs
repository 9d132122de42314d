//! Plain TCP transport
//!
//! `TcpConnector` only establishes the socket; speaking the database wire
//! protocol over it is up to whoever receives the `TcpConnection`.

use async_trait::async_trait;
use dbroute_core::{Connector, Error, HostConfig, Result};
use tokio::net::TcpStream;

/// Socket to a database server plus what it was opened for
#[derive(Debug)]
pub struct TcpConnection {
    pub stream: TcpStream,
    pub host: HostConfig,
    pub database: String,
}

/// Connector that opens a TCP socket to `host:port`
#[derive(Debug, Clone)]
pub struct TcpConnector {
    nodelay: bool,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self { nodelay: true }
    }

    /// Toggle TCP_NODELAY on new sockets (on by default)
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Connection = TcpConnection;

    async fn connect(&self, host: &HostConfig, database: &str) -> Result<TcpConnection> {
        let stream = TcpStream::connect((host.host.as_str(), host.port))
            .await
            .map_err(|e| Error::Connect {
                host: host.address(),
                message: e.to_string(),
            })?;

        if self.nodelay {
            stream.set_nodelay(true)?;
        }

        Ok(TcpConnection {
            stream,
            host: host.clone(),
            database: database.to_string(),
        })
    }
}
