//! Connector trait definitions

use crate::{Result, config::HostConfig};

/// Transport that opens a connection to one database server
///
/// Implementations own the wire protocol; the router only decides which host
/// to dial. Dropping the returned future must release any half-open socket.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Live connection handed to the caller
    type Connection: Send;

    /// Open a connection to `host`, selecting `database` as default schema
    async fn connect(&self, host: &HostConfig, database: &str) -> Result<Self::Connection>;
}
