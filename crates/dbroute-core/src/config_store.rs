//! Configuration store trait
//!
//! The `ConfigStore` trait abstracts over where the database routing
//! configuration comes from and how changes are announced.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{Result, config::DbConfig};

/// Type alias for configuration change streams
pub type ConfigChangeStream<'a> = BoxStream<'a, Result<ConfigChange>>;

/// Configuration change notification
#[derive(Debug, Clone)]
pub struct ConfigChange {
    /// Timestamp of the change
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Configuration version
    pub version: u32,
}

/// Configuration store trait
///
/// # Example
/// ```no_run
/// # use dbroute_core::config_store::ConfigStore;
/// # async fn example(store: &dyn ConfigStore) -> dbroute_core::Result<()> {
/// let config = store.load().await?;
/// println!("{} read hosts", config.read.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load, resolve and validate the current configuration
    ///
    /// # Errors
    /// - `Error::ConfigNotFound` if the source doesn't exist
    /// - `Error::Config` if the document is invalid
    async fn load(&self) -> Result<DbConfig>;

    /// Watch for configuration changes
    ///
    /// The stream emits whenever the underlying source is modified.
    async fn watch_changes(&self) -> Result<ConfigChangeStream<'_>>;

    /// Validate a raw configuration document before it is applied
    ///
    /// # Errors
    /// - `Error::Config` if validation fails
    async fn validate_config(&self, config: &serde_json::Value) -> Result<()>;
}
