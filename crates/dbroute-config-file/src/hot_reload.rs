//! Reload configuration into a running router when the file changes

use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use dbroute_core::{ConfigStore, DbConfig, Result};

use crate::FileConfigStore;

/// Watch `store` and pass every successfully loaded configuration to `apply`
///
/// A change that fails to load or that `apply` rejects is logged and skipped;
/// whatever `apply` last accepted stays in effect. The task ends when the
/// watcher stops or the returned handle is aborted.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use dbroute_config_file::{FileConfigStore, spawn_hot_reload};
/// # async fn example() -> dbroute_core::Result<()> {
/// let store = Arc::new(FileConfigStore::from_env().await?);
/// let handle = spawn_hot_reload(store, |config| {
///     println!("{} read hosts", config.read.len());
///     Ok(())
/// });
/// # handle.abort();
/// # Ok(())
/// # }
/// ```
pub fn spawn_hot_reload<F>(store: Arc<FileConfigStore>, apply: F) -> JoinHandle<()>
where
    F: Fn(DbConfig) -> Result<()> + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut changes = match store.watch_changes().await {
            Ok(changes) => changes,
            Err(e) => {
                error!("Failed to start config hot reload: {}", e);
                return;
            }
        };

        while let Some(change) = changes.next().await {
            let change = match change {
                Ok(change) => change,
                Err(e) => {
                    warn!("Config watch error: {}", e);
                    continue;
                }
            };

            let config = match store.load().await {
                Ok(config) => config,
                Err(e) => {
                    warn!(
                        version = change.version,
                        error = %e,
                        "Changed configuration failed to load, keeping current"
                    );
                    continue;
                }
            };

            match apply(config) {
                Ok(()) => info!(version = change.version, "Configuration hot-reloaded"),
                Err(e) => warn!(
                    version = change.version,
                    error = %e,
                    "Changed configuration rejected, keeping current"
                ),
            }
        }

        info!("Config hot reload stopped");
    })
}
