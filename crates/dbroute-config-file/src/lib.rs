//! File-based configuration store for dbroute
//!
//! This crate implements the `ConfigStore` trait over a YAML or TOML file on
//! disk. The document holds the routing settings under a top-level `db` key.
//!
//! # Features
//! - YAML (default) and TOML (`.toml` extension) formats
//! - `$VAR` / `${VAR}` references in host credentials
//! - Real-time file watching with `notify`
//! - Hot reload into a running router
//!
//! # Example
//! ```no_run
//! # use dbroute_config_file::FileConfigStore;
//! # use dbroute_core::ConfigStore;
//! # async fn example() -> dbroute_core::Result<()> {
//! let store = FileConfigStore::new("~/.dbroute/config.yaml").await?;
//! let config = store.load().await?;
//! # Ok(())
//! # }
//! ```

mod file_store;
mod hot_reload;

pub use file_store::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, FileConfigStore};
pub use hot_reload::spawn_hot_reload;
