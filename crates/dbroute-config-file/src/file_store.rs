//! File-based ConfigStore implementation

use async_trait::async_trait;
use futures::stream;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use dbroute_core::{
    DbConfig, Error, Result, RootConfig,
    config_store::{ConfigChange, ConfigChangeStream, ConfigStore},
};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "DBROUTE_CONFIG";

/// Used when `DBROUTE_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "~/.dbroute/config.yaml";

/// How often an idle watcher checks whether its stream is still wanted
const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// File-based configuration store
///
/// Reads the routing configuration from a YAML or TOML file and watches it
/// for changes using the `notify` crate.
#[derive(Debug)]
pub struct FileConfigStore {
    /// Path to the configuration file
    config_path: PathBuf,
    /// Incremented on every observed change
    version: Arc<AtomicU32>,
}

impl FileConfigStore {
    /// Create a new file-based configuration store
    ///
    /// # Arguments
    /// * `config_path` - Path to the configuration file (`~` is expanded)
    ///
    /// # Errors
    /// - `Error::ConfigNotFound` if the file doesn't exist
    /// - `Error::Config` if `~` cannot be expanded
    pub async fn new(config_path: impl Into<PathBuf>) -> Result<Self> {
        let config_path = expand_tilde(config_path.into())?;

        if !config_path.exists() {
            return Err(Error::ConfigNotFound);
        }

        info!("Initialized FileConfigStore for {:?}", config_path);

        Ok(Self {
            config_path,
            version: Arc::new(AtomicU32::new(1)),
        })
    }

    /// Store for the file named by `DBROUTE_CONFIG`, or the default path
    pub async fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        debug!(path = %path, "Resolving configuration file");
        Self::new(path).await
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Number of changes observed so far, starting at 1
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    fn is_toml(&self) -> bool {
        self.config_path.extension().and_then(|s| s.to_str()) == Some("toml")
    }

    /// Read and parse the config file into a format-neutral document
    fn read_config_file(&self) -> Result<serde_json::Value> {
        let contents = std::fs::read_to_string(&self.config_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Error::ConfigNotFound;
            }
            error!("Failed to read config file: {}", e);
            Error::Io(e)
        })?;

        let config: serde_json::Value = if self.is_toml() {
            let toml_value: toml::Value = toml::from_str(&contents).map_err(|e| {
                error!("Failed to parse TOML config: {}", e);
                Error::Config(format!("Invalid TOML: {}", e))
            })?;
            serde_json::to_value(toml_value).map_err(|e| {
                error!("Failed to convert TOML to JSON: {}", e);
                Error::Config(format!("TOML conversion error: {}", e))
            })?
        } else {
            serde_yaml::from_str(&contents).map_err(|e| {
                error!("Failed to parse YAML config: {}", e);
                Error::Config(format!("Invalid YAML: {}", e))
            })?
        };

        debug!("Successfully read config file");
        Ok(config)
    }
}

fn expand_tilde(path: PathBuf) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path),
    }
}

fn parse_root(config: &serde_json::Value) -> Result<RootConfig> {
    if !config.is_object() {
        return Err(Error::Config(
            "Configuration must be a mapping with a 'db' key".to_string(),
        ));
    }

    serde_json::from_value(config.clone())
        .map_err(|e| Error::Config(format!("Invalid database configuration: {}", e)))
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> Result<DbConfig> {
        let document = self.read_config_file()?;
        let mut config = parse_root(&document)?.db;

        config.resolve_env_vars()?;
        config.validate()?;

        info!(
            read_hosts = config.read.len(),
            write_hosts = config.write.len(),
            path = ?self.config_path,
            "Loaded database configuration"
        );
        Ok(config)
    }

    async fn watch_changes(&self) -> Result<ConfigChangeStream<'_>> {
        // Create a channel for file system events
        let (tx, rx) = mpsc::channel(100);

        let config_path = self.config_path.clone();
        let version = self.version.clone();

        // notify delivers on a plain std channel, so drain it off the runtime
        tokio::task::spawn_blocking(move || {
            let (notify_tx, notify_rx) = std::sync::mpsc::channel();

            // std::result::Result to avoid the crate's Result alias
            let mut watcher = match RecommendedWatcher::new(
                move |res: std::result::Result<Event, notify::Error>| {
                    if let Err(e) = notify_tx.send(res) {
                        error!("Failed to send file watch event: {}", e);
                    }
                },
                notify::Config::default(),
            ) {
                Ok(w) => w,
                Err(e) => {
                    error!("Failed to create file watcher: {}", e);
                    return;
                }
            };

            if let Err(e) = watcher.watch(&config_path, RecursiveMode::NonRecursive) {
                error!("Failed to watch config file: {}", e);
                return;
            }

            info!("Watching config file for changes: {:?}", config_path);

            loop {
                let event_result = match notify_rx.recv_timeout(WATCH_POLL_INTERVAL) {
                    Ok(event_result) => event_result,
                    Err(RecvTimeoutError::Timeout) => {
                        if tx.is_closed() {
                            debug!("Config change stream dropped, stopping watcher");
                            break;
                        }
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                };

                match event_result {
                    Ok(event) => {
                        if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                            let change = ConfigChange {
                                timestamp: chrono::Utc::now(),
                                version: version.fetch_add(1, Ordering::SeqCst) + 1,
                            };

                            if tx.blocking_send(Ok(change)).is_err() {
                                debug!("Config change stream closed, stopping watcher");
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("File watch error: {}", e);
                        if tx
                            .blocking_send(Err(Error::Internal(format!("File watch error: {}", e))))
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn validate_config(&self, config: &serde_json::Value) -> Result<()> {
        parse_root(config)?.db.validate()?;

        debug!("Config validation passed");
        Ok(())
    }
}
