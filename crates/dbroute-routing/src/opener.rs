//! Connection opening with bounded retries
//!
//! Each attempt picks a host afresh from the weighted pool, so one dead
//! replica cannot consume the whole attempt budget. Attempts run strictly one
//! after another; a failed or timed-out attempt is dropped, closing any
//! half-open socket, before the next host is dialled.

use crate::host_pool::WeightedPool;
use crate::selector::HostSelector;
use dbroute_core::{Connector, DbConfig, Error, Result};
use dbroute_observability::Metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-snapshot settings handed to every connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectSettings {
    /// Default schema selected on connect
    pub database: String,
    /// Upper bound for a single attempt
    pub connect_timeout: Duration,
}

impl ConnectSettings {
    pub fn from_config(config: &DbConfig) -> Self {
        Self {
            database: config.database.clone(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

/// Opens connections through a `Connector`, retrying across hosts
pub struct ConnectionOpener<C: Connector> {
    connector: C,
    selector: HostSelector,
    metrics: Option<Arc<Metrics>>,
}

impl<C: Connector> ConnectionOpener<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            selector: HostSelector::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Connect to a host of `pool`, trying at most `max_attempts` times
    ///
    /// A `max_attempts` of 0 is treated as 1.
    ///
    /// # Errors
    /// - `Error::NoHosts` if the pool is empty
    /// - `Error::ConnectionExhausted` carrying the attempt count, the last host
    ///   tried and its failure once every attempt has failed
    pub async fn open(
        &self,
        pool: &WeightedPool,
        settings: &ConnectSettings,
        max_attempts: u32,
    ) -> Result<C::Connection> {
        let role = pool.role();
        let max_attempts = max_attempts.max(1);
        let mut last_failure: Option<(String, Error)> = None;

        for attempt in 1..=max_attempts {
            let host = self.selector.select(pool)?;
            let address = host.address();

            tracing::debug!(
                role = %role,
                host = %address,
                attempt,
                max_attempts,
                "Attempting database connection"
            );

            let started = Instant::now();
            let outcome = tokio::time::timeout(
                settings.connect_timeout,
                self.connector.connect(host, &settings.database),
            )
            .await;

            match outcome {
                Ok(Ok(connection)) => {
                    let elapsed = started.elapsed();
                    if let Some(metrics) = &self.metrics {
                        metrics.record_connect_success(role.as_str(), elapsed.as_secs_f64());
                    }

                    tracing::info!(
                        role = %role,
                        host = %address,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Database connection established"
                    );

                    return Ok(connection);
                }
                Ok(Err(err)) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_connect_failure(role.as_str(), false);
                    }

                    tracing::warn!(
                        role = %role,
                        host = %address,
                        attempt,
                        error = %err,
                        "Database connection failed"
                    );

                    last_failure = Some((address, err));
                }
                Err(_) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_connect_failure(role.as_str(), true);
                    }

                    tracing::warn!(
                        role = %role,
                        host = %address,
                        attempt,
                        timeout_ms = settings.connect_timeout.as_millis() as u64,
                        "Database connection timed out"
                    );

                    let err = Error::ConnectTimeout {
                        host: address.clone(),
                        timeout: settings.connect_timeout,
                    };
                    last_failure = Some((address, err));
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_connect_exhausted(role.as_str());
        }

        let (last_host, source) = last_failure.ok_or_else(|| {
            Error::Internal(format!("no connection attempt was made for {} pool", role))
        })?;

        tracing::error!(
            role = %role,
            attempts = max_attempts,
            last_host = %last_host,
            error = %source,
            "All database connection attempts failed"
        );

        Err(Error::ConnectionExhausted {
            role,
            attempts: max_attempts,
            last_host,
            source: Box::new(source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dbroute_core::{HostConfig, Role};
    use mockall::mock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        pub TestConnector {}

        #[async_trait]
        impl Connector for TestConnector {
            type Connection = String;

            async fn connect(&self, host: &HostConfig, database: &str) -> Result<String>;
        }
    }

    fn settings() -> ConnectSettings {
        ConnectSettings {
            database: "app".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }

    fn pool(names: &[&str]) -> WeightedPool {
        let hosts: Vec<HostConfig> = names.iter().map(|n| HostConfig::new(*n, 3306)).collect();
        WeightedPool::build(Role::Read, &hosts).unwrap()
    }

    fn refused(host: &HostConfig) -> Error {
        Error::Connect {
            host: host.address(),
            message: "connection refused".to_string(),
        }
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let mut connector = MockTestConnector::new();
        connector
            .expect_connect()
            .times(3)
            .returning(move |host, _database| {
                let n = calls_clone.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(refused(host))
                } else {
                    Ok(format!("conn-{}", n))
                }
            });

        let opener = ConnectionOpener::new(connector);
        let connection = opener
            .open(&pool(&["r1", "r2", "r3"]), &settings(), 3)
            .await
            .unwrap();

        assert_eq!(connection, "conn-3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_further_attempt_after_success() {
        let mut connector = MockTestConnector::new();
        connector
            .expect_connect()
            .times(1)
            .returning(|host, _| Ok(host.host.clone()));

        let opener = ConnectionOpener::new(connector);
        let connection = opener.open(&pool(&["only"]), &settings(), 5).await.unwrap();
        assert_eq!(connection, "only");
    }

    #[tokio::test]
    async fn test_all_attempts_fail() {
        let mut connector = MockTestConnector::new();
        connector
            .expect_connect()
            .times(4)
            .returning(|host, _| Err(refused(host)));

        let opener = ConnectionOpener::new(connector);
        let err = opener
            .open(&pool(&["r1", "r2"]), &settings(), 4)
            .await
            .unwrap_err();

        match err {
            Error::ConnectionExhausted {
                role,
                attempts,
                last_host,
                source,
            } => {
                assert_eq!(role, Role::Read);
                assert_eq!(attempts, 4);
                assert!(last_host == "r1:3306" || last_host == "r2:3306");
                assert!(source.to_string().contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_zero_attempts_treated_as_one() {
        let mut connector = MockTestConnector::new();
        connector
            .expect_connect()
            .times(1)
            .returning(|host, _| Err(refused(host)));

        let opener = ConnectionOpener::new(connector);
        let err = opener.open(&pool(&["r1"]), &settings(), 0).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionExhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_empty_pool_never_dials() {
        let mut connector = MockTestConnector::new();
        connector.expect_connect().never();

        let opener = ConnectionOpener::new(connector);
        let empty = WeightedPool::build(Role::Write, &[]).unwrap();
        let err = opener.open(&empty, &settings(), 3).await.unwrap_err();
        assert!(matches!(err, Error::NoHosts { role: Role::Write }));
    }

    #[tokio::test]
    async fn test_database_passed_to_connector() {
        let mut connector = MockTestConnector::new();
        connector
            .expect_connect()
            .withf(|host, database| host.host == "r1" && database.to_string() == "app")
            .times(1)
            .returning(|_, database| Ok(database.to_string()));

        let opener = ConnectionOpener::new(connector);
        assert_eq!(opener.open(&pool(&["r1"]), &settings(), 1).await.unwrap(), "app");
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let mut connector = MockTestConnector::new();
        connector.expect_connect().returning(move |host, _| {
            if calls_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(refused(host))
            } else {
                Ok("ok".to_string())
            }
        });

        let metrics = Arc::new(Metrics::new().unwrap());
        let opener = ConnectionOpener::new(connector).with_metrics(metrics.clone());
        opener.open(&pool(&["r1"]), &settings(), 2).await.unwrap();

        let attempts = &metrics.connect_attempts_total;
        assert_eq!(attempts.with_label_values(&["read", "failure"]).get(), 1.0);
        assert_eq!(attempts.with_label_values(&["read", "success"]).get(), 1.0);
    }
}
