//! Read/write router façade
//!
//! The Router combines the host pools, the write-assurance policy and the
//! connection opener:
//! - `routed_connection` consults the policy and picks the pool
//! - `connection_for_read` / `connection_for_write` skip the policy
//! - `reload` swaps in a new configuration snapshot atomically

use crate::host_pool::HostPool;
use crate::opener::{ConnectSettings, ConnectionOpener};
use crate::policy::{WriteAssurancePolicy, WriteReason};
use crate::selector::HostSelector;
use arc_swap::ArcSwap;
use dbroute_core::{Connector, DbConfig, ExecutionContext, HostConfig, Result, Role};
use dbroute_observability::Metrics;
use std::sync::Arc;

/// Immutable routing state built from one `DbConfig`
#[derive(Debug, Clone)]
pub struct RoutingSnapshot {
    pool: HostPool,
    policy: WriteAssurancePolicy,
    settings: ConnectSettings,
    default_max_attempts: u32,
}

impl RoutingSnapshot {
    /// Validate `config` and derive pools and policy from it
    pub fn from_config(config: &DbConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            pool: HostPool::from_config(config)?,
            policy: WriteAssurancePolicy::from_config(&config.assure),
            settings: ConnectSettings::from_config(config),
            default_max_attempts: config.max_attempts(),
        })
    }

    pub fn pool(&self) -> &HostPool {
        &self.pool
    }

    pub fn policy(&self) -> &WriteAssurancePolicy {
        &self.policy
    }

    pub fn settings(&self) -> &ConnectSettings {
        &self.settings
    }

    pub fn default_max_attempts(&self) -> u32 {
        self.default_max_attempts
    }
}

/// Routes database operations to read or write hosts
pub struct Router<C: Connector> {
    /// Current configuration (replaced wholesale on reload)
    snapshot: ArcSwap<RoutingSnapshot>,

    opener: ConnectionOpener<C>,

    metrics: Option<Arc<Metrics>>,
}

impl<C: Connector> Router<C> {
    /// Create a router for `config` dialling through `connector`
    ///
    /// # Errors
    /// `Error::Config` when a host entry or weight is malformed. Roles without
    /// hosts are accepted here and fail when first used.
    pub fn new(config: &DbConfig, connector: C) -> Result<Self> {
        let snapshot = RoutingSnapshot::from_config(config)?;

        tracing::info!(
            read_hosts = config.read.len(),
            write_hosts = config.write.len(),
            assured_tables = snapshot.policy.assured_write_tables().len(),
            "Initialized database router"
        );

        Ok(Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            opener: ConnectionOpener::new(connector),
            metrics: None,
        })
    }

    /// Record routing and connection metrics into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.opener = self.opener.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    /// Current configuration snapshot
    pub fn snapshot(&self) -> Arc<RoutingSnapshot> {
        self.snapshot.load_full()
    }

    pub fn connector(&self) -> &C {
        self.opener.connector()
    }

    /// Attempt budget configured by `max_attempts` in the current config
    ///
    /// `routed_connection_default` applies it; the other entry points take an
    /// explicit budget.
    pub fn default_max_attempts(&self) -> u32 {
        self.snapshot.load().default_max_attempts
    }

    /// Replace the configuration
    ///
    /// The new snapshot is built completely before it is published; if `config`
    /// is invalid the current snapshot stays in place. Calls already in flight
    /// finish against the snapshot they started with.
    pub fn reload(&self, config: &DbConfig) -> Result<()> {
        match RoutingSnapshot::from_config(config) {
            Ok(snapshot) => {
                self.snapshot.store(Arc::new(snapshot));
                if let Some(metrics) = &self.metrics {
                    metrics.record_config_reload(true);
                }
                tracing::info!(
                    read_hosts = config.read.len(),
                    write_hosts = config.write.len(),
                    "Database routing configuration reloaded"
                );
                Ok(())
            }
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_config_reload(false);
                }
                tracing::warn!(error = %err, "Rejected database routing configuration");
                Err(err)
            }
        }
    }

    /// Whether an operation on `table_ref` in `ctx` must use a write host
    pub fn must_use_write(&self, table_ref: &str, ctx: &ExecutionContext) -> bool {
        self.snapshot.load().policy.must_use_write(table_ref, ctx)
    }

    /// Weighted pick of a read host, without connecting
    pub fn read_host(&self) -> Result<HostConfig> {
        self.host_for_role(Role::Read)
    }

    /// Weighted pick of a write host, without connecting
    pub fn write_host(&self) -> Result<HostConfig> {
        self.host_for_role(Role::Write)
    }

    fn host_for_role(&self, role: Role) -> Result<HostConfig> {
        let snapshot = self.snapshot.load();
        let pool = snapshot.pool.weighted(role)?;
        HostSelector::new().select(pool).cloned()
    }

    /// Connection to a read host, regardless of policy
    pub async fn connection_for_read(&self, max_attempts: u32) -> Result<C::Connection> {
        self.connection_for_role(Role::Read, max_attempts).await
    }

    /// Connection to a write host, regardless of policy
    pub async fn connection_for_write(&self, max_attempts: u32) -> Result<C::Connection> {
        self.connection_for_role(Role::Write, max_attempts).await
    }

    /// Connection to a host of `role`
    pub async fn connection_for_role(&self, role: Role, max_attempts: u32) -> Result<C::Connection> {
        let snapshot = self.snapshot.load_full();
        self.open_from(&snapshot, role, max_attempts).await
    }

    async fn open_from(
        &self,
        snapshot: &RoutingSnapshot,
        role: Role,
        max_attempts: u32,
    ) -> Result<C::Connection> {
        let pool = snapshot.pool.weighted(role)?;
        self.opener
            .open(pool, &snapshot.settings, max_attempts)
            .await
    }

    /// Connection for an operation on `table_ref`, routed by the write-assurance policy
    ///
    /// This is the entry point for ordinary queries: write hosts when the
    /// policy demands it, read hosts otherwise.
    pub async fn routed_connection(
        &self,
        table_ref: &str,
        ctx: &ExecutionContext,
        max_attempts: u32,
    ) -> Result<C::Connection> {
        // One snapshot for both the decision and the pool it selects
        let snapshot = self.snapshot.load_full();
        self.routed_from(&snapshot, table_ref, ctx, max_attempts).await
    }

    /// `routed_connection` with the attempt budget from `db.max_attempts`
    pub async fn routed_connection_default(
        &self,
        table_ref: &str,
        ctx: &ExecutionContext,
    ) -> Result<C::Connection> {
        let snapshot = self.snapshot.load_full();
        let max_attempts = snapshot.default_max_attempts;
        self.routed_from(&snapshot, table_ref, ctx, max_attempts).await
    }

    async fn routed_from(
        &self,
        snapshot: &RoutingSnapshot,
        table_ref: &str,
        ctx: &ExecutionContext,
        max_attempts: u32,
    ) -> Result<C::Connection> {
        let reason = snapshot.policy.write_reason(table_ref, ctx);

        let role = match reason {
            Some(_) => Role::Write,
            None => Role::Read,
        };
        let reason_label = reason.map(|r| r.as_str()).unwrap_or("default");

        tracing::debug!(
            table = table_ref,
            role = %role,
            reason = reason_label,
            "Route decision made"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_routing_decision(role.as_str(), reason_label);
        }

        self.open_from(snapshot, role, max_attempts).await
    }

    /// Rule that would pin `table_ref` in `ctx` to the write pool
    pub fn write_reason(&self, table_ref: &str, ctx: &ExecutionContext) -> Option<WriteReason> {
        self.snapshot.load().policy.write_reason(table_ref, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dbroute_core::{AssureConfig, AssureWriteConfig, Error};

    /// Connector that returns the address it was asked to dial
    struct EchoConnector;

    #[async_trait]
    impl Connector for EchoConnector {
        type Connection = String;

        async fn connect(&self, host: &HostConfig, _database: &str) -> Result<String> {
            Ok(host.host.clone())
        }
    }

    fn config() -> DbConfig {
        DbConfig {
            read: vec![HostConfig::new("replica", 3306)],
            write: vec![HostConfig::new("master", 3306)],
            assure: AssureConfig {
                write: AssureWriteConfig {
                    tables: Some("fe_users".to_string()),
                    backend_session: true,
                    ..Default::default()
                },
            },
            max_attempts: Some(2),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_routed_connection_picks_pool() {
        let router = Router::new(&config(), EchoConnector).unwrap();
        let anonymous = ExecutionContext::new();

        assert_eq!(
            router.routed_connection("pages", &anonymous, 1).await.unwrap(),
            "replica"
        );
        assert_eq!(
            router.routed_connection("fe_users", &anonymous, 1).await.unwrap(),
            "master"
        );

        let logged_in = ExecutionContext::new().with_authenticated_session(true);
        assert_eq!(
            router.routed_connection("pages", &logged_in, 1).await.unwrap(),
            "master"
        );

        // cli_dispatch is not enabled in this config
        let cli = ExecutionContext::new().with_cli_dispatch(true);
        assert_eq!(router.routed_connection("pages", &cli, 1).await.unwrap(), "replica");
    }

    #[tokio::test]
    async fn test_explicit_role_ignores_policy() {
        let router = Router::new(&config(), EchoConnector).unwrap();
        assert_eq!(router.connection_for_read(1).await.unwrap(), "replica");
        assert_eq!(router.connection_for_write(1).await.unwrap(), "master");
    }

    #[tokio::test]
    async fn test_missing_role_fails_at_first_use() {
        let config = DbConfig {
            read: vec![HostConfig::new("replica", 3306)],
            ..Default::default()
        };
        let router = Router::new(&config, EchoConnector).unwrap();

        let err = router.connection_for_write(3).await.unwrap_err();
        assert!(matches!(err, Error::NoHosts { role: Role::Write }));
        assert!(router.write_host().unwrap_err().is_config_error());
        assert_eq!(router.read_host().unwrap().host, "replica");
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = config();
        config.read[0].weight = Some(i64::MAX);
        assert!(Router::new(&config, EchoConnector).is_err());
    }

    #[tokio::test]
    async fn test_reload_swaps_snapshot() {
        let router = Router::new(&config(), EchoConnector).unwrap();
        let before = router.snapshot();

        let mut updated = config();
        updated.read = vec![HostConfig::new("replica-new", 3306)];
        updated.assure.write.tables = Some("pages".to_string());
        router.reload(&updated).unwrap();

        assert_eq!(router.connection_for_read(1).await.unwrap(), "replica-new");
        assert!(router.must_use_write("pages", &ExecutionContext::new()));
        assert!(!router.must_use_write("fe_users", &ExecutionContext::new()));

        // A snapshot taken earlier is unaffected
        assert_eq!(before.pool().hosts_for_role(Role::Read).unwrap()[0].host, "replica");
    }

    #[test]
    fn test_reload_rejects_invalid_config() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let router = Router::new(&config(), EchoConnector)
            .unwrap()
            .with_metrics(metrics.clone());

        let mut broken = config();
        broken.write[0].port = 0;
        assert!(router.reload(&broken).is_err());

        assert_eq!(router.write_host().unwrap().port, 3306);
        assert_eq!(
            metrics
                .config_reloads_total
                .with_label_values(&["rejected"])
                .get(),
            1.0
        );
    }

    #[test]
    fn test_default_max_attempts_from_config() {
        let router = Router::new(&config(), EchoConnector).unwrap();
        assert_eq!(router.default_max_attempts(), 2);
    }

    /// Connector whose every attempt is refused
    struct RefusingConnector;

    #[async_trait]
    impl Connector for RefusingConnector {
        type Connection = String;

        async fn connect(&self, host: &HostConfig, _database: &str) -> Result<String> {
            Err(Error::Connect {
                host: host.address(),
                message: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_routed_connection_default_uses_configured_attempts() {
        let router = Router::new(&config(), RefusingConnector).unwrap();
        let ctx = ExecutionContext::new();

        let err = router
            .routed_connection_default("fe_users", &ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ConnectionExhausted { role: Role::Write, attempts: 2, .. }
        ));

        let mut updated = config();
        updated.max_attempts = Some(4);
        router.reload(&updated).unwrap();

        let err = router.routed_connection_default("pages", &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            Error::ConnectionExhausted { role: Role::Read, attempts: 4, .. }
        ));
    }

    #[tokio::test]
    async fn test_routing_decisions_recorded() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let router = Router::new(&config(), EchoConnector)
            .unwrap()
            .with_metrics(metrics.clone());

        let ctx = ExecutionContext::new();
        router.routed_connection("fe_users", &ctx, 1).await.unwrap();
        router.routed_connection("pages", &ctx, 1).await.unwrap();

        let decisions = &metrics.routing_decisions_total;
        assert_eq!(decisions.with_label_values(&["write", "assured_table"]).get(), 1.0);
        assert_eq!(decisions.with_label_values(&["read", "default"]).get(), 1.0);
        assert_eq!(
            router.write_reason("fe_users", &ctx),
            Some(WriteReason::AssuredTable)
        );
    }
}
