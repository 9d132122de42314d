//! Database host and assurance configuration
//!
//! Defines server roles, per-host connection settings and the write-assurance
//! rules, plus environment variable resolution for credentials.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Largest weight accepted for a single host
pub const MAX_HOST_WEIGHT: i64 = 10_000;

/// Default MySQL port used when a host omits one
pub const DEFAULT_PORT: u16 = 3306;

/// Class of database server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read replica
    Read,
    /// Write master
    Write,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Read => "read",
            Role::Write => "write",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings for one database server
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Hostname or IP address
    pub host: String,

    /// Login user (supports env var syntax: $VAR_NAME or ${VAR_NAME})
    #[serde(default)]
    pub user: String,

    /// Login password (supports env var syntax: $VAR_NAME or ${VAR_NAME})
    #[serde(default, alias = "pass")]
    pub password: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Relative selection weight within the role's pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
}

impl HostConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            user: String::new(),
            password: String::new(),
            port,
            weight: None,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// `host:port`, used in logs and error messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Number of slots this host occupies in the weighted expansion
    ///
    /// Absent, zero and negative weights all count as 1.
    pub fn effective_weight(&self) -> Result<usize> {
        match self.weight {
            Some(weight) if weight > MAX_HOST_WEIGHT => Err(Error::Config(format!(
                "weight {} for host '{}' exceeds maximum of {}",
                weight,
                self.address(),
                MAX_HOST_WEIGHT
            ))),
            Some(weight) if weight > 1 => Ok(weight as usize),
            _ => Ok(1),
        }
    }

    /// Replace $VAR_NAME or ${VAR_NAME} references in user and password
    pub fn resolve_env_vars(&mut self) -> Result<()> {
        self.user = resolve_env_var(&self.user)?;
        self.password = resolve_env_var(&self.password)?;
        Ok(())
    }
}

// Keeps credentials out of logs
impl fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("weight", &self.weight)
            .finish()
    }
}

impl fmt::Display for HostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user.is_empty() {
            write!(f, "{}:{}", self.host, self.port)
        } else {
            write!(f, "{}@{}:{}", self.user, self.host, self.port)
        }
    }
}

/// Rules forcing operations onto write hosts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssureConfig {
    #[serde(default)]
    pub write: AssureWriteConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssureWriteConfig {
    /// Comma-separated table names always served by write hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<String>,

    /// Pin operations of authenticated sessions to write hosts
    #[serde(default, alias = "backendSession")]
    pub backend_session: bool,

    /// Pin command-line dispatched processes to write hosts
    #[serde(default, alias = "cliDispatch")]
    pub cli_dispatch: bool,

    /// Compare table names without regard to ASCII case
    #[serde(default, alias = "caseInsensitive")]
    pub case_insensitive: bool,
}

impl AssureWriteConfig {
    /// Configured table names, trimmed, empty entries dropped
    pub fn table_names(&self) -> Vec<String> {
        self.tables
            .as_deref()
            .map(|tables| {
                tables
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Read/write server pools and routing options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub read: Vec<HostConfig>,

    #[serde(default)]
    pub write: Vec<HostConfig>,

    /// Default schema passed to the transport on connect
    #[serde(default)]
    pub database: String,

    #[serde(default)]
    pub assure: AssureConfig,

    /// Per-attempt connect timeout in seconds (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,

    /// Default number of connect attempts (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl DbConfig {
    pub fn hosts(&self, role: Role) -> &[HostConfig] {
        match role {
            Role::Read => &self.read,
            Role::Write => &self.write,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.unwrap_or(default_connect_timeout_secs()))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(1).max(1)
    }

    /// Resolve environment variable references in every host
    pub fn resolve_env_vars(&mut self) -> Result<()> {
        for host in self.read.iter_mut().chain(self.write.iter_mut()) {
            host.resolve_env_vars()?;
        }
        Ok(())
    }

    /// Check host entries for structural problems
    ///
    /// An empty role is not an error here; it fails when that role is first used.
    pub fn validate(&self) -> Result<()> {
        for role in [Role::Read, Role::Write] {
            for host in self.hosts(role) {
                if host.host.trim().is_empty() {
                    return Err(Error::Config(format!("{} host entry has an empty host name", role)));
                }
                if host.port == 0 {
                    return Err(Error::Config(format!("{} host '{}' has port 0", role, host.host)));
                }
                host.effective_weight()?;
            }
        }

        if self.connect_timeout_secs == Some(0) {
            return Err(Error::Config("connect_timeout_secs must be greater than 0".to_string()));
        }

        Ok(())
    }
}

/// Document root: the database settings live under `db`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConfig {
    #[serde(default)]
    pub db: DbConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout_secs() -> u64 {
    5
}

/// Resolve a single environment variable reference
/// Supports: $VAR_NAME or ${VAR_NAME}
/// Anything else, including `$` followed by a non-name, is returned as-is
fn resolve_env_var(value: &str) -> Result<String> {
    let Some(var_name) = value.trim().strip_prefix('$').and_then(env_var_name) else {
        return Ok(value.to_string());
    };

    std::env::var(var_name)
        .map_err(|_| Error::Config(format!("Environment variable not found: {}", var_name)))
}

/// Variable name of a `VAR` or `{VAR}` reference body
fn env_var_name(reference: &str) -> Option<&str> {
    let name = match reference.strip_prefix('{') {
        Some(braced) => braced.strip_suffix('}')?,
        None => reference,
    };

    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    valid.then_some(name)
}
