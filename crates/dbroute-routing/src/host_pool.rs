//! Per-role host pools
//!
//! A `HostPool` holds the configured read and write servers. Each role is kept
//! as a `WeightedPool`: the hosts in configured order plus a flattened slot
//! table in which every host index appears `weight` times.

use dbroute_core::{DbConfig, Error, HostConfig, Result, Role};

/// Hosts of one role together with their weighted expansion
#[derive(Debug, Clone)]
pub struct WeightedPool {
    role: Role,
    hosts: Vec<HostConfig>,
    /// Index into `hosts`, repeated `effective_weight` times per host
    slots: Vec<usize>,
}

impl WeightedPool {
    /// Build the expansion for `hosts`
    ///
    /// Fails only on malformed weights. An empty host list yields an empty pool.
    pub fn build(role: Role, hosts: &[HostConfig]) -> Result<Self> {
        let mut slots = Vec::new();

        for (index, host) in hosts.iter().enumerate() {
            let weight = host.effective_weight()?;
            slots.extend(std::iter::repeat_n(index, weight));
        }

        Ok(Self {
            role,
            hosts: hosts.to_vec(),
            slots,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Hosts in configured order
    pub fn hosts(&self) -> &[HostConfig] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Size of the weighted expansion (sum of effective weights)
    pub fn total_weight(&self) -> usize {
        self.slots.len()
    }

    /// Host occupying position `slot` of the expansion
    pub fn host_at_slot(&self, slot: usize) -> Option<&HostConfig> {
        self.slots.get(slot).map(|&index| &self.hosts[index])
    }
}

/// Configured servers for both roles
#[derive(Debug, Clone)]
pub struct HostPool {
    read: WeightedPool,
    write: WeightedPool,
}

impl HostPool {
    /// Build both pools, rejecting malformed weights
    pub fn from_config(config: &DbConfig) -> Result<Self> {
        Ok(Self {
            read: WeightedPool::build(Role::Read, &config.read)?,
            write: WeightedPool::build(Role::Write, &config.write)?,
        })
    }

    /// Hosts configured for `role`
    ///
    /// # Errors
    /// `Error::NoHosts` when the role has no hosts.
    pub fn hosts_for_role(&self, role: Role) -> Result<&[HostConfig]> {
        self.weighted(role).map(WeightedPool::hosts)
    }

    /// Weighted pool for `role`, failing the same way as `hosts_for_role`
    pub fn weighted(&self, role: Role) -> Result<&WeightedPool> {
        let pool = match role {
            Role::Read => &self.read,
            Role::Write => &self.write,
        };

        if pool.is_empty() {
            return Err(Error::NoHosts { role });
        }

        Ok(pool)
    }
}
