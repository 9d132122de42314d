//! Weighted random host selection
//!
//! Draws a uniformly random slot from a pool's weighted expansion, so a host
//! with weight 3 is picked exactly three times as often as a host with
//! weight 1.
//!
//! ```rust
//! use dbroute_core::{HostConfig, Role};
//! use dbroute_routing::{HostSelector, WeightedPool};
//!
//! let pool = WeightedPool::build(
//!     Role::Read,
//!     &[
//!         HostConfig::new("replica1", 3306).with_weight(3),
//!         HostConfig::new("replica2", 3306),
//!     ],
//! )
//! .unwrap();
//!
//! let host = HostSelector::new().select(&pool).unwrap();
//! assert!(host.host.starts_with("replica"));
//! ```

use crate::host_pool::WeightedPool;
use dbroute_core::{Error, HostConfig, Result};
use rand::Rng;

/// Stateless weighted random picker
#[derive(Debug, Clone, Copy, Default)]
pub struct HostSelector;

impl HostSelector {
    pub fn new() -> Self {
        Self
    }

    /// Pick a host using the thread-local random generator
    pub fn select<'a>(&self, pool: &'a WeightedPool) -> Result<&'a HostConfig> {
        self.select_with(pool, &mut rand::rng())
    }

    /// Pick a host drawing from `rng`
    ///
    /// A single-host pool returns that host without touching `rng`.
    pub fn select_with<'a, R: Rng>(
        &self,
        pool: &'a WeightedPool,
        rng: &mut R,
    ) -> Result<&'a HostConfig> {
        match pool.hosts() {
            [] => Err(Error::NoHosts { role: pool.role() }),
            [only] => Ok(only),
            _ => {
                let slot = rng.random_range(0..pool.total_weight());
                pool.host_at_slot(slot).ok_or_else(|| {
                    Error::Internal(format!(
                        "slot {} outside weighted {} pool of {}",
                        slot,
                        pool.role(),
                        pool.total_weight()
                    ))
                })
            }
        }
    }
}
