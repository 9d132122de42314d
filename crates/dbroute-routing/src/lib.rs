//! dbroute Routing Engine
//!
//! This crate provides the read/write routing logic for dbroute:
//! - Per-role host pools with weighted expansion
//! - Weighted random host selection
//! - Connection opening with bounded retries across hosts
//! - Write assurance rules (tables, sessions, CLI dispatch)
//! - Router façade with atomic configuration reload

pub mod host_pool;
pub mod opener;
pub mod policy;
pub mod router;
pub mod selector;
pub mod transport;

// Re-export commonly used types
pub use host_pool::{HostPool, WeightedPool};
pub use opener::{ConnectSettings, ConnectionOpener};
pub use policy::{WriteAssurancePolicy, WriteReason};
pub use router::{Router, RoutingSnapshot};
pub use selector::HostSelector;
pub use transport::{TcpConnection, TcpConnector};
