//! dbroute Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout dbroute:
//! - Host and assurance configuration
//! - Execution context supplied by callers
//! - Connector trait abstraction over the database transport
//! - Core error types

pub mod config;
pub mod config_store;
pub mod connector;
pub mod context;
pub mod error;

pub use config::{AssureConfig, AssureWriteConfig, DbConfig, HostConfig, Role, RootConfig};
pub use config_store::{ConfigChange, ConfigChangeStream, ConfigStore};
pub use connector::Connector;
pub use context::ExecutionContext;
pub use error::{Error, Result};
