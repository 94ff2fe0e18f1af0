//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod datastore;
pub mod error;
pub mod fault;
pub mod hardware;
pub mod naming;
pub mod spec;
pub mod vm;

pub use config::{Policy, ProvisioningSettings, VmopsConfig, validate_config_key};
pub use datastore::DatastorePath;
pub use error::{ConfigError, ErrorKind, VmopsError};
pub use fault::{Fault, FaultKind};
pub use spec::{DiskAttachment, NetworkRef, ResolvedInterface};
pub use vm::{DestroyReport, InstanceInfo, InstanceSummary, PhaseResult, VmHandle};
