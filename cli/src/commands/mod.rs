//! Command implementations

pub mod config;
pub mod destroy;
pub mod info;
pub mod list;
pub mod migrate;
pub mod power;
pub mod rescue;
pub mod snapshot;
pub mod spawn;
pub mod version;

use std::path::Path;

use anyhow::{Context, Result};
use vmops_common::ProvisionRequest;

/// Read a provision request from a YAML or JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_request(path: &Path) -> Result<ProvisionRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("cannot parse provision request {}", path.display()))
}
