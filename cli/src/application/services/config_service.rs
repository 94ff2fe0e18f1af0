//! Application service: configuration use-cases.

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::config::{VmopsConfig, apply_config_value};

/// Load configuration.
pub fn load_config(store: &impl ConfigStore) -> Result<VmopsConfig> {
    store.load()
}

/// Validate and persist one `key = value` setting. Returns the updated
/// configuration.
pub fn set_config_value(store: &impl ConfigStore, key: &str, value: &str) -> Result<VmopsConfig> {
    let mut config = store.load()?;
    apply_config_value(&mut config, key, value)?;
    store
        .save(&config)
        .with_context(|| format!("failed to save {key}"))?;
    Ok(config)
}
