//! Domain types and validators for vmops configuration.
//!
//! Pure functions only, no I/O, no async, no filesystem access.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "endpoint.host",
    "endpoint.scheme",
    "endpoint.username",
    "policy.retry_budget",
    "policy.retry_delay_secs",
    "policy.task_poll_interval_secs",
    "policy.task_timeout_secs",
    "provisioning.use_linked_clone",
    "provisioning.base_dir_name",
    "provisioning.vlan_interface",
    "provisioning.integration_bridge",
    "provisioning.cluster",
    "provisioning.image_dir",
];
pub const VALID_SCHEMES: &[&str] = &["http", "https"];

/// Keys whose value may be cleared with `none`.
const OPTIONAL_KEYS: &[&str] = &[
    "policy.task_timeout_secs",
    "provisioning.cluster",
    "provisioning.image_dir",
];

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.vmops/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct VmopsConfig {
    pub endpoint: EndpointConfig,
    pub policy: PolicyConfig,
    pub provisioning: ProvisioningSettings,
}

/// Where and as whom to connect. The password is never stored here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    pub host: String,
    pub scheme: String,
    pub username: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            scheme: "https".to_string(),
            username: "root".to_string(),
        }
    }
}

impl EndpointConfig {
    /// Base URL of the endpoint, e.g. `https://esx01`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

impl VmopsConfig {
    /// Reject values `config set` would refuse, for files edited by hand.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a zero task poll interval.
    pub fn validate(&self) -> Result<()> {
        if self.policy.task_poll_interval_secs == 0 {
            return Err(invalid(
                "policy.task_poll_interval_secs",
                "0",
                "a positive number of seconds",
            ));
        }
        Ok(())
    }
}

/// Retry and polling knobs as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    pub retry_budget: u32,
    pub retry_delay_secs: u64,
    pub task_poll_interval_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_timeout_secs: Option<u64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            retry_budget: 10,
            retry_delay_secs: 2,
            task_poll_interval_secs: 5,
            task_timeout_secs: None,
        }
    }
}

impl PolicyConfig {
    #[must_use]
    pub fn to_policy(&self) -> Policy {
        Policy {
            retry_budget: self.retry_budget,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            task_poll_interval: Duration::from_secs(self.task_poll_interval_secs),
            task_timeout: self.task_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Runtime retry/poll policy shared by the session and the task waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Maximum attempts per remote call. Zero behaves like one.
    pub retry_budget: u32,
    pub retry_delay: Duration,
    pub task_poll_interval: Duration,
    /// Upper bound on a single task wait. `None` waits forever.
    pub task_timeout: Option<Duration>,
}

impl Default for Policy {
    fn default() -> Self {
        PolicyConfig::default().to_policy()
    }
}

/// Shortest task poll period; a zero interval would spin the endpoint.
pub const MIN_TASK_POLL_INTERVAL: Duration = Duration::from_millis(1);

impl Policy {
    /// Number of attempts a call is allowed, never less than one.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.retry_budget.max(1)
    }

    /// Task poll period, never shorter than [`MIN_TASK_POLL_INTERVAL`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.task_poll_interval.max(MIN_TASK_POLL_INTERVAL)
    }
}

/// Provisioning defaults applied to every spawn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvisioningSettings {
    /// Reuse a cached base disk per image instead of copying it per VM.
    pub use_linked_clone: bool,
    /// Datastore folder holding cached base disks.
    pub base_dir_name: String,
    /// Physical NIC VLAN port groups are bound to.
    pub vlan_interface: String,
    /// Network used by interfaces that name no port group.
    pub integration_bridge: String,
    /// Cluster to place VMs in; `None` uses the first host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    /// Local directory the image transport reads from and writes to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_dir: Option<PathBuf>,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            use_linked_clone: false,
            base_dir_name: "vmware_base".to_string(),
            vlan_interface: "vmnic0".to_string(),
            integration_bridge: "br-int".to_string(),
            cluster: None,
            image_dir: None,
        }
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Parses `value` for `key` and stores it in `config`.
///
/// # Errors
///
/// Returns an error if the key is unknown or the value does not parse.
pub fn apply_config_value(config: &mut VmopsConfig, key: &str, value: &str) -> Result<()> {
    validate_config_key(key)?;
    let cleared = OPTIONAL_KEYS.contains(&key) && value == "none";
    match key {
        "endpoint.host" => config.endpoint.host = non_empty(key, value)?,
        "endpoint.scheme" => {
            if !VALID_SCHEMES.contains(&value) {
                return Err(invalid(key, value, &VALID_SCHEMES.join(", ")));
            }
            config.endpoint.scheme = value.to_string();
        }
        "endpoint.username" => config.endpoint.username = non_empty(key, value)?,
        "policy.retry_budget" => config.policy.retry_budget = parse_number(key, value)?,
        "policy.retry_delay_secs" => config.policy.retry_delay_secs = parse_number(key, value)?,
        "policy.task_poll_interval_secs" => {
            let secs: u64 = parse_number(key, value)?;
            if secs == 0 {
                return Err(invalid(key, value, "a positive number of seconds"));
            }
            config.policy.task_poll_interval_secs = secs;
        }
        "policy.task_timeout_secs" => {
            config.policy.task_timeout_secs = if cleared {
                None
            } else {
                Some(parse_number(key, value)?)
            };
        }
        "provisioning.use_linked_clone" => {
            config.provisioning.use_linked_clone = value
                .parse()
                .map_err(|_| invalid(key, value, "true, false"))?;
        }
        "provisioning.base_dir_name" => config.provisioning.base_dir_name = non_empty(key, value)?,
        "provisioning.vlan_interface" => config.provisioning.vlan_interface = non_empty(key, value)?,
        "provisioning.integration_bridge" => {
            config.provisioning.integration_bridge = non_empty(key, value)?;
        }
        "provisioning.cluster" => {
            config.provisioning.cluster = (!cleared).then(|| value.to_string());
        }
        "provisioning.image_dir" => {
            config.provisioning.image_dir = (!cleared).then(|| PathBuf::from(value));
        }
        _ => {
            return Err(ConfigError::UnknownKey {
                key: key.to_string(),
                valid: VALID_CONFIG_KEYS.join(", "),
            }
            .into());
        }
    }
    Ok(())
}

fn non_empty(key: &str, value: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(invalid(key, value, "a non-empty string"));
    }
    Ok(value.to_string())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| invalid(key, value, "a non-negative integer"))
}

fn invalid(key: &str, value: &str, expected: &str) -> anyhow::Error {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
    .into()
}

// ── Unit tests ───────────────────────────────────────────────────────────────
