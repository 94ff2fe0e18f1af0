//! Interpretation of a VM's `config.hardware.device` list.

use serde::Deserialize;
use serde_json::Value;
use vmops_common::{AdapterType, DiskType};

use crate::domain::datastore::DatastorePath;
use crate::domain::error::VmopsError;

const VIRTUAL_DISK: &str = "VirtualDisk";
const FLAT_BACKING: &str = "VirtualDiskFlatVer2BackingInfo";

/// One entry of the device list as the endpoint reports it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDevice {
    pub kind: String,
    pub key: i32,
    #[serde(default)]
    pub controller_key: Option<i32>,
    #[serde(default)]
    pub unit_number: Option<i32>,
    #[serde(default)]
    pub backing: Option<DeviceBacking>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceBacking {
    pub kind: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub thin_provisioned: bool,
    #[serde(default)]
    pub eagerly_scrub: bool,
}

/// What a VM's hardware says about its root disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDisk {
    pub file: Option<DatastorePath>,
    pub adapter_type: AdapterType,
    pub disk_type: DiskType,
    pub controller_key: Option<i32>,
    /// Highest unit number in use on the disk's controller.
    pub max_unit_number: i32,
}

/// Parses the raw device list.
///
/// # Errors
///
/// Returns [`VmopsError::Malformed`] when the value is not a device array.
pub fn parse_devices(raw: &Value) -> Result<Vec<VirtualDevice>, VmopsError> {
    if raw.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(raw.clone()).map_err(|e| VmopsError::malformed("device list", e))
}

/// Locates the first flat-backed virtual disk and its controller.
#[must_use]
pub fn root_disk(devices: &[VirtualDevice]) -> RootDisk {
    let disk = devices.iter().find(|d| {
        d.kind == VIRTUAL_DISK && d.backing.as_ref().is_some_and(|b| b.kind == FLAT_BACKING)
    });

    let controller_key = disk.and_then(|d| d.controller_key);
    let adapter_type = controller_key
        .and_then(|key| devices.iter().find(|d| d.key == key))
        .and_then(|c| AdapterType::from_controller_kind(&c.kind))
        .unwrap_or_default();
    let max_unit_number = devices
        .iter()
        .filter(|d| d.controller_key.is_some() && d.controller_key == controller_key)
        .filter_map(|d| d.unit_number)
        .max()
        .unwrap_or(0);

    let backing = disk.and_then(|d| d.backing.as_ref());
    let disk_type = match backing {
        Some(b) if b.thin_provisioned => DiskType::Thin,
        _ => DiskType::Preallocated,
    };

    RootDisk {
        file: backing
            .and_then(|b| b.file_name.as_deref())
            .and_then(DatastorePath::parse),
        adapter_type,
        disk_type,
        controller_key,
        max_unit_number,
    }
}
