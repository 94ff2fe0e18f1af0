//! Builders for the configuration payloads sent with remote calls.
//!
//! Every builder is a pure function from domain values to the JSON shape
//! the gateway forwards verbatim.

use serde_json::{Value, json};
use vmops_common::{AdapterType, DiskType, ManagedObjectReference, ProvisionRequest};

use crate::domain::datastore::DatastorePath;

/// Temporary key of a controller added in the same reconfigure as its disk.
const NEW_CONTROLLER_KEY: i32 = -101;
/// Default IDE controller every VM is created with.
const DEFAULT_IDE_CONTROLLER_KEY: i32 = 200;
const NEW_DISK_KEY: i32 = -100;
const NEW_NIC_KEY: i32 = -47;
const NIC_KIND: &str = "VirtualE1000";

// ── Networks ──────────────────────────────────────────────────────────────────

/// Backing a virtual NIC connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkRef {
    /// Host-local port group, referenced by name.
    Standard { name: String },
    /// Port group on a distributed switch.
    Distributed {
        portgroup_key: String,
        switch_uuid: String,
    },
}

/// A request interface whose network has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInterface {
    pub mac_address: String,
    pub network: NetworkRef,
    pub iface_id: Option<String>,
}

// ── Disks ─────────────────────────────────────────────────────────────────────

/// A disk to attach to a VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskAttachment {
    /// Descriptor file; for a linked clone, the parent base disk.
    pub file: DatastorePath,
    pub adapter_type: AdapterType,
    pub disk_type: DiskType,
    pub capacity_kb: Option<u64>,
    /// Existing controller to attach through. `None` adds a new one.
    pub controller_key: Option<i32>,
    pub unit_number: Option<i32>,
    /// Create a delta disk on top of `file` instead of using it directly.
    pub linked_clone: bool,
}

impl DiskAttachment {
    #[must_use]
    pub fn new(file: DatastorePath, adapter_type: AdapterType, disk_type: DiskType) -> Self {
        Self {
            file,
            adapter_type,
            disk_type,
            capacity_kb: None,
            controller_key: None,
            unit_number: None,
            linked_clone: false,
        }
    }
}

// ── Builders ──────────────────────────────────────────────────────────────────

/// Shell VM: compute settings only, no disks and no NICs.
#[must_use]
pub fn create_vm_spec(request: &ProvisionRequest, datastore: &str) -> Value {
    json!({
        "name": request.name,
        "guestId": request.image.os_type,
        "files": { "vmPathName": DatastorePath::root(datastore).to_string() },
        "tools": {
            "afterPowerOn": true,
            "afterResume": true,
            "beforeGuestStandby": true,
            "beforeGuestShutdown": true,
            "beforeGuestReboot": true,
        },
        "numCPUs": request.vcpus,
        "memoryMB": request.memory_mb,
        "deviceChange": [],
    })
}

/// Reconfigure spec adding one NIC per interface, with interface ids as
/// `nvp.iface-id.<n>` extra config.
#[must_use]
pub fn add_nics_spec(interfaces: &[ResolvedInterface]) -> Value {
    let devices: Vec<Value> = interfaces
        .iter()
        .map(|iface| {
            let backing = match &iface.network {
                NetworkRef::Standard { name } => json!({
                    "kind": "VirtualEthernetCardNetworkBackingInfo",
                    "deviceName": name,
                }),
                NetworkRef::Distributed {
                    portgroup_key,
                    switch_uuid,
                } => json!({
                    "kind": "VirtualEthernetCardDistributedVirtualPortBackingInfo",
                    "port": { "switchUuid": switch_uuid, "portgroupKey": portgroup_key },
                }),
            };
            json!({
                "operation": "add",
                "device": {
                    "kind": NIC_KIND,
                    "key": NEW_NIC_KEY,
                    "addressType": "manual",
                    "macAddress": iface.mac_address,
                    "wakeOnLanEnabled": true,
                    "connectable": { "startConnected": true, "allowGuestControl": true, "connected": true },
                    "backing": backing,
                },
            })
        })
        .collect();
    let extra: Vec<Value> = interfaces
        .iter()
        .filter_map(|iface| iface.iface_id.as_deref())
        .enumerate()
        .map(|(i, id)| json!({ "key": format!("nvp.iface-id.{i}"), "value": id }))
        .collect();
    json!({ "deviceChange": devices, "extraConfig": extra })
}

/// Reconfigure spec attaching a disk, adding a controller first when needed.
#[must_use]
pub fn attach_disk_spec(disk: &DiskAttachment) -> Value {
    let mut changes = Vec::new();
    let controller_key = match disk.controller_key {
        Some(key) => key,
        None if disk.adapter_type == AdapterType::Ide => DEFAULT_IDE_CONTROLLER_KEY,
        None => {
            changes.push(json!({
                "operation": "add",
                "device": {
                    "kind": disk.adapter_type.controller_kind(),
                    "key": NEW_CONTROLLER_KEY,
                    "busNumber": 0,
                    "sharedBus": "noSharing",
                },
            }));
            NEW_CONTROLLER_KEY
        }
    };

    let mut backing = json!({
        "kind": "VirtualDiskFlatVer2BackingInfo",
        "diskMode": "persistent",
        "fileName": disk.file.to_string(),
        "thinProvisioned": disk.disk_type == DiskType::Thin,
    });
    if disk.linked_clone {
        let parent = backing.clone();
        backing["fileName"] = json!("");
        backing["parent"] = parent;
    }

    let mut change = json!({
        "operation": "add",
        "device": {
            "kind": "VirtualDisk",
            "key": NEW_DISK_KEY,
            "controllerKey": controller_key,
            "unitNumber": disk.unit_number.unwrap_or(0),
            "capacityInKB": disk.capacity_kb.unwrap_or(0),
            "connectable": { "startConnected": true, "allowGuestControl": false, "connected": true },
            "backing": backing,
        },
    });
    if disk.linked_clone {
        change["fileOperation"] = json!("create");
    }
    changes.push(change);
    json!({ "deviceChange": changes })
}

/// File-backed disk spec for `CreateVirtualDisk_Task`.
#[must_use]
pub fn virtual_disk_spec(adapter: AdapterType, disk_type: DiskType, capacity_kb: u64) -> Value {
    json!({
        "adapterType": adapter.as_str(),
        "diskType": disk_type.as_str(),
        "capacityKb": capacity_kb,
    })
}

/// Destination spec for `CopyVirtualDisk_Task`.
#[must_use]
pub fn copy_disk_spec(adapter: AdapterType, disk_type: DiskType) -> Value {
    json!({
        "adapterType": adapter.as_str(),
        "diskType": disk_type.as_str(),
    })
}

/// Clone spec placing the copy on `datastore` under `host`.
#[must_use]
pub fn clone_spec(
    datastore: &ManagedObjectReference,
    host: Option<&ManagedObjectReference>,
    power_on: bool,
) -> Value {
    json!({
        "location": relocate_spec(datastore, host),
        "powerOn": power_on,
        "template": false,
    })
}

#[must_use]
pub fn relocate_spec(
    datastore: &ManagedObjectReference,
    host: Option<&ManagedObjectReference>,
) -> Value {
    json!({
        "datastore": datastore,
        "host": host,
        "diskMoveType": "moveAllDiskBackingsAndAllowSharing",
    })
}

/// Host port group tagged with `vlan_id` on `vswitch`. VLAN 0 means untagged.
#[must_use]
pub fn port_group_spec(vswitch: &str, name: &str, vlan_id: u16) -> Value {
    json!({
        "name": name,
        "vswitchName": vswitch,
        "vlanId": vlan_id,
        "policy": { "nicTeaming": { "notifySwitches": true } },
    })
}

/// Search spec matching a single file name under a folder, or anything when
/// no name is given.
#[must_use]
pub fn search_spec(file_name: Option<&str>) -> Value {
    match file_name {
        Some(name) => json!({ "matchPattern": [name] }),
        None => json!({}),
    }
}
