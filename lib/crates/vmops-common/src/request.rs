//! Provisioning request types.

use serde::{Deserialize, Serialize};

/// Guest OS identifier used when an image does not declare one.
pub const DEFAULT_OS_TYPE: &str = "otherGuest";

/// Disk provisioning strategy of an image or attached disk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DiskType {
    /// Space reserved eagerly; the payload lives in a `-flat.vmdk` file.
    #[default]
    Preallocated,
    /// Space allocated on demand.
    Thin,
    /// Streamable sparse image; must be converted before a VM can use it.
    Sparse,
}

impl DiskType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DiskType::Preallocated => "preallocated",
            DiskType::Thin => "thin",
            DiskType::Sparse => "sparse",
        }
    }
}

/// Storage controller type a disk is attached through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AdapterType {
    #[default]
    LsiLogic,
    BusLogic,
    Ide,
    LsiLogicSas,
}

impl AdapterType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AdapterType::LsiLogic => "lsiLogic",
            AdapterType::BusLogic => "busLogic",
            AdapterType::Ide => "ide",
            AdapterType::LsiLogicSas => "lsiLogicSas",
        }
    }

    /// Device class name of the controller backing this adapter type.
    #[must_use]
    pub fn controller_kind(self) -> &'static str {
        match self {
            AdapterType::LsiLogic => "VirtualLsiLogicController",
            AdapterType::BusLogic => "VirtualBusLogicController",
            AdapterType::Ide => "VirtualIDEController",
            AdapterType::LsiLogicSas => "VirtualLsiLogicSASController",
        }
    }

    /// Inverse of [`AdapterType::controller_kind`].
    ///
    /// SAS controllers are reported as plain `lsiLogic`, which is what disk
    /// specs expect for them.
    #[must_use]
    pub fn from_controller_kind(kind: &str) -> Option<Self> {
        match kind {
            "VirtualLsiLogicController" | "VirtualLsiLogicSASController" => {
                Some(AdapterType::LsiLogic)
            }
            "VirtualBusLogicController" => Some(AdapterType::BusLogic),
            "VirtualIDEController" => Some(AdapterType::Ide),
            _ => None,
        }
    }
}

/// One virtual NIC of a provisioning request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub mac_address: String,
    /// Network / port group to bind to. Empty selects the integration bridge.
    #[serde(default)]
    pub port_group_name: String,
    /// When set, the port group is created on demand with this VLAN tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
    /// Opaque interface id forwarded to the endpoint as NIC metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iface_id: Option<String>,
}

impl NetworkInterface {
    /// Whether the interface asks for dynamic VLAN port-group provisioning.
    #[must_use]
    pub fn requests_vlan(&self) -> bool {
        self.vlan_id.is_some()
    }
}

/// Source image of the root disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// Image identifier understood by the image transport.
    pub image_ref: String,
    /// Size of the disk payload in KB.
    pub size_kb: u64,
    #[serde(default)]
    pub adapter_type: AdapterType,
    #[serde(default)]
    pub disk_type: DiskType,
    #[serde(default = "default_os_type")]
    pub os_type: String,
}

/// Everything needed to build one VM. `name` is the unique key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    pub name: String,
    pub vcpus: u32,
    pub memory_mb: u64,
    pub image: ImageSpec,
    #[serde(default)]
    pub interfaces: Vec<NetworkInterface>,
}

impl ProvisionRequest {
    /// Copy of this request under a different instance name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

fn default_os_type() -> String {
    DEFAULT_OS_TYPE.to_string()
}
