//! Network lookup and on-demand VLAN port group provisioning.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use vmops_common::ManagedObjectReference;

use crate::application::ports::{NetworkResolver, RemoteGateway};
use crate::application::services::inventory::Inventory;
use crate::application::services::session::Session;
use crate::domain::spec::port_group_spec;
use crate::domain::{FaultKind, NetworkRef, VmopsError};

const DISTRIBUTED_PORTGROUP: &str = "DistributedVirtualPortgroup";

#[derive(Debug, Deserialize)]
struct PhysicalNic {
    device: String,
}

#[derive(Debug, Deserialize)]
struct VirtualSwitch {
    name: String,
    #[serde(default)]
    pnic: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortGroupConfig {
    name: String,
    key: String,
    distributed_virtual_switch: ManagedObjectReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostPortGroup {
    spec: HostPortGroupSpec,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostPortGroupSpec {
    name: String,
    #[serde(default)]
    vlan_id: u16,
}

/// [`NetworkResolver`] backed by the host (or cluster) network inventory.
pub struct HostNetworks<'s, G: RemoteGateway> {
    session: &'s Session<G>,
    inventory: Inventory<'s, G>,
    vlan_interface: &'s str,
}

impl<'s, G: RemoteGateway> HostNetworks<'s, G> {
    #[must_use]
    pub fn new(session: &'s Session<G>, cluster: Option<&'s str>, vlan_interface: &'s str) -> Self {
        Self {
            session,
            inventory: Inventory::new(session, cluster),
            vlan_interface,
        }
    }

    async fn list<T: for<'de> Deserialize<'de>>(
        &self,
        obj: &ManagedObjectReference,
        path: &str,
    ) -> Result<Vec<T>, VmopsError> {
        match self.session.get_property(obj, path).await? {
            Value::Null => Ok(Vec::new()),
            raw => serde_json::from_value(raw).map_err(|e| VmopsError::malformed(path, e)),
        }
    }

    /// vSwitch uplinked through the configured physical NIC.
    async fn vswitch_for_vlan_interface(
        &self,
        host: &ManagedObjectReference,
    ) -> Result<String, VmopsError> {
        let pnics: Vec<PhysicalNic> = self.list(host, "config.network.pnic").await?;
        if !pnics.iter().any(|p| p.device == self.vlan_interface) {
            return Err(VmopsError::not_found("physical NIC", self.vlan_interface));
        }
        let vswitches: Vec<VirtualSwitch> = self.list(host, "config.network.vswitch").await?;
        vswitches
            .into_iter()
            .find(|vs| {
                vs.pnic.iter().any(|key| {
                    key.rsplit('-')
                        .next()
                        .is_some_and(|nic| nic.contains(self.vlan_interface))
                })
            })
            .map(|vs| vs.name)
            .ok_or_else(|| VmopsError::not_found("vSwitch for", self.vlan_interface))
    }

    async fn check_vlan_tag(
        &self,
        host: &ManagedObjectReference,
        name: &str,
        vlan_id: u16,
    ) -> Result<(), VmopsError> {
        let groups: Vec<HostPortGroup> = self.list(host, "config.network.portgroup").await?;
        match groups.into_iter().find(|g| g.spec.name == name) {
            Some(group) if group.spec.vlan_id != vlan_id => Err(VmopsError::VlanMismatch {
                port_group: name.to_string(),
                expected: vlan_id,
                actual: group.spec.vlan_id,
            }),
            _ => Ok(()),
        }
    }
}

impl<G: RemoteGateway> NetworkResolver for HostNetworks<'_, G> {
    async fn find_network(&self, name: &str) -> Result<Option<NetworkRef>, VmopsError> {
        let scope = self.inventory.network_scope().await?;
        let networks: Vec<ManagedObjectReference> = self.list(&scope, "network").await?;
        for network in &networks {
            if network.is_kind(DISTRIBUTED_PORTGROUP) {
                let config: PortGroupConfig = self.session.get_property_as(network, "config").await?;
                if config.name == name {
                    let uuid = self
                        .session
                        .get_property(&config.distributed_virtual_switch, "uuid")
                        .await?;
                    return Ok(Some(NetworkRef::Distributed {
                        portgroup_key: config.key,
                        switch_uuid: uuid.as_str().unwrap_or_default().to_string(),
                    }));
                }
            } else {
                let summary_name = self.session.get_property(network, "summary.name").await?;
                if summary_name.as_str() == Some(name) {
                    return Ok(Some(NetworkRef::Standard {
                        name: name.to_string(),
                    }));
                }
            }
        }
        debug!(network = name, scanned = networks.len(), "network not found");
        Ok(None)
    }

    async fn ensure_vlan_port_group(&self, name: &str, vlan_id: u16) -> Result<(), VmopsError> {
        let host = self.inventory.host().await?;
        let vswitch = self.vswitch_for_vlan_interface(&host).await?;

        if self.find_network(name).await?.is_some() {
            return self.check_vlan_tag(&host, name, vlan_id).await;
        }

        let network_system: ManagedObjectReference = self
            .session
            .get_property_as(&host, "configManager.networkSystem")
            .await?;
        let args = json!({ "portgrp": port_group_spec(&vswitch, name, vlan_id) });
        match self
            .session
            .invoke(&network_system, "AddPortGroup", args)
            .await
        {
            Ok(_) => {
                info!(port_group = name, vlan_id, vswitch = %vswitch, "created port group");
                Ok(())
            }
            Err(VmopsError::Remote(fault)) if fault.is(FaultKind::AlreadyExists) => {
                debug!(port_group = name, "port group created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
