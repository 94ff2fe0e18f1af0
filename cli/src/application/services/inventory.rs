//! Lookups of inventory objects by name and placement resolution.
//!
//! Nothing here is cached: every workflow rediscovers the objects it needs,
//! so a retried workflow sees the endpoint's current state.

use serde_json::Value;
use tracing::debug;
use vmops_common::{ManagedObjectReference, ObjectContent, PowerState};

use crate::application::ports::RemoteGateway;
use crate::application::services::session::Session;
use crate::domain::hardware::{self, RootDisk};
use crate::domain::vm::TeardownTarget;
use crate::domain::{DatastorePath, InstanceInfo, InstanceSummary, VmHandle, VmopsError};

pub const VIRTUAL_MACHINE: &str = "VirtualMachine";
const HOST_SYSTEM: &str = "HostSystem";
const CLUSTER: &str = "ClusterComputeResource";
const DATACENTER: &str = "Datacenter";
const DATASTORE: &str = "Datastore";
const RESOURCE_POOL: &str = "ResourcePool";

/// Datastore types new disks may be placed on.
const USABLE_DATASTORE_TYPES: &[&str] = &["VMFS", "NFS"];

/// A datastore chosen for new files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastoreTarget {
    pub moref: ManagedObjectReference,
    pub name: String,
}

/// Where a new VM goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub datacenter: ManagedObjectReference,
    pub datacenter_name: String,
    pub vm_folder: ManagedObjectReference,
    pub resource_pool: ManagedObjectReference,
    pub host: ManagedObjectReference,
    pub datastore: DatastoreTarget,
}

/// Name-based inventory queries over a session.
pub struct Inventory<'s, G: RemoteGateway> {
    session: &'s Session<G>,
    cluster: Option<&'s str>,
}

impl<'s, G: RemoteGateway> Inventory<'s, G> {
    #[must_use]
    pub fn new(session: &'s Session<G>, cluster: Option<&'s str>) -> Self {
        Self { session, cluster }
    }

    // ── VMs ───────────────────────────────────────────────────────────────────

    /// Look a VM up by name.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn find_vm(&self, name: &str) -> Result<Option<VmHandle>, VmopsError> {
        let vms = self.session.list_objects(VIRTUAL_MACHINE, &["name"]).await?;
        Ok(vms
            .into_iter()
            .find(|vm| vm.prop_str("name") == Some(name))
            .map(|vm| VmHandle {
                name: name.to_string(),
                moref: vm.obj,
            }))
    }

    /// Like [`Inventory::find_vm`], but absence is an error.
    ///
    /// # Errors
    ///
    /// Returns [`VmopsError::NotFound`] when no VM has that name.
    pub async fn require_vm(&self, name: &str) -> Result<VmHandle, VmopsError> {
        self.find_vm(name)
            .await?
            .ok_or_else(|| VmopsError::not_found("instance", name))
    }

    /// Names and power states of all healthy VMs. Orphaned or inaccessible
    /// VMs are skipped.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn list_instances(&self) -> Result<Vec<InstanceSummary>, VmopsError> {
        let vms = self
            .session
            .list_objects(
                VIRTUAL_MACHINE,
                &["name", "runtime.connectionState", "runtime.powerState"],
            )
            .await?;
        let mut instances: Vec<InstanceSummary> = vms
            .iter()
            .filter(|vm| {
                !matches!(
                    vm.prop_str("runtime.connectionState"),
                    Some("orphaned" | "inaccessible")
                )
            })
            .filter_map(|vm| {
                let name = vm.prop_str("name")?;
                let power_state = parse_power_state(vm.prop("runtime.powerState")).ok()?;
                Some(InstanceSummary {
                    name: name.to_string(),
                    power_state,
                })
            })
            .collect();
        instances.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = instances.len(), "listed instances");
        Ok(instances)
    }

    /// Current power state of a VM.
    ///
    /// # Errors
    ///
    /// Propagates session errors; [`VmopsError::Malformed`] when the state is
    /// unreadable.
    pub async fn power_state(&self, vm: &ManagedObjectReference) -> Result<PowerState, VmopsError> {
        let raw = self.session.get_property(vm, "runtime.powerState").await?;
        parse_power_state(Some(&raw))
    }

    /// Power state and vmx location, read before teardown.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn teardown_target(
        &self,
        vm: &ManagedObjectReference,
    ) -> Result<TeardownTarget, VmopsError> {
        let power_state = self.power_state(vm).await?;
        let vmx = self
            .session
            .get_property(vm, "config.files.vmPathName")
            .await?;
        Ok(TeardownTarget {
            power_state,
            vmx_path: vmx.as_str().and_then(DatastorePath::parse),
        })
    }

    /// Root disk of a VM as reported by its hardware.
    ///
    /// # Errors
    ///
    /// Propagates session errors; [`VmopsError::Malformed`] for an
    /// unparseable device list.
    pub async fn root_disk(&self, vm: &ManagedObjectReference) -> Result<RootDisk, VmopsError> {
        let raw = self
            .session
            .get_property(vm, "config.hardware.device")
            .await?;
        let devices = hardware::parse_devices(&raw)?;
        Ok(hardware::root_disk(&devices))
    }

    /// Details of one VM for display.
    ///
    /// # Errors
    ///
    /// Returns [`VmopsError::NotFound`] when no VM has that name.
    pub async fn instance_info(&self, name: &str) -> Result<InstanceInfo, VmopsError> {
        let vm = self.require_vm(name).await?;
        let power_state = self.power_state(&vm.moref).await?;
        let num_cpu = self
            .session
            .get_property(&vm.moref, "summary.config.numCpu")
            .await?;
        let memory_mb = self
            .session
            .get_property(&vm.moref, "summary.config.memorySizeMB")
            .await?;
        let vmx = self
            .session
            .get_property(&vm.moref, "config.files.vmPathName")
            .await?;
        let disk = self.root_disk(&vm.moref).await?;
        Ok(InstanceInfo {
            name: vm.name,
            power_state,
            num_cpu: num_cpu.as_u64().unwrap_or_default(),
            memory_mb: memory_mb.as_u64().unwrap_or_default(),
            vmx_path: vmx.as_str().map(str::to_string),
            root_disk: disk.file.map(|f| f.to_string()),
        })
    }

    // ── Placement ─────────────────────────────────────────────────────────────

    /// Resolve where new VMs and files go.
    ///
    /// # Errors
    ///
    /// Returns [`VmopsError::NotFound`] for a missing datacenter, cluster,
    /// host, resource pool or usable datastore.
    pub async fn placement(&self) -> Result<Placement, VmopsError> {
        let (datacenter, datacenter_name, vm_folder) = self.datacenter().await?;
        let host = self.host().await?;
        let resource_pool = self.resource_pool().await?;
        let datastore = self.datastore().await?;
        Ok(Placement {
            datacenter,
            datacenter_name,
            vm_folder,
            resource_pool,
            host,
            datastore,
        })
    }

    /// First datacenter, its name and its VM folder.
    ///
    /// # Errors
    ///
    /// Returns [`VmopsError::NotFound`] when the endpoint reports none.
    pub async fn datacenter(
        &self,
    ) -> Result<(ManagedObjectReference, String, ManagedObjectReference), VmopsError> {
        let dcs = self
            .session
            .list_objects(DATACENTER, &["name", "vmFolder"])
            .await?;
        let dc = dcs
            .into_iter()
            .next()
            .ok_or_else(|| VmopsError::not_found("datacenter", "<any>"))?;
        let name = dc.prop_str("name").unwrap_or_default().to_string();
        let folder = moref_prop(&dc, "vmFolder")?;
        Ok((dc.obj, name, folder))
    }

    /// Host VMs are placed on: the first host of the configured cluster, or
    /// the first host overall.
    ///
    /// # Errors
    ///
    /// Returns [`VmopsError::NotFound`] when no host qualifies.
    pub async fn host(&self) -> Result<ManagedObjectReference, VmopsError> {
        match self.cluster {
            Some(cluster) => {
                let cluster_ref = self.cluster_ref(cluster).await?;
                let hosts = self.session.get_property(&cluster_ref, "host").await?;
                first_moref(&hosts).ok_or_else(|| VmopsError::not_found("host in cluster", cluster))
            }
            None => self
                .session
                .list_objects(HOST_SYSTEM, &["name"])
                .await?
                .into_iter()
                .next()
                .map(|h| h.obj)
                .ok_or_else(|| VmopsError::not_found("host", "<any>")),
        }
    }

    /// Host or cluster whose `network` property lists the usable networks.
    ///
    /// # Errors
    ///
    /// Same as [`Inventory::host`].
    pub async fn network_scope(&self) -> Result<ManagedObjectReference, VmopsError> {
        match self.cluster {
            Some(cluster) => self.cluster_ref(cluster).await,
            None => self.host().await,
        }
    }

    async fn resource_pool(&self) -> Result<ManagedObjectReference, VmopsError> {
        match self.cluster {
            Some(cluster) => {
                let cluster_ref = self.cluster_ref(cluster).await?;
                let pool = self
                    .session
                    .get_property(&cluster_ref, "resourcePool")
                    .await?;
                serde_json::from_value(pool).map_err(|e| VmopsError::malformed("resourcePool", e))
            }
            None => self
                .session
                .list_objects(RESOURCE_POOL, &[])
                .await?
                .into_iter()
                .next()
                .map(|p| p.obj)
                .ok_or_else(|| VmopsError::not_found("resource pool", "<any>")),
        }
    }

    /// First accessible VMFS or NFS datastore in scope.
    ///
    /// # Errors
    ///
    /// Returns [`VmopsError::NotFound`] when none qualifies.
    pub async fn datastore(&self) -> Result<DatastoreTarget, VmopsError> {
        let members = match self.cluster {
            Some(cluster) => {
                let cluster_ref = self.cluster_ref(cluster).await?;
                Some(self.morefs(&cluster_ref, "datastore").await?)
            }
            None => None,
        };
        self.pick_datastore(members.as_deref()).await
    }

    /// First usable datastore mounted on `host`.
    ///
    /// # Errors
    ///
    /// Returns [`VmopsError::NotFound`] when none qualifies.
    pub async fn datastore_on_host(
        &self,
        host: &ManagedObjectReference,
    ) -> Result<DatastoreTarget, VmopsError> {
        let members = self.morefs(host, "datastore").await?;
        self.pick_datastore(Some(&members)).await
    }

    /// Host with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`VmopsError::NotFound`] when no host has that name.
    pub async fn host_by_name(&self, name: &str) -> Result<ManagedObjectReference, VmopsError> {
        self.session
            .list_objects(HOST_SYSTEM, &["name"])
            .await?
            .into_iter()
            .find(|h| h.prop_str("name") == Some(name))
            .map(|h| h.obj)
            .ok_or_else(|| VmopsError::not_found("host", name))
    }

    async fn pick_datastore(
        &self,
        members: Option<&[ManagedObjectReference]>,
    ) -> Result<DatastoreTarget, VmopsError> {
        let stores = self
            .session
            .list_objects(
                DATASTORE,
                &["summary.type", "summary.name", "summary.accessible"],
            )
            .await?;
        stores
            .into_iter()
            .filter(|ds| members.is_none_or(|m| m.contains(&ds.obj)))
            .find(|ds| {
                ds.prop("summary.accessible").and_then(Value::as_bool) != Some(false)
                    && ds
                        .prop_str("summary.type")
                        .is_some_and(|t| USABLE_DATASTORE_TYPES.contains(&t))
            })
            .and_then(|ds| {
                let name = ds.prop_str("summary.name")?.to_string();
                Some(DatastoreTarget { moref: ds.obj, name })
            })
            .ok_or_else(|| VmopsError::not_found("datastore", "<VMFS or NFS>"))
    }

    async fn morefs(
        &self,
        obj: &ManagedObjectReference,
        path: &str,
    ) -> Result<Vec<ManagedObjectReference>, VmopsError> {
        match self.session.get_property(obj, path).await? {
            Value::Null => Ok(Vec::new()),
            raw => serde_json::from_value(raw).map_err(|e| VmopsError::malformed(path, e)),
        }
    }

    async fn cluster_ref(&self, cluster: &str) -> Result<ManagedObjectReference, VmopsError> {
        self.session
            .list_objects(CLUSTER, &["name"])
            .await?
            .into_iter()
            .find(|c| c.prop_str("name") == Some(cluster))
            .map(|c| c.obj)
            .ok_or_else(|| VmopsError::not_found("cluster", cluster))
    }
}

fn parse_power_state(raw: Option<&Value>) -> Result<PowerState, VmopsError> {
    let raw = raw.cloned().unwrap_or(Value::Null);
    serde_json::from_value(raw).map_err(|e| VmopsError::malformed("runtime.powerState", e))
}

fn moref_prop(obj: &ObjectContent, name: &str) -> Result<ManagedObjectReference, VmopsError> {
    let raw = obj.prop(name).cloned().unwrap_or(Value::Null);
    serde_json::from_value(raw).map_err(|e| VmopsError::malformed(name, e))
}

fn first_moref(raw: &Value) -> Option<ManagedObjectReference> {
    raw.as_array()?
        .first()
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}
