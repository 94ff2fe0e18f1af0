//! VM creation: an ordered list of phases over a shared spawn context.

use std::fmt;

use serde_json::json;
use tracing::{Instrument as _, debug, info, info_span};
use vmops_common::{DiskType, ProvisionRequest};

use super::Orchestrator;
use crate::application::ports::{
    DatastoreFile, ImageTransport, NetworkResolver, ProgressReporter, RemoteGateway,
    VolumeAttacher,
};
use crate::application::services::inventory::Placement;
use crate::domain::naming::DiskLayout;
use crate::domain::spec::{add_nics_spec, copy_disk_spec, create_vm_spec, virtual_disk_spec};
use crate::domain::{DatastorePath, DiskAttachment, ResolvedInterface, VmHandle, VmopsError};

/// Phases of a spawn, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnPhase {
    CheckNotExists,
    CreateShellVm,
    ResolveNetworkInterfaces,
    ProvisionDisk,
    AttachDisk,
    PowerOn,
}

impl SpawnPhase {
    pub const ALL: [SpawnPhase; 6] = [
        SpawnPhase::CheckNotExists,
        SpawnPhase::CreateShellVm,
        SpawnPhase::ResolveNetworkInterfaces,
        SpawnPhase::ProvisionDisk,
        SpawnPhase::AttachDisk,
        SpawnPhase::PowerOn,
    ];

    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            SpawnPhase::CheckNotExists => "checking instance name",
            SpawnPhase::CreateShellVm => "creating VM",
            SpawnPhase::ResolveNetworkInterfaces => "connecting network interfaces",
            SpawnPhase::ProvisionDisk => "provisioning root disk",
            SpawnPhase::AttachDisk => "attaching root disk",
            SpawnPhase::PowerOn => "powering on",
        }
    }
}

impl fmt::Display for SpawnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State accumulated by spawn phases.
struct SpawnContext<'r> {
    request: &'r ProvisionRequest,
    placement: Option<Placement>,
    vm: Option<VmHandle>,
    disk: Option<DiskAttachment>,
}

impl<'r> SpawnContext<'r> {
    fn new(request: &'r ProvisionRequest) -> Self {
        Self {
            request,
            placement: None,
            vm: None,
            disk: None,
        }
    }
}

/// Reads a value an earlier phase must have produced.
fn produced<'a, T>(value: &'a Option<T>, what: &str) -> Result<&'a T, VmopsError> {
    value
        .as_ref()
        .ok_or_else(|| VmopsError::malformed("spawn state", format!("{what} not resolved yet")))
}

impl<G, N, V, I> Orchestrator<'_, G, N, V, I>
where
    G: RemoteGateway,
    N: NetworkResolver,
    V: VolumeAttacher,
    I: ImageTransport,
{
    /// Create, wire up and power on a new VM.
    ///
    /// Any phase failure aborts the workflow with its original error; earlier
    /// phases are not rolled back.
    ///
    /// # Errors
    ///
    /// [`VmopsError::InstanceExists`] when the name is taken, otherwise the
    /// first error of any phase.
    pub async fn spawn(
        &self,
        request: &ProvisionRequest,
        reporter: &impl ProgressReporter,
    ) -> Result<VmHandle, VmopsError> {
        let span = info_span!(parent: &self.span, "spawn", instance = %request.name);
        async {
            let mut ctx = SpawnContext::new(request);
            for phase in SpawnPhase::ALL {
                reporter.step(phase.describe());
                debug!(phase = %phase, "starting phase");
                self.run_spawn_phase(phase, &mut ctx).await?;
            }
            let vm = produced(&ctx.vm, "instance")?.clone();
            info!(vm = %vm.moref, "instance spawned");
            reporter.success(&format!("instance {} is running", request.name));
            Ok(vm)
        }
        .instrument(span)
        .await
    }

    async fn run_spawn_phase(
        &self,
        phase: SpawnPhase,
        ctx: &mut SpawnContext<'_>,
    ) -> Result<(), VmopsError> {
        match phase {
            SpawnPhase::CheckNotExists => self.check_not_exists(ctx).await,
            SpawnPhase::CreateShellVm => self.create_shell_vm(ctx).await,
            SpawnPhase::ResolveNetworkInterfaces => self.resolve_network_interfaces(ctx).await,
            SpawnPhase::ProvisionDisk => self.provision_disk(ctx).await,
            SpawnPhase::AttachDisk => self.attach_root_disk(ctx).await,
            SpawnPhase::PowerOn => {
                let vm = produced(&ctx.vm, "instance")?;
                self.run_task(&vm.moref, "PowerOnVM_Task", json!({})).await?;
                Ok(())
            }
        }
    }

    async fn check_not_exists(&self, ctx: &mut SpawnContext<'_>) -> Result<(), VmopsError> {
        match self.inventory.find_vm(&ctx.request.name).await? {
            Some(_) => Err(VmopsError::InstanceExists(ctx.request.name.clone())),
            None => Ok(()),
        }
    }

    async fn create_shell_vm(&self, ctx: &mut SpawnContext<'_>) -> Result<(), VmopsError> {
        let placement = self.inventory.placement().await?;
        self.run_task(
            &placement.vm_folder,
            "CreateVM_Task",
            json!({
                "config": create_vm_spec(ctx.request, &placement.datastore.name),
                "pool": placement.resource_pool,
            }),
        )
        .await?;
        // The create task yields no usable handle; look the VM up again.
        ctx.vm = Some(self.inventory.require_vm(&ctx.request.name).await?);
        ctx.placement = Some(placement);
        Ok(())
    }

    async fn resolve_network_interfaces(
        &self,
        ctx: &mut SpawnContext<'_>,
    ) -> Result<(), VmopsError> {
        let mut resolved = Vec::with_capacity(ctx.request.interfaces.len());
        for iface in &ctx.request.interfaces {
            let name = if iface.port_group_name.is_empty() {
                self.settings.integration_bridge.as_str()
            } else {
                iface.port_group_name.as_str()
            };
            let network = match (self.network.find_network(name).await?, iface.vlan_id) {
                (Some(network), _) => network,
                (None, Some(vlan_id)) => {
                    self.network.ensure_vlan_port_group(name, vlan_id).await?;
                    self.network
                        .find_network(name)
                        .await?
                        .ok_or_else(|| VmopsError::not_found("network", name))?
                }
                (None, None) => return Err(VmopsError::not_found("network", name)),
            };
            resolved.push(ResolvedInterface {
                mac_address: iface.mac_address.clone(),
                network,
                iface_id: iface.iface_id.clone(),
            });
        }
        if resolved.is_empty() {
            return Ok(());
        }
        let vm = produced(&ctx.vm, "instance")?;
        self.run_task(
            &vm.moref,
            "ReconfigVM_Task",
            json!({ "spec": add_nics_spec(&resolved) }),
        )
        .await?;
        Ok(())
    }

    async fn provision_disk(&self, ctx: &mut SpawnContext<'_>) -> Result<(), VmopsError> {
        let placement = produced(&ctx.placement, "placement")?;
        let image = &ctx.request.image;
        let datastore = &placement.datastore;
        let linked_clone = self.settings.use_linked_clone;
        let layout = if linked_clone {
            DiskLayout::for_cached_image(
                &datastore.name,
                &self.settings.base_dir_name,
                &image.image_ref,
            )
        } else {
            DiskLayout::for_instance(&datastore.name, &ctx.request.name)
        };
        let descriptor = layout.descriptor();
        let files = self.files(&placement.datacenter);

        let present = files
            .ensure_folder_has(&datastore.moref, layout.folder(), descriptor.file_name())
            .await?;
        if present {
            info!(disk = %descriptor, "disk already present, reusing it");
        } else {
            let upload_to = |path: DatastorePath| DatastoreFile {
                datacenter: placement.datacenter_name.clone(),
                path,
            };
            match image.disk_type {
                DiskType::Sparse => {
                    let sparse = layout.sparse();
                    self.images
                        .fetch_image(&image.image_ref, &upload_to(sparse.clone()))
                        .await?;
                    files
                        .copy_disk(
                            &sparse,
                            &descriptor,
                            copy_disk_spec(image.adapter_type, DiskType::Thin),
                        )
                        .await?;
                    files.delete_file(&sparse).await?;
                }
                DiskType::Preallocated | DiskType::Thin => {
                    files
                        .create_disk(
                            &descriptor,
                            virtual_disk_spec(image.adapter_type, image.disk_type, image.size_kb),
                        )
                        .await?;
                    // Only the reservation is kept; the payload comes from the image.
                    files.delete_file(&layout.flat()).await?;
                    self.images
                        .fetch_image(&image.image_ref, &upload_to(layout.flat()))
                        .await?;
                }
            }
        }

        let disk_type = match image.disk_type {
            DiskType::Sparse => DiskType::Thin,
            other => other,
        };
        ctx.disk = Some(DiskAttachment {
            capacity_kb: Some(image.size_kb),
            linked_clone,
            ..DiskAttachment::new(descriptor, image.adapter_type, disk_type)
        });
        Ok(())
    }

    async fn attach_root_disk(&self, ctx: &mut SpawnContext<'_>) -> Result<(), VmopsError> {
        let vm = produced(&ctx.vm, "instance")?;
        let disk = produced(&ctx.disk, "root disk")?;
        let task = self.volumes.attach_disk(&vm.moref, disk).await?;
        self.waiter.wait(&task).await?;
        Ok(())
    }
}
