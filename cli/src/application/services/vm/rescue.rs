//! Rescue mode: boot a helper VM with the instance's disk attached.

use tracing::{Instrument as _, info, info_span};
use vmops_common::ProvisionRequest;

use super::{DestroyOptions, Orchestrator, PowerAction};
use crate::application::ports::{
    ImageTransport, NetworkResolver, ProgressReporter, RemoteGateway, VolumeAttacher,
};
use crate::domain::naming::rescue_name;
use crate::domain::{DestroyReport, DiskAttachment, VmHandle, VmopsError};

impl<G, N, V, I> Orchestrator<'_, G, N, V, I>
where
    G: RemoteGateway,
    N: NetworkResolver,
    V: VolumeAttacher,
    I: ImageTransport,
{
    /// Power the instance off, spawn `<name>-rescue` from `request` and
    /// attach the instance's root disk to it in the next free slot.
    ///
    /// # Errors
    ///
    /// [`VmopsError::NotFound`] for an unknown instance or one without a
    /// root disk, otherwise the first failing step.
    pub async fn rescue(
        &self,
        request: &ProvisionRequest,
        reporter: &impl ProgressReporter,
    ) -> Result<VmHandle, VmopsError> {
        let span = info_span!(parent: &self.span, "rescue", instance = %request.name);
        async {
            let vm = self.inventory.require_vm(&request.name).await?;
            self.transition(&vm, PowerAction::Off).await?;

            let rescue = self
                .spawn(&request.renamed(rescue_name(&request.name)), reporter)
                .await?;

            reporter.step("attaching instance disk to rescue VM");
            let root = self.inventory.root_disk(&vm.moref).await?;
            let file = root
                .file
                .ok_or_else(|| VmopsError::not_found("root disk of", &request.name))?;
            let disk = DiskAttachment {
                controller_key: root.controller_key,
                unit_number: Some(root.max_unit_number + 1),
                ..DiskAttachment::new(file, root.adapter_type, root.disk_type)
            };
            let task = self.volumes.attach_disk(&rescue.moref, &disk).await?;
            self.waiter.wait(&task).await?;
            info!(rescue = %rescue.name, disk = %disk.file, "rescue VM ready");
            Ok(rescue)
        }
        .instrument(span)
        .await
    }

    /// Destroy the rescue VM and power the instance back on.
    ///
    /// # Errors
    ///
    /// [`VmopsError::NotFound`] for an unknown instance, otherwise failures
    /// of the rescue VM's power-off or the instance's power-on.
    pub async fn unrescue(&self, name: &str) -> Result<DestroyReport, VmopsError> {
        let span = info_span!(parent: &self.span, "unrescue", instance = %name);
        async {
            let vm = self.inventory.require_vm(name).await?;
            // Only the rescue VM's own folder is removed; the attached
            // instance disk lives in the instance folder.
            let report = self
                .destroy(&rescue_name(name), DestroyOptions::default())
                .await?;
            self.transition(&vm, PowerAction::On).await?;
            info!("instance left rescue mode");
            Ok(report)
        }
        .instrument(span)
        .await
    }
}
