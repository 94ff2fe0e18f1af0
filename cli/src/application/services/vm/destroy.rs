//! VM teardown: lookup, power off, then best-effort unregister and file removal.

use serde_json::json;
use tracing::{Instrument as _, debug, info, info_span, warn};
use vmops_common::PowerState;

use super::Orchestrator;
use crate::application::ports::{ImageTransport, NetworkResolver, RemoteGateway, VolumeAttacher};
use crate::domain::{DatastorePath, DestroyReport, PhaseResult, VmopsError};

/// Knobs for [`Orchestrator::destroy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestroyOptions {
    /// Unregister only; leave the VM folder and disks on the datastore.
    pub keep_disks: bool,
}

/// Turns the outcome of a best-effort phase into a [`PhaseResult`], logging
/// failures instead of propagating them.
pub(crate) fn best_effort(phase: &str, result: Result<(), VmopsError>) -> PhaseResult {
    match result {
        Ok(()) => PhaseResult::Ok,
        Err(e) => {
            warn!(phase, error = %e, "best-effort phase failed, continuing");
            PhaseResult::Failed(e.to_string())
        }
    }
}

impl<G, N, V, I> Orchestrator<'_, G, N, V, I>
where
    G: RemoteGateway,
    N: NetworkResolver,
    V: VolumeAttacher,
    I: ImageTransport,
{
    /// Tear a VM down. An absent VM is already destroyed and reports success.
    ///
    /// # Errors
    ///
    /// Only lookup and power-off failures propagate. Unregister and file
    /// deletion failures are recorded in the returned report.
    pub async fn destroy(
        &self,
        name: &str,
        options: DestroyOptions,
    ) -> Result<DestroyReport, VmopsError> {
        let span = info_span!(parent: &self.span, "destroy", instance = %name);
        async {
            let Some(vm) = self.inventory.find_vm(name).await? else {
                debug!("instance already absent");
                return Ok(DestroyReport::absent(name));
            };
            let target = self.inventory.teardown_target(&vm.moref).await?;

            let powered_off = if target.power_state == PowerState::PoweredOn {
                self.run_task(&vm.moref, "PowerOffVM_Task", json!({})).await?;
                PhaseResult::Ok
            } else {
                PhaseResult::Skipped
            };

            let unregister = best_effort(
                "unregister",
                self.session
                    .invoke(&vm.moref, "UnregisterVM", json!({}))
                    .await
                    .map(|_| ()),
            );

            let folder = target.vmx_path.as_ref().map(DatastorePath::parent);
            let delete_files = match (&folder, options.keep_disks) {
                (Some(folder), false) => {
                    best_effort("delete files", self.delete_folder(folder).await)
                }
                _ => PhaseResult::Skipped,
            };

            let report = DestroyReport {
                name: name.to_string(),
                found: true,
                powered_off,
                unregister,
                delete_files,
                folder: folder.map(|f| f.to_string()),
            };
            info!(failures = report.has_failures(), "instance destroyed");
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn delete_folder(&self, folder: &DatastorePath) -> Result<(), VmopsError> {
        let (datacenter, _, _) = self.inventory.datacenter().await?;
        self.files(&datacenter).delete_file(folder).await
    }
}
