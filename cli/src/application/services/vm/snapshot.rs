//! Image export: snapshot the VM, coalesce its disk chain into a scratch
//! disk and upload the scratch payload.

use serde_json::json;
use tracing::{Instrument as _, debug, info, info_span, warn};
use uuid::Uuid;
use vmops_common::ManagedObjectReference;

use super::Orchestrator;
use crate::application::ports::{
    DatastoreFile, ImageTransport, NetworkResolver, ProgressReporter, RemoteGateway,
    VolumeAttacher,
};
use crate::domain::naming::{DiskLayout, TMP_FOLDER};
use crate::domain::spec::copy_disk_spec;
use crate::domain::{DatastorePath, VmopsError};

impl<G, N, V, I> Orchestrator<'_, G, N, V, I>
where
    G: RemoteGateway,
    N: NetworkResolver,
    V: VolumeAttacher,
    I: ImageTransport,
{
    /// Export the VM's current disk as image `image_name`.
    ///
    /// The scratch disk under `vmware-tmp` is removed once the upload
    /// finishes; failing to remove it is only logged.
    ///
    /// # Errors
    ///
    /// [`VmopsError::NotFound`] for an unknown VM or one without a root disk,
    /// otherwise the first failing step.
    pub async fn snapshot(
        &self,
        name: &str,
        image_name: &str,
        reporter: &impl ProgressReporter,
    ) -> Result<(), VmopsError> {
        let span = info_span!(parent: &self.span, "snapshot", instance = %name, image = %image_name);
        async {
            let vm = self.inventory.require_vm(name).await?;
            // Read before snapshotting: afterwards the VM points at a delta.
            let root = self.inventory.root_disk(&vm.moref).await?;
            let source = root
                .file
                .ok_or_else(|| VmopsError::not_found("root disk of", name))?;

            reporter.step("creating snapshot");
            self.run_task(
                &vm.moref,
                "CreateSnapshot_Task",
                json!({
                    "name": format!("{name}-snapshot"),
                    "description": "Taking Snapshot of the VM",
                    "memory": false,
                    "quiesce": true,
                }),
            )
            .await?;

            let datastores = self.session.get_property(&vm.moref, "datastore").await?;
            let datastore: ManagedObjectReference = datastores
                .as_array()
                .and_then(|all| all.first())
                .cloned()
                .ok_or_else(|| VmopsError::not_found("datastore of", name))
                .and_then(|raw| {
                    serde_json::from_value(raw).map_err(|e| VmopsError::malformed("datastore", e))
                })?;
            let (datacenter, datacenter_name, _) = self.inventory.datacenter().await?;
            let files = self.files(&datacenter);
            let tmp = DatastorePath::new(&source.datastore, TMP_FOLDER);
            files.ensure_folder(&datastore, &tmp).await?;

            reporter.step("copying disk");
            let scratch = DiskLayout::for_snapshot_export(
                &source.datastore,
                &Uuid::new_v4().to_string(),
            );
            files
                .copy_disk(
                    &source,
                    &scratch.descriptor(),
                    copy_disk_spec(root.adapter_type, root.disk_type),
                )
                .await?;
            debug!(scratch = %scratch.descriptor(), "disk chain coalesced");

            reporter.step("uploading image");
            let upload = self
                .images
                .upload_image(
                    image_name,
                    &DatastoreFile {
                        datacenter: datacenter_name,
                        path: scratch.flat(),
                    },
                )
                .await;

            if let Err(e) = files.delete_disk(&scratch.descriptor()).await {
                warn!(scratch = %scratch.descriptor(), error = %e, "could not remove scratch disk");
            }
            upload?;
            info!("image uploaded");
            reporter.success(&format!("image {image_name} uploaded"));
            Ok(())
        }
        .instrument(span)
        .await
    }
}
