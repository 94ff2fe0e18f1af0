//! Disk attachment through VM reconfiguration.

use serde_json::json;
use tracing::debug;
use vmops_common::ManagedObjectReference;

use crate::application::ports::{RemoteGateway, VolumeAttacher};
use crate::application::services::session::Session;
use crate::domain::spec::attach_disk_spec;
use crate::domain::{DiskAttachment, VmopsError};

/// [`VolumeAttacher`] issuing `ReconfigVM_Task` with a disk-add spec.
pub struct DiskAttacher<'s, G: RemoteGateway> {
    session: &'s Session<G>,
}

impl<'s, G: RemoteGateway> DiskAttacher<'s, G> {
    #[must_use]
    pub fn new(session: &'s Session<G>) -> Self {
        Self { session }
    }
}

impl<G: RemoteGateway> VolumeAttacher for DiskAttacher<'_, G> {
    async fn attach_disk(
        &self,
        vm: &ManagedObjectReference,
        disk: &DiskAttachment,
    ) -> Result<ManagedObjectReference, VmopsError> {
        debug!(vm = %vm, file = %disk.file, linked_clone = disk.linked_clone, "attaching disk");
        self.session
            .invoke_task(vm, "ReconfigVM_Task", json!({ "spec": attach_disk_spec(disk) }))
            .await
    }
}
