//! Cross-host relocation.
//!
//! A cold migration renames the source to `<name>-orig` and clones it to the
//! destination under the original name. The renamed source stays around as
//! the rollback point until the migration is confirmed or reverted.

use serde_json::json;
use tracing::{Instrument as _, debug, info, info_span, warn};

use super::{Orchestrator, PowerAction};
use crate::application::ports::{
    ImageTransport, NetworkResolver, ProgressReporter, RemoteGateway, VolumeAttacher,
};
use crate::domain::naming::migration_name;
use crate::domain::spec::clone_spec;
use crate::domain::vm::MIGRATION_TOTAL_STEPS;
use crate::domain::{VmHandle, VmopsError};

/// Destination of a migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTarget {
    /// Name of the destination host.
    pub host: String,
}

impl MigrationTarget {
    #[must_use]
    pub fn host(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl<G, N, V, I> Orchestrator<'_, G, N, V, I>
where
    G: RemoteGateway,
    N: NetworkResolver,
    V: VolumeAttacher,
    I: ImageTransport,
{
    /// Power the source off, park it under the tombstone name and clone it
    /// to the target host. The clone is left powered off; call
    /// [`Orchestrator::finish_migration`] to start it.
    ///
    /// # Errors
    ///
    /// [`VmopsError::NotFound`] for an unknown VM or host, otherwise the
    /// first failing step.
    pub async fn migrate(
        &self,
        name: &str,
        target: &MigrationTarget,
        reporter: &impl ProgressReporter,
    ) -> Result<VmHandle, VmopsError> {
        let span = info_span!(parent: &self.span, "migrate", instance = %name, host = %target.host);
        async {
            let vm = self.inventory.require_vm(name).await?;
            let host = self.inventory.host_by_name(&target.host).await?;
            reporter.progress(0, MIGRATION_TOTAL_STEPS, "instance and host located");

            self.transition(&vm, PowerAction::Off).await?;
            reporter.progress(1, MIGRATION_TOTAL_STEPS, "source powered off");

            let tombstone = migration_name(name);
            self.run_task(&vm.moref, "Rename_Task", json!({ "newName": tombstone }))
                .await?;
            debug!(%tombstone, "source renamed");
            reporter.progress(2, MIGRATION_TOTAL_STEPS, "source renamed");

            let datastore = self.inventory.datastore_on_host(&host).await?;
            let (_, _, vm_folder) = self.inventory.datacenter().await?;
            self.run_task(
                &vm.moref,
                "CloneVM_Task",
                json!({
                    "folder": vm_folder,
                    "name": name,
                    "spec": clone_spec(&datastore.moref, Some(&host), false),
                }),
            )
            .await?;
            reporter.progress(3, MIGRATION_TOTAL_STEPS, "cloned to destination");
            let clone = self.inventory.require_vm(name).await?;
            info!(clone = %clone.moref, datastore = %datastore.name, "instance cloned to destination");
            Ok(clone)
        }
        .instrument(span)
        .await
    }

    /// Power on the migrated instance.
    ///
    /// # Errors
    ///
    /// [`VmopsError::NotFound`] when the clone does not exist.
    pub async fn finish_migration(
        &self,
        name: &str,
        reporter: &impl ProgressReporter,
    ) -> Result<(), VmopsError> {
        let span = info_span!(parent: &self.span, "finish_migration", instance = %name);
        async {
            let vm = self.inventory.require_vm(name).await?;
            self.transition(&vm, PowerAction::On).await?;
            reporter.progress(MIGRATION_TOTAL_STEPS, MIGRATION_TOTAL_STEPS, "instance running");
            info!("migration finished");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Destroy the tombstoned source. A missing tombstone is already
    /// confirmed, and a failed destroy is only logged.
    ///
    /// # Errors
    ///
    /// Propagates lookup failures.
    pub async fn confirm_migration(&self, name: &str) -> Result<(), VmopsError> {
        let span = info_span!(parent: &self.span, "confirm_migration", instance = %name);
        async {
            let tombstone = migration_name(name);
            let Some(source) = self.inventory.find_vm(&tombstone).await? else {
                debug!(%tombstone, "no tombstone left, nothing to confirm");
                return Ok(());
            };
            match self.run_task(&source.moref, "Destroy_Task", json!({})).await {
                Ok(_) => info!(%tombstone, "migration confirmed"),
                Err(e) => warn!(%tombstone, error = %e, "could not destroy migration source"),
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Give the tombstoned source its name back and power it on. The clone,
    /// if any, is left for the caller to destroy first.
    ///
    /// # Errors
    ///
    /// [`VmopsError::NotFound`] when there is no tombstone, otherwise task
    /// failures.
    pub async fn revert_migration(&self, name: &str) -> Result<VmHandle, VmopsError> {
        let span = info_span!(parent: &self.span, "revert_migration", instance = %name);
        async {
            let tombstone = migration_name(name);
            let source = self.inventory.require_vm(&tombstone).await?;
            self.run_task(&source.moref, "Rename_Task", json!({ "newName": name }))
                .await?;
            let restored = VmHandle {
                name: name.to_string(),
                moref: source.moref,
            };
            self.transition(&restored, PowerAction::On).await?;
            info!("migration reverted");
            Ok(restored)
        }
        .instrument(span)
        .await
    }

    /// Move a VM to another host without powering it off.
    ///
    /// # Errors
    ///
    /// [`VmopsError::NotFound`] for an unknown VM or host, otherwise task
    /// failures.
    pub async fn live_migrate(
        &self,
        name: &str,
        target: &MigrationTarget,
    ) -> Result<(), VmopsError> {
        let span = info_span!(parent: &self.span, "live_migrate", instance = %name, host = %target.host);
        async {
            let vm = self.inventory.require_vm(name).await?;
            let host = self.inventory.host_by_name(&target.host).await?;
            self.run_task(
                &vm.moref,
                "MigrateVM_Task",
                json!({ "host": host, "priority": "defaultPriority" }),
            )
            .await?;
            info!("live migration complete");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
