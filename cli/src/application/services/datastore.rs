//! Datastore file and virtual disk operations.
//!
//! Every long-running operation is awaited before returning, so callers can
//! chain them as strictly ordered phases.

use serde_json::{Value, json};
use tracing::debug;
use vmops_common::{ManagedObjectReference, TaskState};

use crate::application::ports::RemoteGateway;
use crate::application::services::session::Session;
use crate::application::services::task_waiter::TaskWaiter;
use crate::domain::spec::search_spec;
use crate::domain::{DatastorePath, VmopsError};

/// Result of probing a folder for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub folder_exists: bool,
    pub file_exists: bool,
}

/// File operations scoped to one datacenter and datastore.
pub struct DatastoreFiles<'a, 's, G: RemoteGateway> {
    session: &'s Session<G>,
    waiter: &'a TaskWaiter<'s, G>,
    datacenter: &'a ManagedObjectReference,
}

impl<'a, 's, G: RemoteGateway> DatastoreFiles<'a, 's, G> {
    #[must_use]
    pub fn new(
        session: &'s Session<G>,
        waiter: &'a TaskWaiter<'s, G>,
        datacenter: &'a ManagedObjectReference,
    ) -> Self {
        Self {
            session,
            waiter,
            datacenter,
        }
    }

    /// Search `folder` for `file_name`. A search ending in error means the
    /// folder does not exist.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn probe(
        &self,
        datastore: &ManagedObjectReference,
        folder: &DatastorePath,
        file_name: &str,
    ) -> Result<Probe, VmopsError> {
        self.search(datastore, folder, Some(file_name)).await
    }

    /// Create `folder` unless it already exists.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn ensure_folder(
        &self,
        datastore: &ManagedObjectReference,
        folder: &DatastorePath,
    ) -> Result<(), VmopsError> {
        if !self.search(datastore, folder, None).await?.folder_exists {
            self.mkdir(folder).await?;
        }
        Ok(())
    }

    async fn search(
        &self,
        datastore: &ManagedObjectReference,
        folder: &DatastorePath,
        file_name: Option<&str>,
    ) -> Result<Probe, VmopsError> {
        let browser: ManagedObjectReference =
            self.session.get_property_as(datastore, "browser").await?;
        let task = self
            .session
            .invoke_task(
                &browser,
                "SearchDatastore_Task",
                json!({
                    "datastorePath": folder.to_string(),
                    "searchSpec": search_spec(file_name),
                }),
            )
            .await?;
        let info = self.waiter.wait_for_info(&task).await?;
        if info.state == TaskState::Error {
            debug!(folder = %folder, "folder absent");
            return Ok(Probe {
                folder_exists: false,
                file_exists: false,
            });
        }
        let Some(file_name) = file_name else {
            return Ok(Probe {
                folder_exists: true,
                file_exists: false,
            });
        };
        let file_exists = info
            .result
            .as_ref()
            .and_then(|r| r.get("file"))
            .and_then(Value::as_array)
            .and_then(|files| files.first())
            .and_then(|f| f.get("path"))
            .and_then(Value::as_str)
            == Some(file_name);
        Ok(Probe {
            folder_exists: true,
            file_exists,
        })
    }

    /// Create `folder` without parents.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn mkdir(&self, folder: &DatastorePath) -> Result<(), VmopsError> {
        let content = self.session.service_content().await?;
        self.session
            .invoke(
                &content.file_manager,
                "MakeDirectory",
                json!({
                    "name": folder.to_string(),
                    "datacenter": self.datacenter,
                    "createParentDirectories": false,
                }),
            )
            .await?;
        debug!(folder = %folder, "created folder");
        Ok(())
    }

    /// Probe for a file and create its folder when missing.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn ensure_folder_has(
        &self,
        datastore: &ManagedObjectReference,
        folder: &DatastorePath,
        file_name: &str,
    ) -> Result<bool, VmopsError> {
        let probe = self.probe(datastore, folder, file_name).await?;
        if !probe.folder_exists {
            self.mkdir(folder).await?;
        }
        Ok(probe.file_exists)
    }

    /// Delete a file or folder.
    ///
    /// # Errors
    ///
    /// Propagates session and task errors.
    pub async fn delete_file(&self, path: &DatastorePath) -> Result<(), VmopsError> {
        let content = self.session.service_content().await?;
        let task = self
            .session
            .invoke_task(
                &content.file_manager,
                "DeleteDatastoreFile_Task",
                json!({ "name": path.to_string(), "datacenter": self.datacenter }),
            )
            .await?;
        self.waiter.wait(&task).await?;
        debug!(path = %path, "deleted datastore file");
        Ok(())
    }

    /// Create an empty virtual disk.
    ///
    /// # Errors
    ///
    /// Propagates session and task errors.
    pub async fn create_disk(&self, path: &DatastorePath, spec: Value) -> Result<(), VmopsError> {
        self.disk_task(
            "CreateVirtualDisk_Task",
            json!({ "name": path.to_string(), "datacenter": self.datacenter, "spec": spec }),
        )
        .await
    }

    /// Copy a virtual disk, converting it to the format in `dest_spec`.
    ///
    /// # Errors
    ///
    /// Propagates session and task errors.
    pub async fn copy_disk(
        &self,
        source: &DatastorePath,
        dest: &DatastorePath,
        dest_spec: Value,
    ) -> Result<(), VmopsError> {
        self.disk_task(
            "CopyVirtualDisk_Task",
            json!({
                "sourceName": source.to_string(),
                "sourceDatacenter": self.datacenter,
                "destName": dest.to_string(),
                "destSpec": dest_spec,
            }),
        )
        .await
    }

    /// Delete a virtual disk together with its payload.
    ///
    /// # Errors
    ///
    /// Propagates session and task errors.
    pub async fn delete_disk(&self, path: &DatastorePath) -> Result<(), VmopsError> {
        self.disk_task(
            "DeleteVirtualDisk_Task",
            json!({ "name": path.to_string(), "datacenter": self.datacenter }),
        )
        .await
    }

    async fn disk_task(&self, method: &str, args: Value) -> Result<(), VmopsError> {
        let content = self.session.service_content().await?;
        let task = self
            .session
            .invoke_task(&content.virtual_disk_manager, method, args)
            .await?;
        self.waiter.wait(&task).await?;
        Ok(())
    }
}
