//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and the shared wire types,
//! never from `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::PathBuf;

use anyhow::Result;
use serde_json::{Map, Value};
use vmops_common::{ManagedObjectReference, ObjectContent, ServiceContent};

use crate::domain::config::VmopsConfig;
use crate::domain::{DatastorePath, DiskAttachment, Fault, NetworkRef, VmopsError};

// ── Remote Gateway Port ───────────────────────────────────────────────────────

/// Raw RPC transport to the endpoint.
///
/// Every method reports failure as a classified [`Fault`]; retry and
/// re-authentication live in the session, not here.
#[allow(async_fn_in_trait)]
pub trait RemoteGateway {
    /// Handle to one server-side connection. A relogin opens a fresh one.
    type Connection;

    /// Open a new, unauthenticated connection.
    async fn open(&self) -> Result<Self::Connection, Fault>;
    /// Log in on `conn`, returning the session key.
    async fn login(
        &self,
        conn: &Self::Connection,
        username: &str,
        password: &str,
    ) -> Result<String, Fault>;
    /// Terminate another session by key, using `conn` for the call.
    async fn terminate_session(&self, conn: &Self::Connection, session_key: &str)
    -> Result<(), Fault>;
    /// Log out the session bound to `conn`.
    async fn logout(&self, conn: &Self::Connection) -> Result<(), Fault>;
    /// Manager objects of this connection.
    async fn service_content(&self, conn: &Self::Connection) -> Result<ServiceContent, Fault>;
    /// Invoke `method` on `target`. Long-running methods return a task reference.
    async fn invoke(
        &self,
        conn: &Self::Connection,
        target: &ManagedObjectReference,
        method: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, Fault>;
    /// Read one property path of one object. Missing properties are `Null`.
    async fn get_property(
        &self,
        conn: &Self::Connection,
        obj: &ManagedObjectReference,
        path: &str,
    ) -> Result<Value, Fault>;
    /// Enumerate every object of `type_name` with the requested properties.
    async fn list_objects(
        &self,
        conn: &Self::Connection,
        type_name: &str,
        paths: &[&str],
    ) -> Result<Vec<ObjectContent>, Fault>;
}

// ── Collaborator Ports ────────────────────────────────────────────────────────

/// Resolves request interfaces to network backings.
#[allow(async_fn_in_trait)]
pub trait NetworkResolver {
    /// Find a network by name, standard or distributed.
    async fn find_network(&self, name: &str) -> Result<Option<NetworkRef>, VmopsError>;
    /// Create a VLAN-tagged port group unless one by that name exists.
    /// Concurrent creation of the same name must succeed for every caller.
    async fn ensure_vlan_port_group(&self, name: &str, vlan_id: u16) -> Result<(), VmopsError>;
}

/// Attaches disks to VMs.
#[allow(async_fn_in_trait)]
pub trait VolumeAttacher {
    /// Start attaching `disk` to `vm`, returning the reconfigure task.
    async fn attach_disk(
        &self,
        vm: &ManagedObjectReference,
        disk: &DiskAttachment,
    ) -> Result<ManagedObjectReference, VmopsError>;
}

/// A file addressed on the endpoint's datastore file service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastoreFile {
    pub datacenter: String,
    pub path: DatastorePath,
}

/// Moves image payloads between the image store and datastores.
#[allow(async_fn_in_trait)]
pub trait ImageTransport {
    /// Copy image `image_ref` into `dest`.
    async fn fetch_image(&self, image_ref: &str, dest: &DatastoreFile) -> Result<(), VmopsError>;
    /// Publish `source` to the image store as `image_name`.
    async fn upload_image(&self, image_name: &str, source: &DatastoreFile)
    -> Result<(), VmopsError>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait, no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
    /// Report `step` of `total` for long multi-step workflows.
    fn progress(&self, step: u32, total: u32, message: &str) {
        self.step(&format!("[{step}/{total}] {message}"));
    }
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts persistence of the user configuration file.
pub trait ConfigStore {
    /// Load the configuration, returning defaults when no file exists.
    fn load(&self) -> Result<VmopsConfig>;
    /// Persist the configuration.
    fn save(&self, config: &VmopsConfig) -> Result<()>;
    /// Location of the configuration file.
    fn path(&self) -> Result<PathBuf>;
}
