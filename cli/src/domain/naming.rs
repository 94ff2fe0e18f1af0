//! Naming rules for derived VMs and disk files.

use crate::domain::datastore::DatastorePath;

pub const RESCUE_SUFFIX: &str = "-rescue";
pub const MIGRATION_SUFFIX: &str = "-orig";
/// Datastore folder used for temporary snapshot exports.
pub const TMP_FOLDER: &str = "vmware-tmp";

#[must_use]
pub fn rescue_name(name: &str) -> String {
    format!("{name}{RESCUE_SUFFIX}")
}

/// Name the source VM is parked under while a migration is unconfirmed.
#[must_use]
pub fn migration_name(name: &str) -> String {
    format!("{name}{MIGRATION_SUFFIX}")
}

/// File layout of one virtual disk: `<folder>/<base>.vmdk` plus its payload
/// and staging siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskLayout {
    folder: DatastorePath,
    base: String,
}

impl DiskLayout {
    /// Root disk of an instance: `[ds] <name>/<name>.vmdk`.
    #[must_use]
    pub fn for_instance(datastore: &str, name: &str) -> Self {
        Self {
            folder: DatastorePath::new(datastore, name),
            base: name.to_string(),
        }
    }

    /// Cached base disk of an image: `[ds] <base_dir>/<image_ref>.vmdk`.
    #[must_use]
    pub fn for_cached_image(datastore: &str, base_dir: &str, image_ref: &str) -> Self {
        Self {
            folder: DatastorePath::new(datastore, base_dir),
            base: image_ref.to_string(),
        }
    }

    /// Scratch disk used while exporting a snapshot.
    #[must_use]
    pub fn for_snapshot_export(datastore: &str, export_id: &str) -> Self {
        Self {
            folder: DatastorePath::new(datastore, TMP_FOLDER),
            base: export_id.to_string(),
        }
    }

    #[must_use]
    pub fn folder(&self) -> &DatastorePath {
        &self.folder
    }

    /// Descriptor file a VM's disk backing points at.
    #[must_use]
    pub fn descriptor(&self) -> DatastorePath {
        self.folder.join(&format!("{}.vmdk", self.base))
    }

    /// Payload file that pairs with a preallocated descriptor.
    #[must_use]
    pub fn flat(&self) -> DatastorePath {
        self.folder.join(&format!("{}-flat.vmdk", self.base))
    }

    /// Staging file for a sparse image before conversion.
    #[must_use]
    pub fn sparse(&self) -> DatastorePath {
        self.folder.join(&format!("{}-sparse.vmdk", self.base))
    }
}
