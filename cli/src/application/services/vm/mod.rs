//! VM lifecycle orchestration: provisioning, teardown and derived workflows.
//!
//! Each workflow is a fixed sequence of phases. A phase starts only after the
//! previous phase's task is terminal, and every phase rediscovers what it
//! needs from the endpoint by name instead of trusting local state.
//! Imports only from `crate::domain` and `crate::application`.

pub mod destroy;
pub mod migrate;
pub mod power;
pub mod rescue;
pub mod snapshot;
pub mod spawn;

use serde_json::Value;
use tracing::{Span, info_span};
use vmops_common::{ManagedObjectReference, TaskInfo};

use crate::application::ports::{ImageTransport, NetworkResolver, RemoteGateway, VolumeAttacher};
use crate::application::services::datastore::DatastoreFiles;
use crate::application::services::inventory::Inventory;
use crate::application::services::session::Session;
use crate::application::services::task_waiter::TaskWaiter;
use crate::domain::{ProvisioningSettings, VmopsError};

pub use destroy::DestroyOptions;
pub use migrate::MigrationTarget;
pub use power::PowerAction;
pub use spawn::SpawnPhase;

/// Provisioning collaborators consumed by the orchestrator.
pub struct Collaborators<N, V, I> {
    pub network: N,
    pub volumes: V,
    pub images: I,
}

/// Runs VM workflows over one shared session.
pub struct Orchestrator<'s, G: RemoteGateway, N, V, I> {
    session: &'s Session<G>,
    waiter: TaskWaiter<'s, G>,
    inventory: Inventory<'s, G>,
    network: N,
    volumes: V,
    images: I,
    settings: &'s ProvisioningSettings,
    span: Span,
}

impl<'s, G, N, V, I> Orchestrator<'s, G, N, V, I>
where
    G: RemoteGateway,
    N: NetworkResolver,
    V: VolumeAttacher,
    I: ImageTransport,
{
    #[must_use]
    pub fn new(
        session: &'s Session<G>,
        settings: &'s ProvisioningSettings,
        collaborators: Collaborators<N, V, I>,
    ) -> Self {
        let span = info_span!(parent: session.span(), "orchestrator");
        Self {
            session,
            waiter: TaskWaiter::new(session),
            inventory: Inventory::new(session, settings.cluster.as_deref()),
            network: collaborators.network,
            volumes: collaborators.volumes,
            images: collaborators.images,
            settings,
            span,
        }
    }

    #[must_use]
    pub fn inventory(&self) -> &Inventory<'s, G> {
        &self.inventory
    }

    /// Invoke a long-running method and wait for it to succeed.
    async fn run_task(
        &self,
        target: &ManagedObjectReference,
        method: &str,
        args: Value,
    ) -> Result<TaskInfo, VmopsError> {
        let task = self.session.invoke_task(target, method, args).await?;
        self.waiter.wait(&task).await
    }

    fn files<'a>(&'a self, datacenter: &'a ManagedObjectReference) -> DatastoreFiles<'a, 's, G> {
        DatastoreFiles::new(self.session, &self.waiter, datacenter)
    }
}
