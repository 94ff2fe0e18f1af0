//! `vmops migrate ...`: cold and live relocation between hosts.

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::services::vm::{DestroyOptions, MigrationTarget};
use crate::domain::naming::migration_name;

/// Migrate subcommands.
#[derive(Subcommand)]
pub enum MigrateCommand {
    /// Power off, park the source as `<name>-orig` and clone to a host
    Start {
        /// Instance name
        name: String,
        /// Destination host name
        #[arg(long)]
        host: String,
    },
    /// Power on the migrated instance
    Finish {
        /// Instance name
        name: String,
    },
    /// Destroy the parked source
    Confirm {
        /// Instance name
        name: String,
    },
    /// Destroy the clone, then restore the parked source and power it on
    Revert {
        /// Instance name
        name: String,
    },
    /// Move a running instance to another host
    Live {
        /// Instance name
        name: String,
        /// Destination host name
        #[arg(long)]
        host: String,
    },
}

impl MigrateCommand {
    fn describe(&self) -> (&str, &'static str) {
        match self {
            MigrateCommand::Start { name, .. } => (name, "migrate"),
            MigrateCommand::Finish { name } => (name, "finish migration"),
            MigrateCommand::Confirm { name } => (name, "confirm migration"),
            MigrateCommand::Revert { name } => (name, "revert migration"),
            MigrateCommand::Live { name, .. } => (name, "live migrate"),
        }
    }
}

/// Run `vmops migrate`.
///
/// # Errors
///
/// Returns an error if the instance, its parked source or the destination
/// host does not exist, or a migration step fails.
pub async fn run(app: &AppContext, cmd: &MigrateCommand) -> Result<()> {
    let remote = app.connect().await?;
    let result: Result<()> = async {
        let orchestrator = remote.orchestrator()?;
        let reporter = app.reporter();
        match cmd {
            MigrateCommand::Start { name, host } => {
                orchestrator
                    .migrate(name, &MigrationTarget::host(host), &reporter)
                    .await?;
            }
            MigrateCommand::Finish { name } => {
                orchestrator.finish_migration(name, &reporter).await?;
            }
            MigrateCommand::Confirm { name } => orchestrator.confirm_migration(name).await?,
            MigrateCommand::Revert { name } => {
                // The clone holds the name; drop it only once the parked
                // source is known to exist.
                orchestrator
                    .inventory()
                    .require_vm(&migration_name(name))
                    .await?;
                orchestrator.destroy(name, DestroyOptions::default()).await?;
                orchestrator.revert_migration(name).await?;
            }
            MigrateCommand::Live { name, host } => {
                orchestrator
                    .live_migrate(name, &MigrationTarget::host(host))
                    .await?;
            }
        }
        let (name, action) = cmd.describe();
        app.renderer().render_action(name, action, true)
    }
    .await;
    remote.session.shutdown().await;
    result
}
