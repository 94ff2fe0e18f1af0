//! `vmops destroy <name>`: tear an instance down.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::vm::DestroyOptions;

/// Arguments for the destroy command.
#[derive(Args)]
pub struct DestroyArgs {
    /// Instance name
    pub name: String,

    /// Unregister only; keep the instance folder and disks
    #[arg(long)]
    pub keep_disks: bool,

    /// Skip confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

/// Run `vmops destroy`.
///
/// # Errors
///
/// Returns an error if the lookup or power-off fails. Cleanup failures are
/// reported, not returned.
pub async fn run(app: &AppContext, args: &DestroyArgs) -> Result<()> {
    if !args.yes && !app.confirm(&format!("Destroy instance {}?", args.name), false)? {
        app.output.info("Cancelled.");
        return Ok(());
    }
    let remote = app.connect().await?;
    let result: Result<()> = async {
        let orchestrator = remote.orchestrator()?;
        let report = orchestrator
            .destroy(
                &args.name,
                DestroyOptions {
                    keep_disks: args.keep_disks,
                },
            )
            .await?;
        app.renderer().render_destroy(&report)
    }
    .await;
    remote.session.shutdown().await;
    result
}
