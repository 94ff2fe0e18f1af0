//! `vmops rescue` / `vmops unrescue`: boot a helper VM with the instance disk.

use std::path::PathBuf;

use anyhow::{Result, ensure};
use clap::Args;

use crate::app::AppContext;
use crate::commands::read_request;

/// Arguments for the rescue command.
#[derive(Args)]
pub struct RescueArgs {
    /// Instance name
    pub name: String,

    /// Provision request for the rescue VM; its name is replaced
    #[arg(long, short)]
    pub request: PathBuf,
}

/// Run `vmops rescue`.
///
/// # Errors
///
/// Returns an error if the instance does not exist or the rescue VM cannot
/// be built.
pub async fn rescue(app: &AppContext, args: &RescueArgs) -> Result<()> {
    let template = read_request(&args.request)?;
    ensure!(template.vcpus > 0, "rescue request needs at least one vCPU");
    let request = template.renamed(&args.name);
    let remote = app.connect().await?;
    let result: Result<()> = async {
        let reporter = app.reporter();
        let vm = remote.orchestrator()?.rescue(&request, &reporter).await?;
        app.renderer().render_action(&vm.name, "rescue", true)
    }
    .await;
    remote.session.shutdown().await;
    result
}

/// Run `vmops unrescue`.
///
/// # Errors
///
/// Returns an error if the instance does not exist or cannot be powered on.
pub async fn unrescue(app: &AppContext, name: &str) -> Result<()> {
    let remote = app.connect().await?;
    let result: Result<()> = async {
        let report = remote.orchestrator()?.unrescue(name).await?;
        if report.has_failures() {
            app.output
                .warn("rescue VM removed, but some of its files were left behind");
        }
        app.renderer().render_action(name, "unrescue", true)
    }
    .await;
    remote.session.shutdown().await;
    result
}
