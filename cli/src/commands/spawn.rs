//! `vmops spawn --request <file>`: create and start an instance.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::app::AppContext;
use crate::commands::read_request;
use crate::output::Renderer;

/// Arguments for the spawn command.
#[derive(Args)]
pub struct SpawnArgs {
    /// Provision request file (YAML or JSON)
    #[arg(long, short)]
    pub request: PathBuf,
}

/// Run `vmops spawn`.
///
/// # Errors
///
/// Returns an error if the request is invalid or any spawn phase fails.
pub async fn run(app: &AppContext, args: &SpawnArgs) -> Result<()> {
    let request = read_request(&args.request)?;
    let remote = app.connect().await?;
    let result: Result<()> = async {
        let orchestrator = remote.orchestrator()?;
        let reporter = app.reporter();
        let vm = orchestrator.spawn(&request, &reporter).await?;
        if let Renderer::Json(r) = app.renderer() {
            r.render(&json!({ "instance": vm.name, "ref": vm.moref }))?;
        }
        Ok(())
    }
    .await;
    remote.session.shutdown().await;
    result
}
