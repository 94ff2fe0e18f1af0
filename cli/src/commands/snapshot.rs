//! `vmops snapshot <name> <image-name>`: export an instance disk as an image.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;

/// Arguments for the snapshot command.
#[derive(Args)]
pub struct SnapshotArgs {
    /// Instance name
    pub name: String,

    /// Name of the image written to the image directory
    pub image_name: String,
}

/// Run `vmops snapshot`.
///
/// # Errors
///
/// Returns an error if the instance does not exist or the export fails.
pub async fn run(app: &AppContext, args: &SnapshotArgs) -> Result<()> {
    let remote = app.connect().await?;
    let result: Result<()> = async {
        let reporter = app.reporter();
        remote
            .orchestrator()?
            .snapshot(&args.name, &args.image_name, &reporter)
            .await?;
        app.renderer().render_action(&args.name, "snapshot", true)
    }
    .await;
    remote.session.shutdown().await;
    result
}
