//! `vmops info <name>`: show details of one instance.

use anyhow::Result;

use crate::app::AppContext;

/// Run `vmops info`.
///
/// # Errors
///
/// Returns an error if the instance does not exist.
pub async fn run(app: &AppContext, name: &str) -> Result<()> {
    let remote = app.connect().await?;
    let result: Result<()> = async {
        let info = remote.orchestrator()?.inventory().instance_info(name).await?;
        app.renderer().render_info(&info)
    }
    .await;
    remote.session.shutdown().await;
    result
}
