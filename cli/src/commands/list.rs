//! `vmops list`: show instances and their power states.

use anyhow::Result;

use crate::app::AppContext;

/// Run `vmops list`.
///
/// # Errors
///
/// Returns an error if the endpoint cannot be queried.
pub async fn run(app: &AppContext) -> Result<()> {
    let remote = app.connect().await?;
    let result: Result<()> = async {
        let instances = remote.orchestrator()?.inventory().list_instances().await?;
        app.renderer().render_instances(&instances)
    }
    .await;
    remote.session.shutdown().await;
    result
}
