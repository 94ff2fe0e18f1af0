//! `vmops power <action> <name>`: power transitions.

use anyhow::Result;
use clap::{Args, ValueEnum};

use crate::app::AppContext;
use crate::application::services::vm::PowerAction;

/// Power transition to apply.
#[derive(Clone, Copy, ValueEnum)]
pub enum PowerArg {
    On,
    Off,
    Suspend,
    Resume,
    Reboot,
}

impl From<PowerArg> for PowerAction {
    fn from(arg: PowerArg) -> Self {
        match arg {
            PowerArg::On => PowerAction::On,
            PowerArg::Off => PowerAction::Off,
            PowerArg::Suspend => PowerAction::Suspend,
            PowerArg::Resume => PowerAction::Resume,
            PowerArg::Reboot => PowerAction::Reboot,
        }
    }
}

/// Arguments for the power command.
#[derive(Args)]
pub struct PowerArgs {
    /// Transition to apply
    #[arg(value_enum)]
    pub action: PowerArg,

    /// Instance name
    pub name: String,
}

/// Run `vmops power`.
///
/// # Errors
///
/// Returns an error if the instance does not exist or the transition is not
/// allowed from its current state.
pub async fn run(app: &AppContext, args: &PowerArgs) -> Result<()> {
    let action = PowerAction::from(args.action);
    let remote = app.connect().await?;
    let result: Result<()> = async {
        let changed = remote.orchestrator()?.power(&args.name, action).await?;
        app.renderer()
            .render_action(&args.name, &action.to_string(), changed)
    }
    .await;
    remote.session.shutdown().await;
    result
}
