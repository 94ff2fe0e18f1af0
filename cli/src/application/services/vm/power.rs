//! Power transitions. Requests that are already satisfied are no-ops.

use std::fmt;

use serde_json::json;
use tracing::{Instrument as _, debug, info, info_span};
use vmops_common::{ManagedObjectReference, PowerState};

use super::Orchestrator;
use crate::application::ports::{ImageTransport, NetworkResolver, RemoteGateway, VolumeAttacher};
use crate::domain::{VmHandle, VmopsError};

/// A requested power transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    On,
    Off,
    Suspend,
    Resume,
    Reboot,
}

impl PowerAction {
    fn verb(self) -> &'static str {
        match self {
            PowerAction::On => "power on",
            PowerAction::Off => "power off",
            PowerAction::Suspend => "suspend",
            PowerAction::Resume => "resume",
            PowerAction::Reboot => "reboot",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// What a transition has to do from a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Nothing,
    Task(&'static str),
    Reboot,
    Refuse,
}

fn plan(action: PowerAction, state: PowerState) -> Step {
    use PowerState::{PoweredOff, PoweredOn, Suspended};
    match (action, state) {
        (PowerAction::On, PoweredOn)
        | (PowerAction::Off, PoweredOff)
        | (PowerAction::Suspend, Suspended) => Step::Nothing,
        (PowerAction::On, _) | (PowerAction::Resume, Suspended) => Step::Task("PowerOnVM_Task"),
        (PowerAction::Off, PoweredOn) => Step::Task("PowerOffVM_Task"),
        (PowerAction::Suspend, PoweredOn) => Step::Task("SuspendVM_Task"),
        (PowerAction::Reboot, PoweredOn) => Step::Reboot,
        (PowerAction::Off | PowerAction::Suspend, _)
        | (PowerAction::Resume | PowerAction::Reboot, _) => Step::Refuse,
    }
}

impl<G, N, V, I> Orchestrator<'_, G, N, V, I>
where
    G: RemoteGateway,
    N: NetworkResolver,
    V: VolumeAttacher,
    I: ImageTransport,
{
    /// Apply a power transition to the named VM. Returns whether anything
    /// was done.
    ///
    /// # Errors
    ///
    /// [`VmopsError::NotFound`] for an unknown VM,
    /// [`VmopsError::InvalidPowerState`] when the transition is not allowed
    /// from the current state, otherwise task failures.
    pub async fn power(&self, name: &str, action: PowerAction) -> Result<bool, VmopsError> {
        let span = info_span!(parent: &self.span, "power", instance = %name, %action);
        async {
            let vm = self.inventory.require_vm(name).await?;
            self.transition(&vm, action).await
        }
        .instrument(span)
        .await
    }

    pub(super) async fn transition(
        &self,
        vm: &VmHandle,
        action: PowerAction,
    ) -> Result<bool, VmopsError> {
        let state = self.inventory.power_state(&vm.moref).await?;
        match plan(action, state) {
            Step::Nothing => {
                debug!(%state, "already in requested state");
                Ok(false)
            }
            Step::Task(method) => {
                self.run_task(&vm.moref, method, json!({})).await?;
                info!(from = %state, "power state changed");
                Ok(true)
            }
            Step::Reboot => {
                self.reboot(&vm.moref).await?;
                Ok(true)
            }
            Step::Refuse => Err(VmopsError::InvalidPowerState {
                action: action.verb(),
                name: vm.name.clone(),
                state,
            }),
        }
    }

    /// Guest reboot when the tools are healthy, hard reset otherwise.
    async fn reboot(&self, vm: &ManagedObjectReference) -> Result<(), VmopsError> {
        let tools_status = self
            .session
            .get_property(vm, "summary.guest.toolsStatus")
            .await?;
        let tools_running = self
            .session
            .get_property(vm, "summary.guest.toolsRunningStatus")
            .await?;
        if tools_status.as_str() == Some("toolsOk")
            && tools_running.as_str() == Some("guestToolsRunning")
        {
            self.session.invoke(vm, "RebootGuest", json!({})).await?;
            info!("guest reboot requested");
        } else {
            self.run_task(vm, "ResetVM_Task", json!({})).await?;
            info!("guest tools unavailable, reset instead");
        }
        Ok(())
    }
}
