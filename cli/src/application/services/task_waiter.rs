//! Turns a remote task handle into a resolved result by polling its `info`.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};
use vmops_common::{ManagedObjectReference, TaskInfo, TaskState};

use crate::application::ports::RemoteGateway;
use crate::application::services::session::Session;
use crate::domain::VmopsError;

/// Polls tasks through a shared session. One instance serves any number of
/// sequential or concurrent waits; each wait owns its own timer.
pub struct TaskWaiter<'s, G: RemoteGateway> {
    session: &'s Session<G>,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl<'s, G: RemoteGateway> TaskWaiter<'s, G> {
    #[must_use]
    pub fn new(session: &'s Session<G>) -> Self {
        let policy = session.policy();
        Self {
            session,
            poll_interval: policy.poll_interval(),
            timeout: policy.task_timeout,
        }
    }

    /// Override the per-wait deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait for `task` to succeed.
    ///
    /// # Errors
    ///
    /// Returns [`VmopsError::TaskFailure`] carrying the endpoint's error text
    /// verbatim when the task ends in error, [`VmopsError::TaskTimeout`] when
    /// the deadline passes, or any error from polling.
    pub async fn wait(&self, task: &ManagedObjectReference) -> Result<TaskInfo, VmopsError> {
        let info = self.wait_for_info(task).await?;
        match info.state {
            TaskState::Success => Ok(info),
            _ => Err(VmopsError::TaskFailure {
                message: info
                    .error_message
                    .unwrap_or_else(|| "task failed without an error message".to_string()),
                task: info.name,
            }),
        }
    }

    /// Wait for `task` to reach a terminal state, successful or not.
    ///
    /// # Errors
    ///
    /// Returns [`VmopsError::TaskTimeout`] when the deadline passes, or any
    /// error from polling.
    pub async fn wait_for_info(
        &self,
        task: &ManagedObjectReference,
    ) -> Result<TaskInfo, VmopsError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.poll(task))
                .await
                .map_err(|_| VmopsError::TaskTimeout {
                    task: task.to_string(),
                    waited: limit,
                })?,
            None => self.poll(task).await,
        }
    }

    async fn poll(&self, task: &ManagedObjectReference) -> Result<TaskInfo, VmopsError> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls = 0u32;
        loop {
            ticker.tick().await;
            polls += 1;
            let info: TaskInfo = self.session.get_property_as(task, "info").await?;
            trace!(task = %task, state = ?info.state, polls, "polled task");
            if info.state.is_terminal() {
                debug!(task = %task, name = %info.name, state = ?info.state, polls, "task finished");
                return Ok(info);
            }
        }
    }
}
