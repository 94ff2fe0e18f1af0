//! Task polling: success, verbatim failure text and deadlines.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use serde_json::json;
use vmops_cli::application::services::task_waiter::TaskWaiter;
use vmops_cli::domain::config::MIN_TASK_POLL_INTERVAL;
use vmops_cli::domain::{ErrorKind, Policy, VmopsError};
use vmops_common::TaskState;

use crate::helpers::{connect, policy};
use crate::mocks::FakeEndpoint;

#[tokio::test(start_paused = true)]
async fn wait_returns_success_after_running_polls() {
    let endpoint = FakeEndpoint::standard();
    endpoint.set_running_polls(3);
    let session = connect(&endpoint, policy(3)).await;
    let vm = endpoint.add_vm("vm-a", "poweredOff");

    let task = session
        .invoke_task(&vm, "PowerOnVM_Task", json!({}))
        .await
        .unwrap();
    let started = tokio::time::Instant::now();
    let info = TaskWaiter::new(&session).wait(&task).await.unwrap();

    assert_eq!(info.state, TaskState::Success);
    assert_eq!(info.name, "PowerOnVM_Task");
    // First tick fires immediately, then one interval per running poll.
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn failed_task_carries_endpoint_message_verbatim() {
    let endpoint = FakeEndpoint::standard();
    endpoint.fail_tasks("PowerOnVM_Task", "Insufficient resources to satisfy configured failover level.");
    let session = connect(&endpoint, policy(3)).await;
    let vm = endpoint.add_vm("vm-a", "poweredOff");

    let task = session
        .invoke_task(&vm, "PowerOnVM_Task", json!({}))
        .await
        .unwrap();
    let err = TaskWaiter::new(&session).wait(&task).await.unwrap_err();

    match &err {
        VmopsError::TaskFailure { task, message } => {
            assert_eq!(task, "PowerOnVM_Task");
            assert_eq!(message, "Insufficient resources to satisfy configured failover level.");
        }
        other => panic!("expected task failure, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::TaskFailure);
}

#[tokio::test(start_paused = true)]
async fn wait_for_info_returns_error_state_without_failing() {
    let endpoint = FakeEndpoint::standard();
    endpoint.fail_tasks("SuspendVM_Task", "nope");
    let session = connect(&endpoint, policy(3)).await;
    let vm = endpoint.add_vm("vm-a", "poweredOn");

    let task = session
        .invoke_task(&vm, "SuspendVM_Task", json!({}))
        .await
        .unwrap();
    let info = TaskWaiter::new(&session).wait_for_info(&task).await.unwrap();

    assert_eq!(info.state, TaskState::Error);
    assert_eq!(info.error_message.as_deref(), Some("nope"));
}

#[tokio::test(start_paused = true)]
async fn hanging_task_times_out() {
    let endpoint = FakeEndpoint::standard();
    endpoint.hang_tasks("PowerOffVM_Task");
    let session = connect(&endpoint, policy(3)).await;
    let vm = endpoint.add_vm("vm-a", "poweredOn");

    let task = session
        .invoke_task(&vm, "PowerOffVM_Task", json!({}))
        .await
        .unwrap();
    let err = TaskWaiter::new(&session)
        .with_timeout(Some(Duration::from_secs(30)))
        .wait(&task)
        .await
        .unwrap_err();

    assert!(matches!(err, VmopsError::TaskTimeout { waited, .. } if waited == Duration::from_secs(30)));
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test(start_paused = true)]
async fn concurrent_waits_are_independent() {
    let endpoint = FakeEndpoint::standard();
    let session = connect(&endpoint, policy(3)).await;
    let a = endpoint.add_vm("vm-a", "poweredOff");
    let b = endpoint.add_vm("vm-b", "poweredOff");
    endpoint.fail_tasks("PowerOffVM_Task", "already off");

    let ok = session.invoke_task(&a, "PowerOnVM_Task", json!({})).await.unwrap();
    let bad = session.invoke_task(&b, "PowerOffVM_Task", json!({})).await.unwrap();
    let waiter = TaskWaiter::new(&session);

    let (ok, bad) = tokio::join!(waiter.wait(&ok), waiter.wait(&bad));

    assert!(ok.is_ok());
    assert_eq!(bad.unwrap_err().kind(), ErrorKind::TaskFailure);
}

#[tokio::test(start_paused = true)]
async fn polling_survives_session_expiry() {
    let endpoint = FakeEndpoint::standard();
    endpoint.set_running_polls(2);
    let session = connect(&endpoint, policy(3)).await;
    let vm = endpoint.add_vm("vm-a", "poweredOff");

    let task = session
        .invoke_task(&vm, "PowerOnVM_Task", json!({}))
        .await
        .unwrap();
    endpoint.expire_sessions();
    let info = TaskWaiter::new(&session).wait(&task).await.unwrap();

    assert_eq!(info.state, TaskState::Success);
    assert_eq!(endpoint.logins(), 2);
}

#[tokio::test(start_paused = true)]
async fn zero_poll_interval_polls_at_minimum_period() {
    let endpoint = FakeEndpoint::standard();
    endpoint.set_running_polls(3);
    let session = connect(
        &endpoint,
        Policy {
            task_poll_interval: Duration::ZERO,
            ..policy(3)
        },
    )
    .await;
    let vm = endpoint.add_vm("vm-a", "poweredOff");

    let task = session
        .invoke_task(&vm, "PowerOnVM_Task", json!({}))
        .await
        .unwrap();
    let started = tokio::time::Instant::now();
    let info = TaskWaiter::new(&session).wait(&task).await.unwrap();

    assert_eq!(info.state, TaskState::Success);
    assert_eq!(started.elapsed(), 3 * MIN_TASK_POLL_INTERVAL);
}
