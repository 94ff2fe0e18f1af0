//! Destroy workflow: idempotence, power-off and best-effort cleanup.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use vmops_cli::application::services::vm::DestroyOptions;
use vmops_cli::domain::{ErrorKind, Fault, PhaseResult};

use crate::helpers::Harness;
use crate::mocks::FakeEndpoint;

#[tokio::test(start_paused = true)]
async fn destroy_powers_off_unregisters_and_deletes_folder() {
    let endpoint = FakeEndpoint::standard();
    endpoint.add_vm("vm-a", "poweredOn");
    let h = Harness::new(endpoint).await;

    let report = h
        .orchestrator()
        .destroy("vm-a", DestroyOptions::default())
        .await
        .unwrap();

    assert!(report.found);
    assert_eq!(report.powered_off, PhaseResult::Ok);
    assert_eq!(report.unregister, PhaseResult::Ok);
    assert_eq!(report.delete_files, PhaseResult::Ok);
    assert_eq!(report.folder.as_deref(), Some("[datastore1] vm-a"));
    assert!(!report.has_failures());
    assert_eq!(
        h.endpoint.methods(),
        ["PowerOffVM_Task", "UnregisterVM", "DeleteDatastoreFile_Task"]
    );
    assert!(h.endpoint.vm("vm-a").is_none());
    assert!(!h.endpoint.has_dir("[datastore1] vm-a"));
    assert!(!h.endpoint.has_file("[datastore1] vm-a/vm-a.vmdk"));
}

#[tokio::test(start_paused = true)]
async fn destroy_of_powered_off_vm_skips_power_off() {
    let endpoint = FakeEndpoint::standard();
    endpoint.add_vm("vm-a", "poweredOff");
    let h = Harness::new(endpoint).await;

    let report = h
        .orchestrator()
        .destroy("vm-a", DestroyOptions::default())
        .await
        .unwrap();

    assert_eq!(report.powered_off, PhaseResult::Skipped);
    assert_eq!(h.endpoint.count("PowerOffVM_Task"), 0);
}

#[tokio::test(start_paused = true)]
async fn destroy_of_absent_vm_succeeds_without_changes() {
    let h = Harness::new(FakeEndpoint::standard()).await;

    let report = h
        .orchestrator()
        .destroy("ghost", DestroyOptions::default())
        .await
        .unwrap();

    assert!(!report.found);
    assert!(h.endpoint.methods().is_empty());
}

#[tokio::test(start_paused = true)]
async fn destroy_twice_is_idempotent() {
    let endpoint = FakeEndpoint::standard();
    endpoint.add_vm("vm-a", "poweredOn");
    let h = Harness::new(endpoint).await;
    let orchestrator = h.orchestrator();

    orchestrator.destroy("vm-a", DestroyOptions::default()).await.unwrap();
    let second = orchestrator.destroy("vm-a", DestroyOptions::default()).await.unwrap();

    assert!(!second.found);
}

#[tokio::test(start_paused = true)]
async fn keep_disks_leaves_the_folder() {
    let endpoint = FakeEndpoint::standard();
    endpoint.add_vm("vm-a", "poweredOff");
    let h = Harness::new(endpoint).await;

    let report = h
        .orchestrator()
        .destroy("vm-a", DestroyOptions { keep_disks: true })
        .await
        .unwrap();

    assert_eq!(report.delete_files, PhaseResult::Skipped);
    assert!(h.endpoint.has_file("[datastore1] vm-a/vm-a.vmdk"));
    assert!(h.endpoint.vm("vm-a").is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_unregister_still_deletes_folder_of_running_vm() {
    let endpoint = FakeEndpoint::standard();
    endpoint.add_vm("vm-a", "poweredOn");
    endpoint.inject(
        "UnregisterVM",
        Fault::from_server(vec!["InvalidState".into()], "The operation is not allowed in the current state."),
        1,
    );
    let h = Harness::new(endpoint).await;

    let report = h
        .orchestrator()
        .destroy("vm-a", DestroyOptions::default())
        .await
        .unwrap();

    assert_eq!(report.powered_off, PhaseResult::Ok);
    assert!(
        matches!(&report.unregister, PhaseResult::Failed(reason) if reason.contains("not allowed"))
    );
    assert_eq!(report.delete_files, PhaseResult::Ok);
    assert!(report.has_failures());
    assert_eq!(h.endpoint.power_state("vm-a").as_deref(), Some("poweredOff"));
    assert!(!h.endpoint.has_dir("[datastore1] vm-a"));
}

#[tokio::test(start_paused = true)]
async fn cleanup_failures_are_reported_not_raised() {
    let endpoint = FakeEndpoint::standard();
    endpoint.add_vm("vm-a", "poweredOff");
    endpoint.inject(
        "UnregisterVM",
        Fault::from_server(vec!["InvalidState".into()], "The operation is not allowed in the current state."),
        1,
    );
    endpoint.fail_tasks("DeleteDatastoreFile_Task", "Cannot delete file [datastore1] vm-a");
    let h = Harness::new(endpoint).await;

    let report = h
        .orchestrator()
        .destroy("vm-a", DestroyOptions::default())
        .await
        .unwrap();

    assert!(report.unregister.is_failed());
    assert!(
        matches!(&report.delete_files, PhaseResult::Failed(reason) if reason.contains("Cannot delete file"))
    );
    assert!(report.has_failures());
}

#[tokio::test(start_paused = true)]
async fn power_off_failure_aborts_destroy() {
    let endpoint = FakeEndpoint::standard();
    endpoint.add_vm("vm-a", "poweredOn");
    endpoint.fail_tasks("PowerOffVM_Task", "Operation timed out.");
    let h = Harness::new(endpoint).await;

    let err = h
        .orchestrator()
        .destroy("vm-a", DestroyOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TaskFailure);
    assert!(h.endpoint.vm("vm-a").is_some());
    assert_eq!(h.endpoint.count("UnregisterVM"), 0);
}
