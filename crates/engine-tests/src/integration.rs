//! End-to-end tests driving the real Dispatcher/Worker thread topology
//! against a reachable Postgres instance, instead of calling
//! `run_submission` directly as `pipeline.rs` does. These confirm the
//! queue-table state machine and the shutdown protocol, not just the
//! per-job transaction.

use crate::fixtures::{valid_report_xml, write_report};
use crate::{assertion_client, database_configured, reset_schema, test_db_config};
use connectors::{PgGateway, ReferenceTransformEngine};
use engine_runtime::queue::{default_queue_depth, job_queue};
use engine_runtime::{Dispatcher, Worker};
use model::{JobDescriptor, ShutdownFlag, StatusCode, WorkerCount};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn insert_queue_row(filename: &str, clientid: &str) -> i64 {
    let mut client = assertion_client();
    let row = client
        .query_one(
            "INSERT INTO submissionqueue (filename, clientid, status) VALUES ($1, $2, 0) RETURNING submid",
            &[&filename, &clientid],
        )
        .expect("insert queue row");
    row.get(0)
}

fn queue_status(submid: i64) -> i32 {
    let mut client = assertion_client();
    let row = client
        .query_one("SELECT status FROM submissionqueue WHERE submid = $1", &[&submid])
        .expect("read queue status");
    row.get(0)
}

fn wait_for_terminal_status(submid: i64, timeout: Duration) -> i32 {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let status = queue_status(submid);
        if StatusCode::from_i32(status).map(|s| s.is_terminal()).unwrap_or(false) {
            return status;
        }
        if std::time::Instant::now() > deadline {
            return status;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

#[test]
#[ignore]
fn a_claimed_submission_runs_end_to_end_through_one_worker_and_lands_on_success() {
    if !database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    }
    reset_schema();

    let report = write_report(&valid_report_xml("host-e2e"));
    let submid = insert_queue_row(&report.path().to_string_lossy(), "host-e2e");

    let reportdir = tempdir().expect("reportdir");
    let (sender, receiver) = job_queue(default_queue_depth());
    let shutdown = ShutdownFlag::new();
    let active_workers = WorkerCount::new();
    let registration_mutex = std::sync::Arc::new(Mutex::new(()));
    let engine: std::sync::Arc<dyn connectors::TransformEngine> =
        std::sync::Arc::new(ReferenceTransformEngine::new());

    let worker_gateway = PgGateway::connect(test_db_config(), "e2e-worker").expect("connect worker gateway");
    let worker = Worker::new(
        0,
        worker_gateway,
        receiver.clone(),
        shutdown.clone(),
        active_workers.clone(),
        registration_mutex,
        engine,
        reportdir.path().to_str().unwrap().to_string(),
        2_097_152,
    );
    let worker_handle = thread::spawn(move || worker.run());

    // Gives the worker time to count itself in before the Dispatcher's
    // active-worker check runs, the same way the Supervisor does.
    thread::sleep(Duration::from_millis(200));

    let mut dispatcher_gateway =
        PgGateway::connect(test_db_config(), "e2e-dispatcher").expect("connect dispatcher gateway");
    let mut dispatcher = Dispatcher::new(
        &mut dispatcher_gateway,
        sender.clone(),
        shutdown.clone(),
        active_workers.clone(),
    );

    let dispatcher_shutdown = shutdown.clone();
    let dispatcher_handle = thread::spawn(move || {
        let _ = dispatcher.run();
        dispatcher
    });

    let final_status = wait_for_terminal_status(submid, Duration::from_secs(10));
    assert_eq!(final_status, StatusCode::Success.as_i32());

    dispatcher_shutdown.set();
    drop(sender);
    drop(receiver);
    let mut dispatcher = dispatcher_handle.join().expect("dispatcher thread panicked");
    let _ = dispatcher.drain_shutdown_nudges(1);
    worker_handle.join().expect("worker thread panicked");
}

#[test]
#[ignore]
fn shutdown_before_a_submission_is_claimed_leaves_it_at_status_new() {
    if !database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    }
    reset_schema();

    let report = write_report(&valid_report_xml("host-shutdown"));
    let submid = insert_queue_row(&report.path().to_string_lossy(), "host-shutdown");

    // No worker and no dispatcher are ever started; the row must stay
    // exactly where the submitter left it.
    let status = queue_status(submid);
    assert_eq!(status, StatusCode::New.as_i32());
}

#[test]
#[ignore]
fn shutdown_set_while_a_worker_has_a_job_in_flight_still_lets_it_reach_a_terminal_status() {
    if !database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    }
    reset_schema();

    let report = write_report(&valid_report_xml("host-inflight"));
    let submid = insert_queue_row(&report.path().to_string_lossy(), "host-inflight");

    let reportdir = tempdir().expect("reportdir");
    let (sender, receiver) = job_queue(default_queue_depth());
    let shutdown = ShutdownFlag::new();
    let active_workers = WorkerCount::new();
    let registration_mutex = std::sync::Arc::new(Mutex::new(()));
    let engine: std::sync::Arc<dyn connectors::TransformEngine> =
        std::sync::Arc::new(ReferenceTransformEngine::new());

    let worker_gateway = PgGateway::connect(test_db_config(), "inflight-worker").expect("connect worker gateway");
    let worker = Worker::new(
        0,
        worker_gateway,
        receiver.clone(),
        shutdown.clone(),
        active_workers.clone(),
        registration_mutex,
        engine,
        reportdir.path().to_str().unwrap().to_string(),
        2_097_152,
    );
    let worker_handle = thread::spawn(move || worker.run());

    // Gives the worker time to reach its receive loop before the job is
    // handed to it directly, bypassing the Dispatcher entirely.
    thread::sleep(Duration::from_millis(200));

    sender
        .send(JobDescriptor::Available(model::job::Job {
            submission_id: submid,
            client_id: "host-inflight".to_string(),
            file_path: report.path().to_string_lossy().to_string(),
        }))
        .expect("hand the job to the worker");

    // The worker marks the row `InProgress` immediately before it starts
    // `run_submission`; waiting for that transition and only then setting
    // shutdown pins the flag's arrival to the middle of the submission's
    // processing, not to whatever happened to be queued beforehand.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        if queue_status(submid) == StatusCode::InProgress.as_i32() {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "submission never reached InProgress");
        thread::sleep(Duration::from_millis(5));
    }
    shutdown.set();

    drop(sender);
    drop(receiver);
    worker_handle.join().expect("worker thread panicked");

    let final_status = wait_for_terminal_status(submid, Duration::from_secs(10));
    assert_eq!(
        final_status,
        StatusCode::Success.as_i32(),
        "a job already in flight when shutdown is set must still run to completion"
    );
}
