//! Integration tests exercising `engine_core::pipeline::run_submission`
//! directly against a real Postgres instance. Every test here needs a
//! reachable database and is `#[ignore]`d by default; run with
//! `cargo test -p engine-tests -- --ignored` against a `DATABASE_URL`.

use crate::fixtures::{malformed_xml, report_with_no_measurements, valid_report_xml, write_report};
use crate::{assertion_client, database_configured, reset_schema, test_db_config};
use connectors::{PgGateway, ReferenceTransformEngine};
use engine_core::pipeline::run_submission;
use model::job::Job;
use model::StatusCode;
use std::fs;
use std::sync::Mutex;
use std::thread;
use tempfile::tempdir;

fn gateway(id: &str) -> PgGateway {
    PgGateway::connect(test_db_config(), id.to_string()).expect("connect test gateway")
}

#[test]
#[ignore]
fn a_well_formed_report_is_archived_and_marked_success() {
    if !database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    }
    reset_schema();

    let report = write_report(&valid_report_xml("host-success"));
    let reportdir = tempdir().expect("reportdir");
    let job = Job {
        submission_id: 1,
        client_id: "host-success".to_string(),
        file_path: report.path().to_string_lossy().to_string(),
    };

    let mut gw = gateway("test-success");
    let engine = ReferenceTransformEngine::new();
    let registration_mutex = Mutex::new(());

    let status = run_submission(
        &mut gw,
        &engine,
        &registration_mutex,
        &job,
        reportdir.path().to_str().unwrap(),
        2_097_152,
    );

    assert_eq!(status, StatusCode::Success);
    let archived = reportdir.path().join("host-success");
    assert!(archived.is_dir(), "archive directory was not created");
    assert!(!report.path().exists(), "source file should have been moved");
}

#[test]
#[ignore]
fn a_report_with_no_measurement_elements_still_succeeds() {
    if !database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    }
    reset_schema();

    let report = write_report(&report_with_no_measurements("host-quiet"));
    let reportdir = tempdir().expect("reportdir");
    let job = Job {
        submission_id: 2,
        client_id: "host-quiet".to_string(),
        file_path: report.path().to_string_lossy().to_string(),
    };

    let mut gw = gateway("test-quiet");
    let engine = ReferenceTransformEngine::new();
    let registration_mutex = Mutex::new(());

    let status = run_submission(
        &mut gw,
        &engine,
        &registration_mutex,
        &job,
        reportdir.path().to_str().unwrap(),
        2_097_152,
    );

    assert_eq!(status, StatusCode::Success);
}

#[test]
#[ignore]
fn a_report_larger_than_the_configured_limit_is_rejected_without_touching_the_database() {
    if !database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    }
    reset_schema();

    let report = write_report(&valid_report_xml("host-toobig"));
    let reportdir = tempdir().expect("reportdir");
    let job = Job {
        submission_id: 3,
        client_id: "host-toobig".to_string(),
        file_path: report.path().to_string_lossy().to_string(),
    };

    let mut gw = gateway("test-toobig");
    let engine = ReferenceTransformEngine::new();
    let registration_mutex = Mutex::new(());

    let status = run_submission(
        &mut gw,
        &engine,
        &registration_mutex,
        &job,
        reportdir.path().to_str().unwrap(),
        1,
    );

    assert_eq!(status, StatusCode::FileTooBig);
    assert!(report.path().exists(), "oversized file must be left in place");
}

#[test]
#[ignore]
fn malformed_xml_is_rejected_as_a_parse_failure() {
    if !database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    }
    reset_schema();

    let report = write_report(malformed_xml());
    let reportdir = tempdir().expect("reportdir");
    let job = Job {
        submission_id: 4,
        client_id: "host-malformed".to_string(),
        file_path: report.path().to_string_lossy().to_string(),
    };

    let mut gw = gateway("test-malformed");
    let engine = ReferenceTransformEngine::new();
    let registration_mutex = Mutex::new(());

    let status = run_submission(
        &mut gw,
        &engine,
        &registration_mutex,
        &job,
        reportdir.path().to_str().unwrap(),
        2_097_152,
    );

    assert_eq!(status, StatusCode::XmlParseFailed);
}

#[cfg(unix)]
#[test]
#[ignore]
fn a_file_move_failure_after_registration_rolls_back_the_run_and_reports_status_eleven() {
    use std::os::unix::fs::PermissionsExt;

    if !database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    }
    reset_schema();

    let report = write_report(&valid_report_xml("host-filemove"));
    let reportdir = tempdir().expect("reportdir");
    // Take away write permission on the reportdir itself, so the archive
    // subdirectory (<reportdir>/<client_id>) can never be created and the
    // rename step that follows run registration is guaranteed to fail.
    fs::set_permissions(reportdir.path(), fs::Permissions::from_mode(0o555))
        .expect("lock down reportdir permissions");

    let job = Job {
        submission_id: 30,
        client_id: "host-filemove".to_string(),
        file_path: report.path().to_string_lossy().to_string(),
    };

    let mut gw = gateway("test-filemove");
    let engine = ReferenceTransformEngine::new();
    let registration_mutex = Mutex::new(());

    let status = run_submission(
        &mut gw,
        &engine,
        &registration_mutex,
        &job,
        reportdir.path().to_str().unwrap(),
        2_097_152,
    );

    fs::set_permissions(reportdir.path(), fs::Permissions::from_mode(0o755))
        .expect("restore reportdir permissions for cleanup");

    assert_eq!(status, StatusCode::FileMoveFailed);
    assert!(report.path().exists(), "source file must stay put when the archive move fails");

    let mut admin = assertion_client();
    let rows = admin
        .query("SELECT count(*) FROM rtevalruns", &[])
        .expect("count rtevalruns rows");
    let count: i64 = rows[0].get(0);
    assert_eq!(count, 0, "the failed run's registration must be rolled back, not left committed");
}

#[test]
#[ignore]
fn two_reports_from_the_same_host_share_one_systems_row() {
    if !database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    }
    reset_schema();

    let reportdir = tempdir().expect("reportdir");
    let registration_mutex = Mutex::new(());
    let engine = ReferenceTransformEngine::new();

    for (id, suffix) in [(10u64, "first"), (11u64, "second")] {
        let report = write_report(&valid_report_xml("host-dedup"));
        let job = Job {
            submission_id: id,
            client_id: format!("host-dedup-{suffix}"),
            file_path: report.path().to_string_lossy().to_string(),
        };
        let mut gw = gateway(&format!("test-dedup-{suffix}"));
        let status = run_submission(
            &mut gw,
            &engine,
            &registration_mutex,
            &job,
            reportdir.path().to_str().unwrap(),
            2_097_152,
        );
        assert_eq!(status, StatusCode::Success);
    }

    let mut admin = assertion_client();
    let rows = admin
        .query("SELECT count(*) FROM systems WHERE sysid = (SELECT sysid FROM systems LIMIT 1)", &[])
        .expect("count systems rows");
    let count: i64 = rows[0].get(0);
    assert_eq!(count, 1, "identical system attributes must not duplicate the systems row");
}

#[test]
#[ignore]
fn concurrent_registration_of_the_same_host_never_races_past_one_systems_row() {
    if !database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    }
    reset_schema();

    let reportdir = tempdir().expect("reportdir");
    let registration_mutex = std::sync::Arc::new(Mutex::new(()));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registration_mutex = registration_mutex.clone();
            let reportdir_path = reportdir.path().to_str().unwrap().to_string();
            thread::spawn(move || {
                let report = write_report(&valid_report_xml("host-concurrent"));
                let job = Job {
                    submission_id: 20 + i,
                    client_id: format!("host-concurrent-{i}"),
                    file_path: report.path().to_string_lossy().to_string(),
                };
                let mut gw = gateway(&format!("test-concurrent-{i}"));
                let engine = ReferenceTransformEngine::new();
                run_submission(&mut gw, &engine, &registration_mutex, &job, &reportdir_path, 2_097_152)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().expect("worker thread panicked"), StatusCode::Success);
    }

    let mut admin = assertion_client();
    let rows = admin
        .query("SELECT count(*) FROM systems", &[])
        .expect("count systems rows");
    let count: i64 = rows[0].get(0);
    assert_eq!(count, 1, "four concurrent submissions for one host must collapse to one systems row");
}
