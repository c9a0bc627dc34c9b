use crate::error::PipelineError;
use connectors::{PgGateway, Report, TransformEngine};
use model::job::Job;
use model::StatusCode;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

/// Builds the canonical archive location for an accepted report (§6):
/// `<reportdir>/<client_id>/report-<rterid>.xml`.
pub fn archive_path(reportdir: &str, client_id: &str, rterid: i64) -> String {
    format!("{reportdir}/{client_id}/report-{rterid}.xml")
}

/// Executes one submission end to end (§4.3's per-job transaction) and
/// returns the terminal status to persist. Never panics on an expected
/// failure; every error path resolves to a status code instead.
pub fn run_submission(
    gateway: &mut PgGateway,
    engine: &dyn TransformEngine,
    registration_mutex: &Mutex<()>,
    job: &Job,
    reportdir: &str,
    max_report_size: u64,
) -> StatusCode {
    match run_submission_inner(gateway, engine, registration_mutex, job, reportdir, max_report_size) {
        Ok(()) => StatusCode::Success,
        Err(err) => {
            warn!(
                submission_id = job.submission_id,
                error = %err,
                "submission did not complete"
            );
            err.status()
        }
    }
}

fn run_submission_inner(
    gateway: &mut PgGateway,
    engine: &dyn TransformEngine,
    registration_mutex: &Mutex<()>,
    job: &Job,
    reportdir: &str,
    max_report_size: u64,
) -> Result<(), PipelineError> {
    // a. File-size gate.
    let metadata = fs::metadata(&job.file_path)
        .map_err(|err| PipelineError::Unknown(format!("stat {}: {err}", job.file_path)))?;
    if metadata.len() > max_report_size {
        return Err(PipelineError::FileTooBig);
    }

    // b. Parse.
    let raw_xml = fs::read_to_string(&job.file_path)
        .map_err(|err| PipelineError::XmlParseFailed(err.to_string()))?;
    let report = Report::parse(raw_xml).map_err(|err| PipelineError::XmlParseFailed(err.to_string()))?;

    // c. System + run-id registration, under the process-wide mutex.
    let (syskey, rterid) = {
        let _guard = registration_mutex
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        let syskey = gateway
            .register_system(engine, &report)
            .map_err(|err| PipelineError::SystemRegFailed(err.to_string()))?;
        let rterid = gateway
            .reserve_run_id()
            .map_err(|err| PipelineError::RterIdRegFailed(err.to_string()))?;
        (syskey, rterid)
    };

    // d. Begin transaction.
    gateway
        .begin()
        .map_err(|err| PipelineError::GeneralDbFailed(err.to_string()))?;

    // e. Archive path.
    let archive = archive_path(reportdir, &job.client_id, rterid);

    // f. Register the run.
    if let Err(err) = gateway.register_run(engine, &report, job.submission_id, syskey, rterid, &archive) {
        let _ = gateway.rollback();
        return Err(PipelineError::RunRegFailed(err.to_string()));
    }

    // g. Register measurements.
    if let Err(err) = gateway.register_measurements(engine, &report, rterid) {
        let _ = gateway.rollback();
        return Err(PipelineError::CyclicRegFailed(err.to_string()));
    }

    // h. Ensure the archive directory hierarchy exists.
    if let Some(parent) = Path::new(&archive).parent() {
        if let Err(err) = ensure_archive_dir(parent) {
            let _ = gateway.rollback();
            return Err(PipelineError::FileMoveFailed(err.to_string()));
        }
    }

    // i. Rename the report file into the archive.
    if let Err(err) = fs::rename(&job.file_path, &archive) {
        let _ = gateway.rollback();
        return Err(PipelineError::FileMoveFailed(err.to_string()));
    }

    // j. Commit.
    gateway
        .commit()
        .map_err(|err| PipelineError::GeneralDbFailed(err.to_string()))?;
    Ok(())
}

#[cfg(unix)]
fn ensure_archive_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::create_dir_all(dir)?;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn ensure_archive_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_path_matches_the_canonical_layout() {
        assert_eq!(
            archive_path("/var/lib/rteval/reports", "host1", 42),
            "/var/lib/rteval/reports/host1/report-42.xml"
        );
    }
}
