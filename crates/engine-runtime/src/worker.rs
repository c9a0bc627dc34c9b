use connectors::{PgGateway, TransformEngine};
use engine_core::pipeline::run_submission;
use model::{JobDescriptor, ShutdownFlag, StatusCode, WorkerCount};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::queue::JobReceiver;

/// One Parse Worker (§4.3): owns a private Database Gateway for its whole
/// lifetime and consumes Job Descriptors from the shared job queue.
pub struct Worker {
    id: usize,
    gateway: PgGateway,
    receiver: JobReceiver,
    shutdown: ShutdownFlag,
    active_workers: WorkerCount,
    registration_mutex: Arc<Mutex<()>>,
    engine: Arc<dyn TransformEngine>,
    reportdir: String,
    max_report_size: u64,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        gateway: PgGateway,
        receiver: JobReceiver,
        shutdown: ShutdownFlag,
        active_workers: WorkerCount,
        registration_mutex: Arc<Mutex<()>>,
        engine: Arc<dyn TransformEngine>,
        reportdir: String,
        max_report_size: u64,
    ) -> Self {
        Self {
            id,
            gateway,
            receiver,
            shutdown,
            active_workers,
            registration_mutex,
            engine,
            reportdir,
            max_report_size,
        }
    }

    /// The worker's main loop (§4.3). Counts itself in on entry and out on
    /// every exit path via [`WorkerCountGuard`], so a panic or an early
    /// `return` can never leave the shared counter wrong.
    pub fn run(mut self) {
        let _count_guard = WorkerCountGuard::new(self.active_workers.clone());

        loop {
            if !self.gateway.ping() {
                error!(worker = self.id, "lost database connection");
                if self.active_workers.get() <= 1 {
                    warn!(worker = self.id, "last worker lost its connection, triggering shutdown");
                    self.shutdown.set();
                }
                return;
            }

            let message = match self.receiver.recv() {
                Ok(message) => message,
                Err(_) => {
                    info!(worker = self.id, "job queue closed, exiting");
                    return;
                }
            };

            if self.shutdown.is_set() {
                info!(worker = self.id, "shutdown observed, discarding message and exiting");
                return;
            }

            let job = match message {
                JobDescriptor::None => continue,
                JobDescriptor::Available(job) => job,
            };

            if let Err(err) = self
                .gateway
                .update_submission_status(job.submission_id, StatusCode::InProgress)
            {
                error!(
                    worker = self.id,
                    submission_id = job.submission_id,
                    error = %err,
                    "failed to mark submission in_progress, skipping"
                );
                continue;
            }

            let status = run_submission(
                &mut self.gateway,
                self.engine.as_ref(),
                &self.registration_mutex,
                &job,
                &self.reportdir,
                self.max_report_size,
            );

            if let Err(err) = self
                .gateway
                .update_submission_status(job.submission_id, status)
            {
                error!(
                    worker = self.id,
                    submission_id = job.submission_id,
                    final_status = %status,
                    error = %err,
                    "failed to persist final submission status"
                );
            }
        }
    }
}

/// Decrements [`WorkerCount`] on drop, so every return path in [`Worker::run`],
/// including a future panic, keeps the counter correct.
struct WorkerCountGuard(WorkerCount);

impl WorkerCountGuard {
    fn new(count: WorkerCount) -> Self {
        count.increment();
        Self(count)
    }
}

impl Drop for WorkerCountGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}
