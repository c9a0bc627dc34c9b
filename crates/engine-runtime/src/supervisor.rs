use crate::dispatcher::Dispatcher;
use crate::error::RuntimeError;
use crate::queue::{default_queue_depth, job_queue};
use crate::signals;
use crate::worker::Worker;
use connectors::{DatabaseConfig, PgGateway, ReferenceTransformEngine, TransformEngine};
use engine_config::{Config, LogDestination};
use model::{ShutdownFlag, WorkerCount};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// The top-level process (§4.4): constructs the shared topology, starts
/// the worker pool, runs the Dispatcher in the calling thread, and tears
/// everything back down on shutdown.
pub struct Supervisor {
    config: Config,
    shutdown: ShutdownFlag,
}

impl Supervisor {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            shutdown: ShutdownFlag::new(),
        }
    }

    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Runs the daemon to completion. Returns `Ok(())` both on a clean
    /// startup-to-shutdown cycle and when a dispatcher-fatal condition
    /// (§7 class 3) triggers a graceful shutdown, neither of which is a
    /// startup failure or carries a distinct exit code. Only a
    /// startup-fatal [`RuntimeError`] (§7 class 4) is ever returned.
    pub fn run(self) -> Result<(), RuntimeError> {
        // Step 3: optionally daemonize. Refused if the log destination is
        // a console sink (§4.7): a daemon with no controlling terminal
        // cannot usefully log to one.
        if self.config.daemon {
            let destination: LogDestination = self
                .config
                .log_dest
                .parse()
                .map_err(RuntimeError::Config)?;
            if destination.is_console() {
                return Err(RuntimeError::DaemonizeRefusedConsoleLog);
            }
            daemonize::Daemonize::new()
                .start()
                .map_err(|err| RuntimeError::Daemonize(err.to_string()))?;
        }

        // Step 4: the transformation engine handle. A real deployment may
        // load a richer implementation keyed off `config.xsltpath`; the
        // reference engine built into this crate is sufficient to drive
        // the pipeline end to end (§9 open question).
        let engine: Arc<dyn TransformEngine> = Arc::new(ReferenceTransformEngine::new());

        // Step 5: the bounded job queue.
        let (sender, receiver) = job_queue(default_queue_depth());

        // Step 6: connect one gateway for the Supervisor, then one per
        // worker. Any connect failure here is startup-fatal (exit 4).
        let db_config = DatabaseConfig {
            server: self.config.db_server.clone(),
            port: self.config.db_port,
            database: self.config.database.clone(),
            username: self.config.db_username.clone(),
            password: self.config.db_password.clone(),
        };

        let mut supervisor_gateway = PgGateway::connect(db_config.clone(), "supervisor")
            .map_err(RuntimeError::DatabaseConnect)?;

        let mut worker_gateways = Vec::with_capacity(self.config.threads);
        for i in 0..self.config.threads {
            let gateway = PgGateway::connect(db_config.clone(), format!("worker-{i}"))
                .map_err(RuntimeError::DatabaseConnect)?;
            worker_gateways.push(gateway);
        }

        // Step 7: install signal handlers.
        signals::install(self.shutdown.clone())?;

        // Step 8: launch the worker pool, then give them a moment to reach
        // their receive loop before the Dispatcher starts sending jobs.
        let active_workers = WorkerCount::new();
        let registration_mutex = Arc::new(Mutex::new(()));
        let mut handles = Vec::with_capacity(worker_gateways.len());

        for (id, gateway) in worker_gateways.into_iter().enumerate() {
            let worker = Worker::new(
                id,
                gateway,
                receiver.clone(),
                self.shutdown.clone(),
                active_workers.clone(),
                registration_mutex.clone(),
                engine.clone(),
                self.config.reportdir.clone(),
                self.config.max_report_size,
            );
            let handle = thread::Builder::new()
                .name(format!("parse-worker-{id}"))
                .spawn(move || worker.run())
                .expect("failed to spawn parse worker thread");
            handles.push(handle);
        }

        thread::sleep(Duration::from_secs(3));

        // Step 9: run the Dispatcher in the calling thread.
        let mut dispatcher = Dispatcher::new(
            &mut supervisor_gateway,
            sender.clone(),
            self.shutdown.clone(),
            active_workers.clone(),
        );

        if let Err(err) = dispatcher.run() {
            warn!(error = %err, "dispatcher stopped; shutting down");
        }

        // Shutdown: drain nudges, join workers, close the queue, and
        // disconnect every gateway (§4.4).
        self.shutdown.set();
        if let Err(err) = dispatcher.drain_shutdown_nudges(active_workers.get()) {
            error!(error = %err, "failed to fully drain shutdown nudges");
        }

        drop(sender);
        drop(receiver);

        for handle in handles {
            if handle.join().is_err() {
                error!("a parse worker thread panicked");
            }
        }

        supervisor_gateway.disconnect();
        info!("shutdown complete");

        Ok(())
    }
}
