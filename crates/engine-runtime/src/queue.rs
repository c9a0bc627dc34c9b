use crate::error::RuntimeError;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use model::JobDescriptor;
use std::time::Duration;
use tracing::warn;

pub type JobSender = Sender<JobDescriptor>;
pub type JobReceiver = Receiver<JobDescriptor>;

/// The bounded, blocking, multi-producer/multi-consumer channel that
/// stands in for the source's POSIX message queue (§9 design note). There
/// is no host-specific limit to probe for in-process, so the depth is a
/// fixed default rather than a `/proc` inspection.
pub fn default_queue_depth() -> usize {
    5
}

pub fn job_queue(depth: usize) -> (JobSender, JobReceiver) {
    bounded(depth)
}

/// Sends `job`, retrying every `retry_interval` while the queue stays
/// saturated and logging a warning only on the first stall (§4.2). Any
/// other send failure (the queue has been closed) is fatal to the caller.
pub fn send_with_backpressure(
    sender: &JobSender,
    mut job: JobDescriptor,
    retry_interval: Duration,
    stall_context: &str,
) -> Result<(), RuntimeError> {
    let mut warned = false;
    loop {
        match sender.send_timeout(job, retry_interval) {
            Ok(()) => return Ok(()),
            Err(SendTimeoutError::Timeout(returned)) => {
                if !warned {
                    warn!(context = stall_context, "job queue saturated, retrying");
                    warned = true;
                }
                job = returned;
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                return Err(RuntimeError::QueueDisconnected);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_succeeds_immediately_when_the_queue_has_room() {
        let (tx, rx) = job_queue(1);
        send_with_backpressure(&tx, JobDescriptor::None, Duration::from_millis(10), "test").unwrap();
        assert_eq!(rx.recv().unwrap(), JobDescriptor::None);
    }

    #[test]
    fn send_retries_until_a_slot_opens_up() {
        let (tx, rx) = job_queue(1);
        tx.send(JobDescriptor::None).unwrap();

        let sender = tx.clone();
        let handle = std::thread::spawn(move || {
            send_with_backpressure(&sender, JobDescriptor::None, Duration::from_millis(20), "test")
        });

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(rx.recv().unwrap(), JobDescriptor::None);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn send_fails_once_every_receiver_is_dropped() {
        let (tx, rx) = job_queue(1);
        drop(rx);
        let err = send_with_backpressure(&tx, JobDescriptor::None, Duration::from_millis(5), "test")
            .unwrap_err();
        assert!(matches!(err, RuntimeError::QueueDisconnected));
    }
}
