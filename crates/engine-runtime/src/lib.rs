//! The thread topology that drives the submission pipeline in production
//! (§4.2-§4.4): a bounded job queue, the Dispatcher, the Parse Worker pool,
//! signal handling, and the Supervisor that wires them together.

pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod signals;
pub mod supervisor;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use error::RuntimeError;
pub use queue::{default_queue_depth, JobReceiver, JobSender};
pub use supervisor::Supervisor;
pub use worker::Worker;
