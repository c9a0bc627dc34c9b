//! The per-job transaction at the heart of the submission pipeline (§4.3):
//! pure-enough business logic that the runtime crate drives from a real
//! thread against a real [`connectors::PgGateway`].

pub mod error;
pub mod pipeline;

pub use error::PipelineError;
pub use pipeline::{archive_path, run_submission};
