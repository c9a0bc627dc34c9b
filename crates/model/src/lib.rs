pub mod error;
pub mod job;
pub mod plan;
pub mod shutdown;
pub mod status;
pub mod value;
pub mod worker_count;

pub use error::ModelError;
pub use job::JobDescriptor;
pub use plan::{Cell, CellKind, CellPayload, Field, HashKind, InsertionPlan, Record};
pub use shutdown::ShutdownFlag;
pub use status::StatusCode;
pub use value::Value;
pub use worker_count::WorkerCount;
