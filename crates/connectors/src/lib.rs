pub mod config;
pub mod encode;
pub mod error;
pub mod gateway;
pub mod reference;
pub mod transform;
pub mod xml;

pub use config::DatabaseConfig;
pub use error::{DbError, GatewayError};
pub use gateway::PgGateway;
pub use reference::ReferenceTransformEngine;
pub use transform::{PlanContext, Report, TransformEngine};
