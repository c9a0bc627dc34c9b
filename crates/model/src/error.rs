use thiserror::Error;

/// Invariant violations detected while inspecting an `InsertionPlan` before
/// it reaches the Database Gateway.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("cell references field_id {field_id} not declared in plan for table {table}")]
    UndeclaredField { table: String, field_id: u32 },
}
