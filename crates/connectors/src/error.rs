use thiserror::Error;

/// All errors coming from the database/query layer.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pg error: {0}")]
    Pg(#[from] postgres::Error),

    #[error("plan requires schema version {required} but connection is at {actual}")]
    SchemaVersionTooOld { required: u32, actual: u32 },

    #[error("cannot set submission status to {0:?}: not a valid target status")]
    InvalidStatusTransition(model::StatusCode),

    #[error("unsupported RETURNING column type for key {0:?}")]
    UnsupportedKeyColumn(Option<String>),

    #[error("xml error: {0}")]
    Xml(#[from] crate::xml::XmlError),

    #[error("{0}")]
    Unknown(String),
}

/// Errors surfaced by the higher-level registration operations
/// (`register_system`, `register_run`, `register_measurements`), which
/// layer extra data-integrity checks on top of plain `insert` failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Model(#[from] model::ModelError),

    #[error(transparent)]
    Transform(#[from] crate::transform::TransformError),

    #[error("plan for table {table} did not carry required field {field}")]
    MissingField { table: String, field: String },

    #[error("data integrity failure: {0} rows found for sysid {1}, expected 0 or 1")]
    AmbiguousSystemRow(i64, String),
}
