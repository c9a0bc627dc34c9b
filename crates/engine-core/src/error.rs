use model::StatusCode;
use thiserror::Error;

/// Every way the per-job transaction (§4.3) can fail, each tied to the
/// exact queue-table status it maps to. One report failing never panics
/// the worker; it always resolves to one of these.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("report exceeds the configured size limit")]
    FileTooBig,

    #[error("report is not well-formed xml: {0}")]
    XmlParseFailed(String),

    #[error("system registration failed: {0}")]
    SystemRegFailed(String),

    #[error("run id reservation failed: {0}")]
    RterIdRegFailed(String),

    #[error("database transaction could not begin or commit: {0}")]
    GeneralDbFailed(String),

    #[error("run registration failed: {0}")]
    RunRegFailed(String),

    #[error("cyclic measurement registration failed: {0}")]
    CyclicRegFailed(String),

    #[error("archive directory or file rename failed: {0}")]
    FileMoveFailed(String),

    /// Anything that happens before the report is even opened for parsing
    /// (a vanished file, a permissions error on stat). Not named by the
    /// status table, so it falls to the catch-all per §7.
    #[error("unexpected failure: {0}")]
    Unknown(String),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::FileTooBig => StatusCode::FileTooBig,
            Self::XmlParseFailed(_) => StatusCode::XmlParseFailed,
            Self::SystemRegFailed(_) => StatusCode::SystemRegFailed,
            Self::RterIdRegFailed(_) => StatusCode::RterIdRegFailed,
            Self::GeneralDbFailed(_) => StatusCode::GeneralDbFailed,
            Self::RunRegFailed(_) => StatusCode::RunRegFailed,
            Self::CyclicRegFailed(_) => StatusCode::CyclicRegFailed,
            Self::FileMoveFailed(_) => StatusCode::FileMoveFailed,
            Self::Unknown(_) => StatusCode::UnknownFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_maps_to_a_terminal_status() {
        let errors: Vec<PipelineError> = vec![
            PipelineError::FileTooBig,
            PipelineError::XmlParseFailed("x".into()),
            PipelineError::SystemRegFailed("x".into()),
            PipelineError::RterIdRegFailed("x".into()),
            PipelineError::GeneralDbFailed("x".into()),
            PipelineError::RunRegFailed("x".into()),
            PipelineError::CyclicRegFailed("x".into()),
            PipelineError::FileMoveFailed("x".into()),
            PipelineError::Unknown("x".into()),
        ];
        for err in errors {
            assert!(err.status().is_terminal());
        }
    }
}
