use thiserror::Error;

/// Errors at the edges of the pipeline (files, upstream JSON, config).
///
/// The processing core itself never fails; degenerate input produces
/// empty or zeroed output instead.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected response shape: {0}")]
    InvalidEnvelope(String),

    #[error("Invalid config: {0}")]
    Config(String),
}

pub type ReportResult<T> = Result<T, ReportError>;
