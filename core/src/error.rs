use thiserror::Error;

/// Errors raised by the catalog core.
///
/// Absence is never an error here: unknown ids and terms surface as empty
/// results or no-op removals.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed operation log record at line {line}: {source}")]
    LogRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl SearchError {
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        SearchError::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
