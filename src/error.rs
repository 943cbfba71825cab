use thiserror::Error;

/// Failure taxonomy shared by the aggregation engine, the record store and the
/// report compositor. `code()` is the wire code used in IPC error envelopes.
#[derive(Debug, Error)]
pub enum RecordsError {
    /// Missing or inactive entity, disabled module, or absent report file.
    #[error("{0}")]
    NotFound(String),

    /// A second active record for the same (student, year), or a stale version.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecordsError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "bad_params",
            Self::Db(_) => "db_query_failed",
            Self::Io(_) => "io_failed",
        }
    }
}

pub type RecordsResult<T> = Result<T, RecordsError>;
