use thiserror::Error;

/// Engine error kinds.
///
/// Syntax and semantic errors abort the current command before any
/// mutation. I/O errors on reads degrade to empty results where a partial
/// answer is acceptable; on writes they abort the operator. Data errors
/// (bad CSV values) are counted and skipped during blockify. State errors
/// flag breached internal invariants and are always recoverable by
/// degrading.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("SYNTAX ERROR: {0}")]
    Syntax(String),

    #[error("SEMANTIC ERROR: {0}")]
    Semantic(String),

    #[error("IO ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("DATA ERROR: {0}")]
    Data(String),

    #[error("STATE ERROR: {0}")]
    State(String),
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(io) => EngineError::Io(io),
                other => EngineError::Data(format!("{other:?}")),
            }
        } else {
            EngineError::Data(err.to_string())
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
