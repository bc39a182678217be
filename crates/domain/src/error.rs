/// Shared error type used across the vigil crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV: {0}")]
    Csv(String),

    #[error("validation: {0}")]
    ValidationFailure(String),

    #[error("duplicate alias: {0}")]
    DuplicateAlias(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("storage: {0}")]
    StorageFailure(String),

    #[error("auth: {0}")]
    AuthFailure(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
