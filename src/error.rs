//! Error taxonomy shared by the store, the ledger and the invoice serializer.
//!
//! Every variant is meant to be shown to the user at the point of the action
//! that triggered it. Nothing is retried.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("'{name}' already exists")]
    DuplicateEntity { name: String },

    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no embedded invoice data found")]
    MissingEmbeddedData,

    #[error("embedded invoice data is corrupt: {0}")]
    CorruptEmbeddedData(String),

    #[error("customer {id} no longer exists")]
    CustomerNotFound { id: i64 },

    #[error("pdf error: {0}")]
    Render(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<AppError> for String {
    fn from(value: AppError) -> Self {
        value.to_string()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::CorruptEmbeddedData(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
