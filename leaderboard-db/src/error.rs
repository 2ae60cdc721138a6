use thiserror::Error;
use tokio_rusqlite::rusqlite;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("malformed record id: {0:?}")]
    MalformedId(String),

    #[error("document encoding error: {0}")]
    Document(#[from] serde_json::Error),

    #[error("stored document is not a json object")]
    NotAnObject,
}

pub type Result<T> = std::result::Result<T, DbError>;
