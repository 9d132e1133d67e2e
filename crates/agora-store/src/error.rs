use agora_core::CollaboratorError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("background task failed: {0}")]
    Join(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("no rows".into()),
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(e.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Join(e.to_string())
    }
}

impl From<StoreError> for CollaboratorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => CollaboratorError::NotFound(what),
            other => CollaboratorError::Unavailable(other.to_string()),
        }
    }
}
