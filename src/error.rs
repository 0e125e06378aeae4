use thiserror::Error;

use crate::recurrence::InvalidRecurrence;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(i64),

    #[error("parent task {0} not found")]
    ParentNotFound(i64),

    #[error(transparent)]
    InvalidRecurrence(#[from] InvalidRecurrence),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
