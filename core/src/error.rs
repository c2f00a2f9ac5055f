use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("food '{0}' not found")]
    FoodNotFound(String),

    #[error("a food named '{0}' already exists")]
    DuplicateName(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// True for errors caused by the caller's input rather than the store.
    #[must_use]
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::FoodNotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Map a UNIQUE violation on `foods.name` to [`StoreError::DuplicateName`].
pub(crate) fn map_unique(err: rusqlite::Error, name: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::DuplicateName(name.to_string())
        }
        _ => StoreError::Sqlite(err),
    }
}
