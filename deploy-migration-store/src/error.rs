#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("migration `{0}` is already marked as applied")]
    DuplicateMarker(String),

    #[error("invalid table name `{0}`")]
    InvalidTableName(String),

    #[cfg(any(feature = "pg", feature = "sqlite"))]
    #[error("sqlx `{0}`")]
    Sqlx(#[from] sqlx::Error),

    #[error("serde_json `{0}`")]
    SerdeJson(#[from] serde_json::Error),

    #[error("uuid `{0}`")]
    Uuid(#[from] uuid::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
