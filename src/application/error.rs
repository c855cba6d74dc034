use crate::domain::error::{DomainError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("missing required field {0}")]
    MissingField(&'static str),

    /// 未存在・ID形式不正のどちらもこれにまとめる。
    #[error("no book exists")]
    NoBook,

    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(d) => AppError::Domain(d),
            StoreError::NotFound(_) | StoreError::InvalidId(_) => AppError::NoBook,
            other @ StoreError::BackendUnavailable(_) => AppError::Storage(other),
        }
    }
}
