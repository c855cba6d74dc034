#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("book title must not be empty")]
    EmptyTitle,

    #[error("comment must not be empty")]
    EmptyComment,
}

/// BookStore実装が返すエラー。HTTPステータスは持たない。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("book not found: {0}")]
    NotFound(String),

    #[error("invalid book id: {0}")]
    InvalidId(String),

    /// 接続失敗・タイムアウト。Selectorがフォールバックに変換する。
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}
