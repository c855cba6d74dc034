use std::fmt;

use async_trait::async_trait;

use super::error::StoreError;
use super::model::book::Book;

/// どのバックエンドが応答しているか。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Persistent,
    InMemory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persistent => f.write_str("persistent"),
            Self::InMemory => f.write_str("in-memory"),
        }
    }
}

/// 永続化の抽象。Infra層が実装する。
///
/// IDは生の文字列で受け取り、形式の解釈は各バックエンドに任せる。
#[async_trait]
pub trait BookStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// 呼び出し前にIDの形式を検証するための述語。
    fn is_valid_id(&self, raw: &str) -> bool;

    async fn create(&self, title: &str) -> Result<Book, StoreError>;
    async fn list_all(&self) -> Result<Vec<Book>, StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Book, StoreError>;
    async fn append_comment(&self, id: &str, comment: &str) -> Result<Book, StoreError>;
    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError>;
    async fn delete_all(&self) -> Result<(), StoreError>;
}
