use serde::{Deserialize, Serialize};

use super::id::BookId;
use crate::domain::error::DomainError;

/// Book: 集約ルート。タイトルは作成後不変、コメントは追記のみ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    #[serde(rename = "_id")]
    id: BookId,
    title: String,
    /// 挿入順を保持する。欠落時は空配列として扱う。
    #[serde(default)]
    comments: Vec<String>,
}

impl Book {
    /// 空のコメント列でBookを作成する。空タイトルは拒否する。
    pub fn new(id: BookId, title: impl Into<String>) -> Result<Self, DomainError> {
        let title = title.into();
        if title.is_empty() {
            return Err(DomainError::EmptyTitle);
        }
        Ok(Self {
            id,
            title,
            comments: Vec::new(),
        })
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// 派生値。永続化しない。
    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    /// コメントを末尾に追加する。
    pub fn append_comment(&mut self, comment: impl Into<String>) -> Result<(), DomainError> {
        let comment = comment.into();
        if comment.is_empty() {
            return Err(DomainError::EmptyComment);
        }
        self.comments.push(comment);
        Ok(())
    }
}
