use std::sync::Arc;

use crate::domain::repository::BookStore;

use super::dto::{BookDetail, BookSummary, CreatedBook};
use super::error::AppError;

/// ライブラリAPIのユースケース。
/// 入力検証 → ストア操作1回 → 応答DTO のパターンで操作する。状態は持たない。
#[derive(Clone)]
pub struct LibraryService {
    store: Arc<dyn BookStore>,
}

impl LibraryService {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }

    /// Bookを作成する。タイトル未指定・空文字は必須項目エラー。
    pub async fn create_book(&self, title: Option<&str>) -> Result<CreatedBook, AppError> {
        let title = require("title", title)?;
        let book = self.store.create(title).await?;
        Ok(CreatedBook::from(book))
    }

    pub async fn list_books(&self) -> Result<Vec<BookSummary>, AppError> {
        let books = self.store.list_all().await?;
        Ok(books.iter().map(BookSummary::from).collect())
    }

    pub async fn get_book(&self, id: &str) -> Result<BookDetail, AppError> {
        self.check_id(id)?;
        let book = self.store.find_by_id(id).await?;
        Ok(BookDetail::from(book))
    }

    /// コメントを追加する。コメントの有無をIDより先に検証する。
    pub async fn add_comment(
        &self,
        id: &str,
        comment: Option<&str>,
    ) -> Result<BookDetail, AppError> {
        let comment = require("comment", comment)?;
        self.check_id(id)?;
        let book = self.store.append_comment(id, comment).await?;
        Ok(BookDetail::from(book))
    }

    pub async fn delete_book(&self, id: &str) -> Result<(), AppError> {
        self.check_id(id)?;
        self.store.delete_by_id(id).await?;
        Ok(())
    }

    /// 全件削除。繰り返し呼んでもエラーにならない。
    pub async fn delete_all(&self) -> Result<(), AppError> {
        self.store.delete_all().await?;
        Ok(())
    }

    // --- private ---

    fn check_id(&self, id: &str) -> Result<(), AppError> {
        if self.store.is_valid_id(id) {
            Ok(())
        } else {
            Err(AppError::NoBook)
        }
    }
}

fn require<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str, AppError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(AppError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory_store::MemoryBookStore;

    fn service() -> LibraryService {
        LibraryService::new(Arc::new(MemoryBookStore::new()))
    }

    #[tokio::test]
    async fn missing_or_empty_title_is_rejected() {
        let svc = service();
        for title in [None, Some("")] {
            let err = svc.create_book(title).await.unwrap_err();
            assert_eq!(err.to_string(), "missing required field title");
        }
        assert!(svc.list_books().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn comment_is_checked_before_id() {
        let svc = service();
        let err = svc.add_comment("999", None).await.unwrap_err();
        assert_eq!(err.to_string(), "missing required field comment");

        let err = svc.add_comment("999", Some("hello")).await.unwrap_err();
        assert!(matches!(err, AppError::NoBook));
    }

    #[tokio::test]
    async fn summaries_carry_comment_count() {
        let svc = service();
        let created = svc.create_book(Some("Dune")).await.unwrap();
        let id = created.id.to_string();
        svc.add_comment(&id, Some("a")).await.unwrap();
        svc.add_comment(&id, Some("b")).await.unwrap();

        let list = svc.list_books().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].commentcount, 2);
        assert_eq!(list[0].title, "Dune");
    }

    #[tokio::test]
    async fn deleted_book_is_gone() {
        let svc = service();
        let created = svc.create_book(Some("Emma")).await.unwrap();
        let id = created.id.to_string();

        svc.delete_book(&id).await.unwrap();
        assert!(matches!(svc.get_book(&id).await, Err(AppError::NoBook)));
        assert!(matches!(svc.delete_book(&id).await, Err(AppError::NoBook)));
    }
}
