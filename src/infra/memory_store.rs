use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::error::StoreError;
use crate::domain::model::book::Book;
use crate::domain::model::id::BookId;
use crate::domain::repository::{BackendKind, BookStore};

#[derive(Debug)]
struct MemoryState {
    books: Vec<Book>,
    next_id: u64,
}

/// プロセス内に閉じたBookStore実装。永続ストアが使えない場合のフォールバック。
///
/// 書き込みは単一のロックで直列化する。IDは削除後も再利用しない。
#[derive(Debug)]
pub struct MemoryBookStore {
    state: RwLock<MemoryState>,
}

impl Default for MemoryBookStore {
    fn default() -> Self {
        Self {
            state: RwLock::new(MemoryState {
                books: Vec::new(),
                next_id: 1,
            }),
        }
    }
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(books: &[Book], raw: &str) -> Result<usize, StoreError> {
        BookId::parse_sequence(raw)
            .and_then(|id| books.iter().position(|b| b.id() == id))
            .ok_or_else(|| StoreError::NotFound(raw.to_string()))
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    fn kind(&self) -> BackendKind {
        BackendKind::InMemory
    }

    fn is_valid_id(&self, _raw: &str) -> bool {
        true
    }

    async fn create(&self, title: &str) -> Result<Book, StoreError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let book = Book::new(BookId::Sequence(state.next_id), title)?;
        state.next_id += 1;
        state.books.push(book.clone());
        Ok(book)
    }

    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.books.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Book, StoreError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let idx = Self::position(&state.books, id)?;
        Ok(state.books[idx].clone())
    }

    async fn append_comment(&self, id: &str, comment: &str) -> Result<Book, StoreError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let idx = Self::position(&state.books, id)?;
        let book = &mut state.books[idx];
        book.append_comment(comment)?;
        Ok(book.clone())
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let idx = Self::position(&state.books, id)?;
        state.books.remove(idx);
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.books.clear();
        Ok(())
    }
}
