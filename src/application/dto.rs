use serde::Serialize;

use crate::domain::model::book::Book;
use crate::domain::model::id::BookId;

/// GET /api/books の1要素。`commentcount` はここで算出する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookSummary {
    #[serde(rename = "_id")]
    pub id: BookId,
    pub title: String,
    pub commentcount: usize,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id(),
            title: book.title().to_string(),
            commentcount: book.comment_count(),
        }
    }
}

/// POST /api/books の応答。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedBook {
    #[serde(rename = "_id")]
    pub id: BookId,
    pub title: String,
}

impl From<Book> for CreatedBook {
    fn from(book: Book) -> Self {
        Self {
            id: book.id(),
            title: book.title().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookDetail {
    #[serde(rename = "_id")]
    pub id: BookId,
    pub title: String,
    pub comments: Vec<String>,
}

impl From<Book> for BookDetail {
    fn from(book: Book) -> Self {
        Self {
            id: book.id(),
            title: book.title().to_string(),
            comments: book.comments().to_vec(),
        }
    }
}
