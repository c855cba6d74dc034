use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::domain::error::StoreError;
use crate::domain::model::book::Book;
use crate::domain::model::id::BookId;
use crate::domain::repository::{BackendKind, BookStore};

const COLLECTION_FILE: &str = "books.json";

#[derive(Debug, thiserror::Error)]
pub enum JsonStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("write timed out after {0:?}")]
    Timeout(Duration),
}

impl From<JsonStoreError> for StoreError {
    fn from(e: JsonStoreError) -> Self {
        StoreError::BackendUnavailable(e.to_string())
    }
}

/// ディスク上のコレクション文書。
#[derive(Debug, Default, Serialize, Deserialize)]
struct Collection {
    #[serde(default)]
    books: Vec<Book>,
}

/// コレクションの書き込み処理。ブロッキングスレッド上で呼ばれる。
type WriteFn = dyn Fn(&Path, &str) -> Result<(), JsonStoreError> + Send + Sync;

type PendingWrite = JoinHandle<Result<(), JsonStoreError>>;

/// メモリ上のコレクション写し。
struct Cache {
    books: Vec<Book>,
    /// タイムアウトで手放した書き込み。ディスクに反映されたかは不明。
    pending: Option<PendingWrite>,
}

/// JSONドキュメントストアによるBookStore実装。
/// ディレクトリ1つ = 1コレクション（`books.json`）。
///
/// 変更はすべて load → mutate → save。書き込みが成功してからメモリ上の状態を差し替える。
/// 書き込みがタイムアウトした場合、次の操作はその書き込みの完了を待ち、
/// ディスクから読み直してから進む。ディスクとメモリの内容は食い違わない。
pub struct DocumentBookStore {
    path: PathBuf,
    cache: Mutex<Cache>,
    io_timeout: Duration,
    write: Arc<WriteFn>,
}

impl DocumentBookStore {
    /// ストアを開く（接続相当）。ディレクトリが無ければ作成し、コレクションを読み込む。
    pub async fn open(dir: impl Into<PathBuf>, io_timeout: Duration) -> Result<Self, StoreError> {
        let path = dir.into().join(COLLECTION_FILE);
        let load_path = path.clone();
        let books = tokio::task::spawn_blocking(move || load_collection(&load_path))
            .await
            .map_err(JsonStoreError::from)??;

        tracing::debug!(path = %path.display(), books = books.len(), "document store opened");
        Ok(Self {
            path,
            cache: Mutex::new(Cache {
                books,
                pending: None,
            }),
            io_timeout,
            write: Arc::new(save_collection),
        })
    }

    #[cfg(test)]
    fn with_writer(mut self, write: Arc<WriteFn>) -> Self {
        self.write = write;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_id(raw: &str) -> Result<BookId, StoreError> {
        BookId::parse_document(raw).ok_or_else(|| StoreError::InvalidId(raw.to_string()))
    }

    fn position(books: &[Book], raw: &str) -> Result<usize, StoreError> {
        let id = Self::parse_id(raw)?;
        books
            .iter()
            .position(|b| b.id() == id)
            .ok_or_else(|| StoreError::NotFound(raw.to_string()))
    }

    /// ロックを取り、未確定の書き込みがあれば片付けてから返す。
    async fn lock(&self) -> Result<MutexGuard<'_, Cache>, StoreError> {
        let mut cache = self.cache.lock().await;
        self.settle(&mut cache).await?;
        Ok(cache)
    }

    /// タイムアウトした書き込みの完了を待ち、ディスクの内容でキャッシュを置き換える。
    async fn settle(&self, cache: &mut Cache) -> Result<(), JsonStoreError> {
        let Some(mut write) = cache.pending.take() else {
            return Ok(());
        };
        match tokio::time::timeout(self.io_timeout, &mut write).await {
            Err(_) => {
                cache.pending = Some(write);
                return Err(JsonStoreError::Timeout(self.io_timeout));
            }
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "timed-out write failed"),
            Ok(Err(e)) => tracing::warn!(error = %e, "timed-out write panicked"),
        }

        let path = self.path.clone();
        let books = tokio::task::spawn_blocking(move || load_collection(&path)).await??;
        tracing::debug!(books = books.len(), "collection reloaded after timed-out write");
        cache.books = books;
        Ok(())
    }

    async fn persist(&self, cache: &mut Cache, books: &[Book]) -> Result<(), JsonStoreError> {
        let content = serde_json::to_string_pretty(&CollectionRef { books })?;
        let path = self.path.clone();
        let save = Arc::clone(&self.write);
        let mut write = tokio::task::spawn_blocking(move || save(&path, &content));
        match tokio::time::timeout(self.io_timeout, &mut write).await {
            Ok(joined) => joined?,
            Err(_) => {
                // 中断できないので、次の操作で結果を確認する
                cache.pending = Some(write);
                Err(JsonStoreError::Timeout(self.io_timeout))
            }
        }
    }
}

#[derive(Serialize)]
struct CollectionRef<'a> {
    books: &'a [Book],
}

fn load_collection(path: &Path) -> Result<Vec<Book>, JsonStoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        save_collection(path, &serde_json::to_string_pretty(&Collection::default())?)?;
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    let collection: Collection = serde_json::from_str(&content)?;
    Ok(collection.books)
}

fn save_collection(path: &Path, content: &str) -> Result<(), JsonStoreError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl BookStore for DocumentBookStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Persistent
    }

    fn is_valid_id(&self, raw: &str) -> bool {
        BookId::parse_document(raw).is_some()
    }

    async fn create(&self, title: &str) -> Result<Book, StoreError> {
        let book = Book::new(BookId::new_document(), title)?;
        let mut cache = self.lock().await?;
        let mut next = cache.books.clone();
        next.push(book.clone());
        self.persist(&mut cache, &next).await?;
        cache.books = next;
        Ok(book)
    }

    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        Ok(self.lock().await?.books.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Book, StoreError> {
        let cache = self.lock().await?;
        let idx = Self::position(&cache.books, id)?;
        Ok(cache.books[idx].clone())
    }

    async fn append_comment(&self, id: &str, comment: &str) -> Result<Book, StoreError> {
        let mut cache = self.lock().await?;
        let idx = Self::position(&cache.books, id)?;
        let mut next = cache.books.clone();
        next[idx].append_comment(comment)?;
        let updated = next[idx].clone();
        self.persist(&mut cache, &next).await?;
        cache.books = next;
        Ok(updated)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        let mut cache = self.lock().await?;
        let idx = Self::position(&cache.books, id)?;
        let mut next = cache.books.clone();
        next.remove(idx);
        self.persist(&mut cache, &next).await?;
        cache.books = next;
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        let mut cache = self.lock().await?;
        self.persist(&mut cache, &[]).await?;
        cache.books.clear();
        Ok(())
    }
}
