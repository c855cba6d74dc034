//! Backend Selector
//!
//! 起動時に一度だけ永続ストアへの接続を試み、失敗したらインメモリへ降格する。
//! 降格は不可逆。以降に接続が成功しても戻さない（データの分断を避ける）。
//! 永続ストアが一度でも操作に成功した後は降格しない。以降の障害はそのまま返す。

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::StoreConfig;
use crate::domain::error::StoreError;
use crate::domain::model::book::Book;
use crate::domain::repository::{BackendKind, BookStore};
use crate::infra::json_store::DocumentBookStore;
use crate::infra::memory_store::MemoryBookStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    Unresolved,
    PersistentActive,
    InMemoryActive,
}

enum Active {
    Unresolved,
    Persistent(Arc<dyn BookStore>),
    InMemory,
}

/// 有効なバックエンドへ全操作を転送するハンドル。呼び出し側はどちらが応答したかを知らない。
pub struct BackendSelector {
    active: RwLock<Active>,
    fallback: Arc<MemoryBookStore>,
    /// 永続ストアが操作に成功済みか。立った後は降格しない。
    served: AtomicBool,
}

impl BackendSelector {
    pub fn new(fallback: Arc<MemoryBookStore>) -> Self {
        Self {
            active: RwLock::new(Active::Unresolved),
            fallback,
            served: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SelectorState {
        match &*self.active.read().unwrap_or_else(PoisonError::into_inner) {
            Active::Unresolved => SelectorState::Unresolved,
            Active::Persistent(_) => SelectorState::PersistentActive,
            Active::InMemory => SelectorState::InMemoryActive,
        }
    }

    /// 設定に従ってバックエンドを決定する。
    pub async fn resolve(&self, config: &StoreConfig) -> SelectorState {
        if config.test_mode {
            self.demote("test environment");
            return self.state();
        }
        let Some(location) = config.location.clone() else {
            self.demote("no persistent store configured");
            return self.state();
        };

        let io_timeout = config.io_timeout;
        self.resolve_with(config.connect_timeout, async move {
            let store = DocumentBookStore::open(location, io_timeout).await?;
            Ok::<_, StoreError>(Arc::new(store) as Arc<dyn BookStore>)
        })
        .await
    }

    /// 任意の接続処理を`connect_timeout`付きで実行し、結果に応じて状態を確定する。
    pub async fn resolve_with<F>(&self, connect_timeout: Duration, connect: F) -> SelectorState
    where
        F: Future<Output = Result<Arc<dyn BookStore>, StoreError>>,
    {
        match tokio::time::timeout(connect_timeout, connect).await {
            Ok(Ok(store)) => {
                self.promote(store);
            }
            Ok(Err(e)) => self.demote(&e.to_string()),
            Err(_) => self.demote(&format!(
                "connection attempt timed out after {connect_timeout:?}"
            )),
        }
        self.state()
    }

    /// Unresolvedからのみ永続ストアへ昇格する。降格済みなら拒否してfalse。
    pub fn promote(&self, store: Arc<dyn BookStore>) -> bool {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        match &*active {
            Active::Unresolved => {
                tracing::info!(backend = %store.kind(), "connected to persistent store");
                *active = Active::Persistent(store);
                true
            }
            Active::InMemory => {
                tracing::debug!("persistent store became available after demotion; staying in-memory");
                false
            }
            Active::Persistent(_) => false,
        }
    }

    /// インメモリへ降格する。ログは遷移時の一度だけ。
    pub fn demote(&self, reason: &str) {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(*active, Active::InMemory) {
            return;
        }
        tracing::warn!(%reason, "persistent store unavailable, using in-memory storage");
        *active = Active::InMemory;
    }

    fn current(&self) -> Arc<dyn BookStore> {
        {
            let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
            match &*active {
                Active::Persistent(store) => return Arc::clone(store),
                Active::InMemory => return self.fallback.clone(),
                Active::Unresolved => {}
            }
        }
        self.demote("operation requested before backend resolution");
        self.fallback.clone()
    }

    /// 有効なバックエンドで操作を実行する。
    ///
    /// 永続側のBackendUnavailableで降格・再実行するのは、永続ストアがまだ一度も
    /// 操作に成功していない間だけ。成功済みなら降格せずエラーをそのまま返す。
    async fn dispatch<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        F: Fn(Arc<dyn BookStore>) -> Fut + Send,
        Fut: Future<Output = Result<T, StoreError>> + Send,
        T: Send,
    {
        let store = self.current();
        if store.kind() != BackendKind::Persistent {
            return f(store).await;
        }
        match f(store).await {
            Err(StoreError::BackendUnavailable(reason)) if !self.served.load(Ordering::Acquire) => {
                tracing::debug!(op, %reason, "retrying on in-memory store");
                self.demote(&reason);
                let fallback: Arc<dyn BookStore> = self.fallback.clone();
                f(fallback).await
            }
            Err(StoreError::BackendUnavailable(reason)) => {
                tracing::error!(op, %reason, "persistent store operation failed");
                Err(StoreError::BackendUnavailable(reason))
            }
            result => {
                self.served.store(true, Ordering::Release);
                result
            }
        }
    }
}

#[async_trait]
impl BookStore for BackendSelector {
    fn kind(&self) -> BackendKind {
        match self.state() {
            SelectorState::PersistentActive => BackendKind::Persistent,
            SelectorState::Unresolved | SelectorState::InMemoryActive => BackendKind::InMemory,
        }
    }

    fn is_valid_id(&self, raw: &str) -> bool {
        self.current().is_valid_id(raw)
    }

    async fn create(&self, title: &str) -> Result<Book, StoreError> {
        self.dispatch("create", |s| async move { s.create(title).await })
            .await
    }

    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        self.dispatch("list_all", |s| async move { s.list_all().await })
            .await
    }

    async fn find_by_id(&self, id: &str) -> Result<Book, StoreError> {
        self.dispatch("find_by_id", |s| async move { s.find_by_id(id).await })
            .await
    }

    async fn append_comment(&self, id: &str, comment: &str) -> Result<Book, StoreError> {
        self.dispatch("append_comment", |s| async move {
            s.append_comment(id, comment).await
        })
        .await
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        self.dispatch("delete_by_id", |s| async move { s.delete_by_id(id).await })
            .await
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.dispatch("delete_all", |s| async move { s.delete_all().await })
            .await
    }
}
