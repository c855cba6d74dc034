//! Shared test harness for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use personal_library::application::selector::BackendSelector;
use personal_library::application::service::LibraryService;
use personal_library::config::{StaticAssets, StoreConfig};
use personal_library::domain::error::StoreError;
use personal_library::domain::model::book::Book;
use personal_library::domain::repository::{BackendKind, BookStore};
use personal_library::infra::memory_store::MemoryBookStore;
use personal_library::interface::http::{build_router, AppState};

// =============================================================================
// UnavailableStore: 常に接続不能を返す永続ストアの代役
// =============================================================================

pub struct UnavailableStore;

impl UnavailableStore {
    fn down<T>() -> Result<T, StoreError> {
        Err(StoreError::BackendUnavailable("connection refused".into()))
    }
}

#[async_trait]
impl BookStore for UnavailableStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Persistent
    }

    fn is_valid_id(&self, _raw: &str) -> bool {
        true
    }

    async fn create(&self, _title: &str) -> Result<Book, StoreError> {
        Self::down()
    }

    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        Self::down()
    }

    async fn find_by_id(&self, _id: &str) -> Result<Book, StoreError> {
        Self::down()
    }

    async fn append_comment(&self, _id: &str, _comment: &str) -> Result<Book, StoreError> {
        Self::down()
    }

    async fn delete_by_id(&self, _id: &str) -> Result<(), StoreError> {
        Self::down()
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        Self::down()
    }
}

// =============================================================================
// App builders
// =============================================================================

pub fn store_config(location: Option<std::path::PathBuf>, test_mode: bool) -> StoreConfig {
    StoreConfig {
        location,
        test_mode,
        connect_timeout: Duration::from_secs(5),
        io_timeout: Duration::from_secs(5),
    }
}

/// 指定設定でSelectorを解決し、そのSelectorを使うRouterを返す。
pub async fn app_with(config: &StoreConfig) -> (Router, Arc<BackendSelector>) {
    let selector = Arc::new(BackendSelector::new(Arc::new(MemoryBookStore::new())));
    selector.resolve(config).await;
    let app = router_over(selector.clone());
    (app, selector)
}

/// テストモード（インメモリ固定）のRouter。
pub async fn memory_app() -> Router {
    app_with(&store_config(None, true)).await.0
}

pub fn router_over(store: Arc<dyn BookStore>) -> Router {
    let state = AppState::new(LibraryService::new(store));
    build_router(state, &StaticAssets::default())
}

// =============================================================================
// Request helpers
// =============================================================================

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should serve request");

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    (status, String::from_utf8(body.to_vec()).expect("utf-8 body"))
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn delete(app: &Router, uri: &str) -> (StatusCode, String) {
    send(
        app,
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, String) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn post_form(app: &Router, uri: &str, body: &str) -> (StatusCode, String) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("expected JSON, got {body:?}: {e}"))
}

/// 作成してIDを文字列で返す。
pub async fn create_book(app: &Router, title: &str) -> String {
    let (status, body) = post_json(app, "/api/books", serde_json::json!({ "title": title })).await;
    assert_eq!(status, StatusCode::OK);
    id_of(&json(&body))
}

/// `_id` は数値（インメモリ）か文字列（ドキュメントストア）。
pub fn id_of(value: &Value) -> String {
    match &value["_id"] {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => panic!("unexpected _id: {other:?}"),
    }
}
