//! HTTP Server for personal-library
//!
//! HTTP (axum) <-> application::LibraryService <-> BackendSelector
//!
//! エラーは原則HTTP 200 + プレーンテキストで返す（既存クライアントとの互換のため）。

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{FromRequest, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::application::dto::{BookDetail, BookSummary, CreatedBook};
use crate::application::error::AppError;
use crate::application::selector::BackendSelector;
use crate::application::service::LibraryService;
use crate::config::{AppConfig, StaticAssets};
use crate::domain::error::DomainError;
use crate::infra::memory_store::MemoryBookStore;

// =============================================================================
// Public entry point
// =============================================================================

/// バックエンドを決定してHTTPサーバを起動する。
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let selector = BackendSelector::new(Arc::new(MemoryBookStore::new()));
    let backend = selector.resolve(&config.store).await;
    info!(?backend, "storage backend resolved");

    let state = AppState::new(LibraryService::new(Arc::new(selector)));
    let app = build_router(state, &config.assets);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

#[derive(Clone)]
pub struct AppState {
    library: LibraryService,
}

impl AppState {
    pub fn new(library: LibraryService) -> Self {
        Self { library }
    }
}

pub fn build_router(state: AppState, assets: &StaticAssets) -> Router {
    Router::new()
        .route(
            "/api/books",
            get(list_books).post(create_book).delete(delete_all_books),
        )
        .route(
            "/api/books/{id}",
            get(get_book).post(comment_book).delete(delete_book),
        )
        .route_service("/", ServeFile::new(&assets.index_page))
        .nest_service("/public", ServeDir::new(&assets.public_dir))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

// =============================================================================
// Request bodies
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct TitleBody {
    #[serde(default, deserialize_with = "scalar_text")]
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CommentBody {
    #[serde(default, deserialize_with = "scalar_text")]
    comment: Option<String>,
}

/// 文字列はそのまま、真となる数値・真偽値は文字列化して受け付ける。
/// `0`・`false`・`null`・配列・オブジェクトは欠落扱い。
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Some(Value::Bool(true)) => Some("true".to_string()),
        _ => None,
    })
}

/// JSONまたはフォームのボディ。欠落・不正なボディは空として扱う。
struct Payload<T>(T);

impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned + Default + Send,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let body = if content_type.starts_with("application/json") {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(v)| v)
                .unwrap_or_default()
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(v)| v)
                .unwrap_or_default()
        } else {
            T::default()
        };
        Ok(Self(body))
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn list_books(State(state): State<AppState>) -> Result<Json<Vec<BookSummary>>, AppError> {
    Ok(Json(state.library.list_books().await?))
}

async fn create_book(
    State(state): State<AppState>,
    Payload(body): Payload<TitleBody>,
) -> Result<Json<CreatedBook>, AppError> {
    let created = state.library.create_book(body.title.as_deref()).await?;
    Ok(Json(created))
}

async fn delete_all_books(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state.library.delete_all().await?;
    Ok("complete delete successful")
}

async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookDetail>, AppError> {
    let book = state.library.get_book(&id).await.map_err(as_missing)?;
    Ok(Json(book))
}

async fn comment_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Payload(body): Payload<CommentBody>,
) -> Result<Json<BookDetail>, AppError> {
    let book = state
        .library
        .add_comment(&id, body.comment.as_deref())
        .await
        .map_err(as_missing)?;
    Ok(Json(book))
}

async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<&'static str, AppError> {
    state.library.delete_book(&id).await.map_err(as_missing)?;
    Ok("delete successful")
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

// =============================================================================
// Error mapping
// =============================================================================

/// `:id` 系ルートではストレージ障害も「no book exists」として返す。
fn as_missing(e: AppError) -> AppError {
    match e {
        AppError::Storage(source) => {
            error!(error = %source, "book operation failed");
            AppError::NoBook
        }
        other => other,
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Storage(source) => {
                error!(error = %source, "storage failure");
                let body = Json(ErrorBody {
                    error: source.to_string(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
            AppError::Domain(DomainError::EmptyTitle) => {
                AppError::MissingField("title").to_string().into_response()
            }
            AppError::Domain(DomainError::EmptyComment) => {
                AppError::MissingField("comment").to_string().into_response()
            }
            other @ (AppError::MissingField(_) | AppError::NoBook) => {
                other.to_string().into_response()
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install ctrl+c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install sigterm handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
