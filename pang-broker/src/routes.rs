//! Route definitions for the Pang broker.
//!
//! Every operation is reachable by its REST path and by its `/op/...` alias.
//! All JSON responses use status 200, errors included; preflight requests get
//! an empty 204.

use axum::{
    extract::{FromRef, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use pang_common::config::Config;
use pang_common::logging::generate_request_id;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::assembler::MessageAssembler;
use crate::catalog;
use crate::chat::ChatService;
use crate::error::{ApiError, ApiResult};
use crate::image::image_url;
use crate::provider::{ChatResponse, PollinationsProvider, Provider};
use crate::request::{ApiRequest, BodyLimit, Field};
use crate::session::{ChatHistories, Connection, ConnectionStore, ImportMode, Message};

/// Default label clients send when they want a merge import.
const DEFAULT_MERGE_LABEL: &str = "Merge/Update existing chats";

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: ConnectionStore,
    pub chats: ChatService,
    pub api_url: String,
    pub image_base_url: String,
    pub image_model: String,
    pub body_limit: usize,
}

impl AppState {
    /// State backed by the configured Pollinations backend.
    pub fn from_config(config: &Config) -> Self {
        let provider = Arc::new(PollinationsProvider::from_config(&config.backend));
        Self::with_provider(config, provider)
    }

    /// State with an explicit backend.
    pub fn with_provider(config: &Config, provider: Arc<dyn Provider>) -> Self {
        let timeout = Duration::from_secs(config.backend.timeout_secs);
        Self {
            store: ConnectionStore::new(
                config.backend.default_model.clone(),
                Duration::from_millis(config.sessions.ttl_ms),
            ),
            chats: ChatService::new(provider, MessageAssembler::new(timeout)),
            api_url: config.backend.api_url.clone(),
            image_base_url: config.backend.image_base_url.clone(),
            image_model: config.backend.image_model.clone(),
            body_limit: config.server.max_body_bytes,
        }
    }

    /// Resolve and touch the connection named by the request.
    async fn connection(&self, req: &ApiRequest) -> ApiResult<Arc<Connection>> {
        let id = req.connection_id()?;
        self.store
            .resolve(&id)
            .await
            .ok_or(ApiError::ConnectionInvalid)
    }
}

impl FromRef<AppState> for BodyLimit {
    fn from_ref(state: &AppState) -> Self {
        BodyLimit(state.body_limit)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Build the complete router with all routes and middleware.
pub fn build_routes(state: AppState) -> Router {
    Router::new()
        // Metadata
        .route("/health", get(health_handler))
        .route("/meta", get(meta_handler))
        .route("/prompt", get(prompt_handler))
        // Connection
        .route(
            "/createconnection",
            get(create_connection_handler).post(create_connection_handler),
        )
        .route("/keepalive", post(keepalive_handler))
        .route("/formatting", post(formatting_handler))
        .route("/model", get(get_model_handler).post(set_model_handler))
        // Generation
        .route("/text-no-context", post(text_no_context_handler))
        .route("/op/generate_text_nocontext", post(text_no_context_handler))
        .route("/chat/send", post(send_handler))
        .route("/op/send_text_to_chat", post(send_handler))
        .route("/chat/attach-image", post(attach_image_handler))
        .route("/op/attach_image", post(attach_image_handler))
        // Chat management
        .route("/chat/inform", post(inform_handler))
        .route("/op/inform_chat", post(inform_handler))
        .route("/chat/create", post(create_chat_handler))
        .route("/op/create_chatbot", post(create_chat_handler))
        .route("/chat/delete", post(delete_chat_handler))
        .route("/op/delete_chatbot", post(delete_chat_handler))
        .route("/chat/reset", post(reset_chat_handler))
        .route("/op/reset_chat", post(reset_chat_handler))
        .route("/chat/history", get(history_handler))
        .route("/op/get_chat_history", get(history_handler))
        .route("/chat/import-history", post(import_history_handler))
        .route("/op/import_history", post(import_history_handler))
        .route("/chat/import-chats", post(import_chats_handler))
        .route("/op/import_chats_merge", post(import_chats_handler))
        .route("/chats/all", get(all_chats_handler))
        .route("/op/all_chats", get(all_chats_handler))
        .route("/chats/active", get(active_chats_handler))
        .route("/op/active_chats", get(active_chats_handler))
        // Images
        .route("/image", get(image_handler))
        .route("/op/generate_image", get(image_handler))
        .fallback(not_found_handler)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(cors_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            tracing::info_span!(
                "request",
                request_id = %generate_request_id(),
                method = %req.method(),
                uri = %req.uri(),
            )
        }))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

/// Answers preflight, adds CORS headers, and turns a wrong method into not-found.
async fn cors_middleware(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors(response.headers_mut());
        return response;
    }

    let mut response = next.run(req).await;
    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        response = ApiError::NotFound.into_response();
    }
    apply_cors(response.headers_mut());
    response
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "Server error".to_string()
    };
    ApiError::Server(message).into_response()
}

async fn not_found_handler() -> ApiError {
    ApiError::NotFound
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    pub api_url: String,
    pub connections: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaResponse {
    pub models: Vec<String>,
    pub prompts: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResponse {
    pub connection_id: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepaliveResponse {
    pub ok: bool,
    pub connection_id: String,
    /// Milliseconds since the Unix epoch
    pub last_used: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattingResponse {
    pub ok: bool,
    pub formatting_enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelResponse {
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachImageResponse {
    pub ok: bool,
    pub next_image: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    const fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub history: Vec<Message>,
    pub history_json: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllChatsResponse {
    pub chats: ChatHistories,
    pub chats_json: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveChatsResponse {
    pub active: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptResponse {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageResponse {
    pub url: String,
}

fn to_json_string<T: Serialize>(value: &T) -> ApiResult<String> {
    serde_json::to_string(value).map_err(|e| ApiError::Server(e.to_string()))
}

/// Parse an import payload given either as JSON text or inline JSON.
fn parse_payload<T: serde::de::DeserializeOwned>(payload: Value) -> serde_json::Result<T> {
    match payload {
        Value::String(text) => serde_json::from_str(&text),
        other => serde_json::from_value(other),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        api_url: state.api_url.clone(),
        connections: state.store.len().await,
    })
}

async fn meta_handler() -> Json<MetaResponse> {
    Json(MetaResponse {
        models: catalog::MODELS.iter().map(|m| m.to_string()).collect(),
        prompts: catalog::prompt_titles()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

async fn prompt_handler(req: ApiRequest) -> Json<PromptResponse> {
    let title = req.string(Field::Type).unwrap_or_default();
    Json(PromptResponse {
        prompt: catalog::prompt(&title).to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn create_connection_handler(State(state): State<AppState>) -> Json<ConnectionResponse> {
    let connection = state.store.create().await;
    Json(ConnectionResponse {
        connection_id: connection.id().to_string(),
        model: connection.model().await,
    })
}

async fn keepalive_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<KeepaliveResponse>> {
    let connection = state.connection(&req).await?;
    Ok(Json(KeepaliveResponse {
        ok: true,
        connection_id: connection.id().to_string(),
        last_used: connection.last_used().await.timestamp_millis(),
    }))
}

async fn formatting_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<FormattingResponse>> {
    let connection = state.connection(&req).await?;
    let enabled = req.bool(Field::Enabled).unwrap_or(true);
    connection.set_formatting_enabled(enabled).await;
    Ok(Json(FormattingResponse {
        ok: true,
        formatting_enabled: enabled,
    }))
}

async fn get_model_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<ModelResponse>> {
    let connection = state.connection(&req).await?;
    Ok(Json(ModelResponse {
        model: connection.model().await,
    }))
}

async fn set_model_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<ModelResponse>> {
    let connection = state.connection(&req).await?;
    let model = match req.string(Field::Model) {
        Some(next) => connection.set_model(&next).await,
        None => connection.model().await,
    };
    Ok(Json(ModelResponse { model }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Generation Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn text_no_context_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<ChatResponse>> {
    let connection = state.connection(&req).await?;
    let prompt = req.string(Field::Prompt).unwrap_or_default();
    let response = state.chats.generate(&connection, &prompt).await?;
    Ok(Json(response))
}

async fn send_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<ChatResponse>> {
    let connection = state.connection(&req).await?;
    let prompt = req.string(Field::Prompt).unwrap_or_default();
    let chat_id = req.chat_id()?;
    let response = state.chats.send(&connection, &chat_id, &prompt).await?;
    Ok(Json(response))
}

async fn attach_image_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<AttachImageResponse>> {
    let connection = state.connection(&req).await?;
    let url = req.string(Field::Url).unwrap_or_default();
    let next_image = connection.attach_image(&url).await;
    Ok(Json(AttachImageResponse {
        ok: true,
        next_image,
    }))
}

async fn image_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<ImageResponse>> {
    state.connection(&req).await?;
    let prompt = req.string(Field::Prompt).unwrap_or_default();
    let url = image_url(&state.image_base_url, &prompt, &state.image_model)?;
    Ok(Json(ImageResponse { url }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat Management Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn inform_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<OkResponse>> {
    let connection = state.connection(&req).await?;
    let chat_id = req.chat_id()?;
    let text = req.string(Field::Inform).unwrap_or_default();
    state.chats.inform(&connection, &chat_id, &text).await;
    Ok(OkResponse::ok())
}

async fn create_chat_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<OkResponse>> {
    let connection = state.connection(&req).await?;
    let chat_id = req.chat_id()?;
    state.chats.ensure_chat(&connection, &chat_id).await;
    Ok(OkResponse::ok())
}

async fn delete_chat_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<OkResponse>> {
    let connection = state.connection(&req).await?;
    let chat_id = req.chat_id()?;
    state.chats.delete(&connection, &chat_id).await;
    Ok(OkResponse::ok())
}

async fn reset_chat_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<OkResponse>> {
    let connection = state.connection(&req).await?;
    let chat_id = req.chat_id()?;
    state.chats.reset(&connection, &chat_id).await;
    Ok(OkResponse::ok())
}

async fn history_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<HistoryResponse>> {
    let connection = state.connection(&req).await?;
    let chat_id = req.chat_id()?;
    let history = state.chats.history(&connection, &chat_id).await;
    let history_json = to_json_string(&history)?;
    Ok(Json(HistoryResponse {
        history,
        history_json,
    }))
}

async fn import_history_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<OkResponse>> {
    let connection = state.connection(&req).await?;
    let chat_id = req.chat_id()?;
    let payload = req
        .value(Field::Json)
        .unwrap_or_else(|| Value::String("[]".into()));

    let messages: Vec<Message> =
        parse_payload(payload).map_err(|_| ApiError::invalid_history())?;
    state
        .chats
        .import_history(&connection, &chat_id, messages)
        .await;
    Ok(OkResponse::ok())
}

async fn import_chats_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<OkResponse>> {
    let connection = state.connection(&req).await?;
    let payload = req
        .value(Field::Json)
        .unwrap_or_else(|| Value::String("{}".into()));
    let label = req
        .string(Field::Merge)
        .unwrap_or_else(|| DEFAULT_MERGE_LABEL.to_string());

    let chats: ChatHistories = parse_payload(payload).map_err(|_| ApiError::invalid_chats())?;
    state
        .chats
        .import_chats(&connection, chats, ImportMode::from_label(&label))
        .await;
    Ok(OkResponse::ok())
}

async fn all_chats_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<AllChatsResponse>> {
    let connection = state.connection(&req).await?;
    let chats = state.chats.all_chats(&connection).await;
    let chats_json = to_json_string(&chats)?;
    Ok(Json(AllChatsResponse { chats, chats_json }))
}

async fn active_chats_handler(
    State(state): State<AppState>,
    req: ApiRequest,
) -> ApiResult<Json<ActiveChatsResponse>> {
    let connection = state.connection(&req).await?;
    Ok(Json(ActiveChatsResponse {
        active: state.chats.active_ids(&connection).await,
    }))
}
