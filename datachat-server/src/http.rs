// datachat-server/src/http.rs

//! HTTP surface for the chat pipeline and session storage.

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use datachat_core::{
    ChatMessage, ChatPipeline, ChatStore, RestBackend, RuntimeConfig, TurnError, TurnOutcome,
};

const SIGNED_URL_TTL_SECS: u64 = 3600;

pub struct AppState {
    pipeline: ChatPipeline,
    store: Option<Mutex<ChatStore<RestBackend>>>,
}

impl AppState {
    pub fn new(config: RuntimeConfig) -> Self {
        let store = config.storage.as_ref().map(|storage| {
            let backend = RestBackend::new(reqwest::Client::new(), storage);
            Mutex::new(ChatStore::new(backend))
        });
        AppState {
            pipeline: ChatPipeline::new(config),
            store,
        }
    }
}

#[derive(Deserialize)]
struct IncomingMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<IncomingMessage>,
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
}

/// Reply for one chat turn. `content` carries the JSON-encoded
/// response envelope when tools produced data, and is absent for a
/// plain text reply.
#[derive(Serialize)]
struct ChatReply {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorReply {
    error: String,
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    title: String,
}

#[derive(Deserialize)]
struct RenameSessionRequest {
    title: String,
}

#[derive(Deserialize)]
struct UpdateTimeRequest {
    #[serde(rename = "response_time")]
    response_time: Option<f64>,
}

#[derive(Serialize)]
struct SuccessReply {
    success: bool,
}

#[derive(Serialize)]
struct SignedUrlReply {
    url: String,
}

#[derive(Serialize)]
struct HealthReply {
    status: &'static str,
    version: &'static str,
}

fn error_reply(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorReply {
            error: message.into(),
        }),
    )
        .into_response()
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/sessions/:session_id",
            axum::routing::delete(delete_session).patch(rename_session),
        )
        .route("/api/sessions/:session_id/messages", get(list_messages))
        .route(
            "/api/messages/:message_id/update-time",
            post(update_message_time),
        )
        .route("/api/attachments/:file_id/url", get(attachment_url))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Runs the server until the listener fails.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<HealthReply> {
    Json(HealthReply {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    let history: Vec<ChatMessage> = request
        .messages
        .iter()
        .map(|m| ChatMessage {
            role: m.role.clone(),
            content: Some(m.content.clone()),
            ..Default::default()
        })
        .collect();

    let started = Instant::now();
    let outcome = match state.pipeline.run_turn(&history).await {
        Ok(outcome) => outcome,
        Err(TurnError::EmptyHistory) => {
            return error_reply(StatusCode::BAD_REQUEST, "No messages provided");
        }
        Err(err) => {
            error!(error = %err, "Chat turn failed");
            return error_reply(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };
    let elapsed = started.elapsed().as_secs_f64();

    let (text, content) = match outcome {
        TurnOutcome::Direct(text) => (text, None),
        TurnOutcome::WithData(envelope) => {
            let text = envelope.text.clone();
            match serde_json::to_string(&envelope) {
                Ok(json) => (text, Some(json)),
                Err(err) => {
                    error!(error = %err, "Failed to serialize response envelope");
                    return error_reply(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to serialize response",
                    );
                }
            }
        }
    };

    // Persistence is best-effort here. A storage hiccup must not eat a
    // reply the model already produced.
    let mut message_id = None;
    if let (Some(session_id), Some(store)) = (request.session_id.as_deref(), state.store.as_ref()) {
        let stored = content.as_deref().unwrap_or(&text);
        let mut store = store.lock().await;
        match store.append_message(session_id, "assistant", stored).await {
            Ok(message) => {
                if let Err(err) = store
                    .update_message_response_time(&message.id, elapsed)
                    .await
                {
                    warn!(error = %err, message_id = %message.id, "Failed to record response time");
                }
                message_id = Some(message.id);
            }
            Err(err) => {
                warn!(error = %err, session_id, "Failed to persist assistant message");
            }
        }
    }

    (
        StatusCode::OK,
        Json(ChatReply {
            text,
            content,
            message_id,
        }),
    )
        .into_response()
}

async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(store) = state.store.as_ref() else {
        return error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Storage is not configured");
    };
    let mut store = store.lock().await;
    match store.refresh_sessions().await {
        Ok(()) => (StatusCode::OK, Json(store.sessions().to_vec())).into_response(),
        Err(err) => {
            error!(error = %err, "Failed to list sessions");
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    let Some(store) = state.store.as_ref() else {
        return error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Storage is not configured");
    };
    let mut store = store.lock().await;
    match store.create_session(&request.title).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(err) => {
            error!(error = %err, "Failed to create session");
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(store) = state.store.as_ref() else {
        return error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Storage is not configured");
    };
    let mut store = store.lock().await;
    match store.delete_session(&session_id).await {
        Ok(()) => (StatusCode::OK, Json(SuccessReply { success: true })).into_response(),
        Err(err) => {
            error!(error = %err, session_id, "Failed to delete session");
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn rename_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<RenameSessionRequest>,
) -> impl IntoResponse {
    let Some(store) = state.store.as_ref() else {
        return error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Storage is not configured");
    };
    let mut store = store.lock().await;
    match store.rename_session(&session_id, &request.title).await {
        Ok(()) => (StatusCode::OK, Json(SuccessReply { success: true })).into_response(),
        Err(err) => {
            error!(error = %err, session_id, "Failed to rename session");
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(store) = state.store.as_ref() else {
        return error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Storage is not configured");
    };
    let mut store = store.lock().await;
    match store.load_messages(&session_id).await {
        Ok(()) => (StatusCode::OK, Json(store.messages(&session_id).to_vec())).into_response(),
        Err(err) => {
            error!(error = %err, session_id, "Failed to load messages");
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn update_message_time(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<String>,
    Json(request): Json<UpdateTimeRequest>,
) -> impl IntoResponse {
    let Some(response_time) = request.response_time else {
        return error_reply(StatusCode::BAD_REQUEST, "response_time is required");
    };
    let Some(store) = state.store.as_ref() else {
        return error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Storage is not configured");
    };
    let mut store = store.lock().await;
    match store
        .update_message_response_time(&message_id, response_time)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(SuccessReply { success: true })).into_response(),
        Err(err) => {
            error!(error = %err, message_id, "Failed to update response time");
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn attachment_url(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> impl IntoResponse {
    let Some(store) = state.store.as_ref() else {
        return error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Storage is not configured");
    };
    let store = store.lock().await;
    match store
        .signed_attachment_url(&file_id, SIGNED_URL_TTL_SECS)
        .await
    {
        Ok(url) => (StatusCode::OK, Json(SignedUrlReply { url })).into_response(),
        Err(err) => {
            error!(error = %err, file_id, "Failed to sign attachment URL");
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
