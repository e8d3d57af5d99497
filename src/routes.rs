//! REST endpoints for driving conversations over HTTP.
//!
//! Each handler runs the turn, lets the session settle (read pauses and
//! sequences included), then returns the transcript events rendered since
//! the previous request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::error::FlowError;
use crate::flow::{ConversationSession, SessionDeps};
use crate::lead::SessionId;
use crate::surface::Transcript;

/// A live HTTP conversation and when a request last touched it.
struct ChatEntry {
    session: ConversationSession<Transcript>,
    last_active: Instant,
}

type SharedSession = Arc<Mutex<ChatEntry>>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct ChatState {
    deps: SessionDeps,
    sessions: Arc<RwLock<HashMap<String, SharedSession>>>,
}

impl ChatState {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            deps,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn insert(&self, session: ConversationSession<Transcript>) {
        let id = session.session_id().to_string();
        let entry = ChatEntry {
            session,
            last_active: Instant::now(),
        };
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(entry)));
    }

    /// Lock the conversation currently known as `id`.
    ///
    /// Returns `None` when the id is unknown or was retired by a reset that
    /// finished while this request waited for the lock.
    async fn open(&self, id: &str) -> Option<(SharedSession, OwnedMutexGuard<ChatEntry>)> {
        let shared = self.sessions.read().await.get(id).cloned()?;
        let mut entry = Arc::clone(&shared).lock_owned().await;
        if entry.session.session_id().as_str() != id {
            return None;
        }
        entry.last_active = Instant::now();
        Some((shared, entry))
    }

    /// Drop conversations idle past `session_idle_ttl`, and ended ones idle
    /// past `ended_session_ttl`. Conversations busy with a request are
    /// skipped. Returns how many were dropped.
    pub async fn evict_idle(&self) -> usize {
        let idle_ttl = self.deps.config.session_idle_ttl;
        let ended_ttl = self.deps.config.ended_session_ttl;
        let now = Instant::now();

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, shared| {
            let Ok(entry) = shared.try_lock() else {
                return true;
            };
            let idle = now.duration_since(entry.last_active);
            let expired = idle >= idle_ttl || (entry.session.is_ended() && idle >= ended_ttl);
            if expired {
                debug!(session_id = %id, idle_secs = idle.as_secs(), "Evicting conversation");
            }
            !expired
        });
        before - sessions.len()
    }
}

/// Spawn the background loop that evicts stale conversations every `every`.
pub fn spawn_session_sweeper(state: ChatState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Session sweeper started (interval: {}s)", every.as_secs());
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            let evicted = state.evict_idle().await;
            if evicted > 0 {
                info!(evicted, "Evicted idle conversations");
            }
        }
    })
}

#[derive(Debug, Deserialize)]
pub struct ChooseRequest {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

/// Build the chat REST routes.
pub fn chat_routes(state: ChatState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(create_chat))
        .route("/api/chat/{id}", get(get_chat))
        .route("/api/chat/{id}/choose", post(choose))
        .route("/api/chat/{id}/message", post(message))
        .route("/api/chat/{id}/reset", post(reset))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "helios-leadbot"
    }))
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Conversation not found"})),
    )
        .into_response()
}

fn internal_error(e: &FlowError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": e.to_string()})),
    )
        .into_response()
}

/// POST /api/chat
///
/// Starts a new conversation and returns its id plus the opening events.
async fn create_chat(State(state): State<ChatState>) -> Response {
    let session_id = SessionId::generate();
    let mut session =
        ConversationSession::new(state.deps.clone(), Transcript::new(), session_id.clone());

    let started = match session.start().await {
        Ok(()) => session.settle().await,
        Err(e) => Err(e),
    };
    if let Err(e) = started {
        warn!(error = %e, "Failed to start conversation");
        return internal_error(&e);
    }

    let events = session.surface_mut().drain_new();
    state.insert(session).await;
    info!(session_id = %session_id, "HTTP conversation created");

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "sessionId": session_id,
            "events": events,
        })),
    )
        .into_response()
}

/// GET /api/chat/{id}
async fn get_chat(State(state): State<ChatState>, Path(id): Path<String>) -> Response {
    let Some((_, entry)) = state.open(&id).await else {
        return not_found();
    };
    Json(entry.session.snapshot()).into_response()
}

/// POST /api/chat/{id}/choose
async fn choose(
    State(state): State<ChatState>,
    Path(id): Path<String>,
    Json(req): Json<ChooseRequest>,
) -> Response {
    let Some((_, mut entry)) = state.open(&id).await else {
        return not_found();
    };
    let result = entry.session.choose(&req.value).await;
    turn_response(&mut entry.session, result).await
}

/// POST /api/chat/{id}/message
async fn message(
    State(state): State<ChatState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Response {
    let Some((_, mut entry)) = state.open(&id).await else {
        return not_found();
    };
    let result = entry.session.submit_free_text(&req.text).await;
    turn_response(&mut entry.session, result).await
}

/// POST /api/chat/{id}/reset
///
/// The conversation gets a new id; the old one stops resolving.
async fn reset(State(state): State<ChatState>, Path(id): Path<String>) -> Response {
    let Some((shared, mut entry)) = state.open(&id).await else {
        return not_found();
    };
    let session = &mut entry.session;

    let result = match session.reset().await {
        Ok(()) => session.settle().await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!(session_id = %id, error = %e, "Reset failed");
        return internal_error(&e);
    }

    let new_id = session.session_id().to_string();
    {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&id);
        sessions.insert(new_id.clone(), Arc::clone(&shared));
    }

    Json(serde_json::json!({
        "sessionId": new_id,
        "events": session.surface_mut().drain_new(),
    }))
    .into_response()
}

/// Settle an accepted turn and report what was rendered. Rejected turns
/// still return their corrective notice.
async fn turn_response(
    session: &mut ConversationSession<Transcript>,
    result: Result<(), FlowError>,
) -> Response {
    let accepted = match result {
        Ok(()) => session.settle().await.map(|()| true),
        Err(FlowError::InvalidTurn { .. }) => Ok(false),
        Err(e) => Err(e),
    };
    match accepted {
        Ok(accepted) => Json(serde_json::json!({
            "accepted": accepted,
            "events": session.surface_mut().drain_new(),
        }))
        .into_response(),
        Err(e) => {
            warn!(session_id = %session.session_id(), error = %e, "Turn failed");
            internal_error(&e)
        }
    }
}
