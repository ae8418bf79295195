//! Route definitions for the Chatgate gateway.
//!
//! Provides the streaming chat endpoint, session clearing, and a health
//! check. Static UI assets are served by the router fallback.

use crate::prompt::{build_prompt, Mode};
use crate::relay::{InferenceRelay, RelayEvent};
use crate::session::{SessionStore, Turn};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chatgate_common::Error;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Cookie name carrying the session identifier.
const SESSION_COOKIE: &str = "sessionId";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub relay: Arc<InferenceRelay>,
}

/// Query parameters for the streaming chat endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub mode: String,
}

/// Acknowledgment for `POST /clear`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

/// Build the API router over the given state.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/chat-stream", get(chat_stream_handler))
        .route("/clear", post(clear_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Map a service error to a plain-text HTTP response.
fn error_response(err: Error) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, err.to_string()).into_response()
}

/// Pull the session identifier out of the Cookie header, if present.
///
/// A plain substring scan for `sessionId=` is deliberate: the browser UI
/// sets no other cookies and a full cookie parser buys nothing here.
fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    let start = cookies.find(&format!("{SESSION_COOKIE}="))? + SESSION_COOKIE.len() + 1;
    let rest = &cookies[start..];
    let end = rest.find(';').unwrap_or(rest.len());
    let value = rest[..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// `GET /chat-stream?message=&mode=`
///
/// Validates the message, resolves the session from the cookie, builds the
/// prompt from stored history, and streams relay tokens back as SSE events.
/// History is persisted only after the relay completes normally; a failed
/// relay leaves the session untouched.
async fn chat_stream_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ChatQuery>,
) -> Response {
    let message = params.message.trim().to_string();
    if message.is_empty() {
        return error_response(Error::InvalidInput("message must not be empty".into()));
    }

    let mode = Mode::parse(&params.mode);
    let (session_id, is_new) = state.store.resolve(session_id_from_headers(&headers));
    state.store.touch(&session_id);

    let history = state.store.history(&session_id);
    let prompt = build_prompt(mode, &history, &message);

    tracing::debug!(
        session_id = %session_id,
        mode = ?mode,
        history_turns = history.len(),
        "Opening chat stream"
    );

    // Built up front so a malformed identifier fails before any upstream work
    let set_cookie = if is_new {
        let cookie = format!("{SESSION_COOKIE}={session_id}; Path=/; SameSite=Lax");
        match HeaderValue::from_str(&cookie) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(error = %e, "Failed to build session cookie");
                return error_response(Error::Internal("failed to build session cookie".into()));
            }
        }
    } else {
        None
    };

    let mut relay_rx = state.relay.stream(prompt);
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(32);
    let store = state.store.clone();

    // Drive the relay independently of the response body so the assistant
    // turn still gets persisted when it completes.
    tokio::spawn(async move {
        while let Some(event) = relay_rx.recv().await {
            match event {
                RelayEvent::Token(token) => {
                    let payload = json!({ "token": token }).to_string();
                    if tx.send(Ok(Event::default().data(payload))).await.is_err() {
                        tracing::debug!(session_id = %session_id, "Client disconnected mid-stream");
                        return;
                    }
                }
                RelayEvent::Error(err) => {
                    tracing::warn!(session_id = %session_id, error = %err, "Relay failed");
                    let payload = json!({ "error": err.to_string() }).to_string();
                    let _ = tx
                        .send(Ok(Event::default().event("error").data(payload)))
                        .await;
                    return;
                }
                RelayEvent::Done { reply } => {
                    store.append(
                        &session_id,
                        vec![Turn::user(message.clone()), Turn::assistant(reply)],
                    );
                    let payload = json!({ "done": true }).to_string();
                    let _ = tx
                        .send(Ok(Event::default().event("done").data(payload)))
                        .await;
                    return;
                }
            }
        }
    });

    let sse = Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default());
    let mut response = sse.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    if let Some(value) = set_cookie {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }

    response
}

/// `POST /clear` - drop the caller's session history entirely.
async fn clear_handler(State(state): State<AppState>, headers: HeaderMap) -> Json<ClearResponse> {
    if let Some(session_id) = session_id_from_headers(&headers) {
        tracing::debug!(session_id = %session_id, "Clearing session");
        state.store.clear(&session_id);
    }
    Json(ClearResponse { cleared: true })
}

/// Health check handler.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        service: "chatgate-gateway".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_session_id_from_plain_cookie() {
        let headers = headers_with_cookie("sessionId=abc-123");
        assert_eq!(session_id_from_headers(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_session_id_among_other_cookies() {
        let headers = headers_with_cookie("theme=dark; sessionId=xyz; lang=en");
        assert_eq!(session_id_from_headers(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_session_id_missing() {
        let headers = headers_with_cookie("theme=dark");
        assert!(session_id_from_headers(&headers).is_none());

        let empty = HeaderMap::new();
        assert!(session_id_from_headers(&empty).is_none());
    }

    #[test]
    fn test_session_id_empty_value() {
        let headers = headers_with_cookie("sessionId=; theme=dark");
        assert!(session_id_from_headers(&headers).is_none());
    }
}
