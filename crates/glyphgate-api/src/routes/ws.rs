//! WebSocket endpoint: one connection, one engine, one session.

use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::{Router, routing::get};
use glyphgate_session::application::coordinator::{ClientLink, Session};
use tracing::{error, info, warn};

use crate::state::AppState;

/// GET /ws
async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

/// Starts a session for the socket and shuttles frames both ways until
/// either the client or the engine goes away.
async fn serve_socket(mut socket: WebSocket, state: AppState) {
    let launched = Session::launch(
        (*state.session_config).clone(),
        state.launcher.as_ref(),
        state.clock.clone(),
    )
    .await;
    let (session, link) = match launched {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, "engine failed to start; closing connection");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let ClientLink {
        id,
        frames,
        mut outbound,
    } = link;
    state.active_sessions.fetch_add(1, Ordering::Relaxed);
    let session_task = tokio::spawn(session.run());

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if frames.send(text.as_str().to_owned()).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(session_id = %id, error = %e, "websocket receive failed");
                    break;
                }
            },
            event = outbound.recv() => {
                let Some(event) = event else {
                    // The session ended on the engine side.
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => error!(session_id = %id, error = %e, "could not encode event"),
                }
            },
        }
    }

    drop(frames);
    match session_task.await {
        Ok(end) => info!(session_id = %id, ?end, "connection closed"),
        Err(e) => error!(session_id = %id, error = %e, "session task failed"),
    }
    state.active_sessions.fetch_sub(1, Ordering::Relaxed);
}

/// Returns the WebSocket router.
pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}
