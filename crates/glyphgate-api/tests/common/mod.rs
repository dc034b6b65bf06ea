//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use glyphgate_core::clock::Clock;
use glyphgate_core::error::SessionError;
use glyphgate_core::value::EngineValue;
use glyphgate_session::application::coordinator::EngineHandle;
use glyphgate_session::application::engine::{EngineContext, EngineLauncher, GlyphAppearance};
use glyphgate_session::config::SessionConfig;
use glyphgate_test_support::FixedClock;
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use glyphgate_api::state::AppState;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Engine context that draws every glyph as a floor dot.
pub struct FloorGlyphs;

impl EngineContext for FloorGlyphs {
    fn map_glyph(&self, _glyph: i64, _x: i32, _y: i32) -> GlyphAppearance {
        GlyphAppearance { ch: '.', color: 7 }
    }
}

/// Launcher that accepts every session and never issues a callback.
pub struct IdleLauncher;

#[async_trait]
impl EngineLauncher for IdleLauncher {
    async fn launch(&self, handle: EngineHandle) -> Result<Box<dyn EngineContext>, SessionError> {
        drop(handle);
        Ok(Box::new(FloorGlyphs))
    }
}

/// Launcher whose engine asks one yes/no question, reports the answer it
/// got, and prints it back to the client if the session is still alive.
pub struct QuestionLauncher {
    answers: mpsc::UnboundedSender<Option<EngineValue>>,
}

impl QuestionLauncher {
    /// Creates the launcher and the receiver the engine reports answers on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Option<EngineValue>>) {
        let (answers, rx) = mpsc::unbounded_channel();
        (Self { answers }, rx)
    }
}

#[async_trait]
impl EngineLauncher for QuestionLauncher {
    async fn launch(&self, handle: EngineHandle) -> Result<Box<dyn EngineContext>, SessionError> {
        let answers = self.answers.clone();
        tokio::spawn(async move {
            let args = vec![
                EngineValue::from("Continue?"),
                EngineValue::from("yn"),
                EngineValue::from("n"),
            ];
            let answer = handle.call("yn_function", args).await.ok();
            let _ = answers.send(answer.clone());
            if let Some(EngineValue::Int(code)) = answer {
                let text = EngineValue::from(format!("answer {code}"));
                let _ = handle.call("raw_print", vec![text]).await;
            }
        });
        Ok(Box::new(FloorGlyphs))
    }
}

/// Build the full app router with an idle engine and a fixed clock. Uses the
/// same route structure as `main.rs`.
pub fn build_test_app() -> Router {
    let app_state = AppState::new(SessionConfig::default(), fixed_clock(), Arc::new(IdleLauncher));
    glyphgate_api::build_router(app_state)
}

/// Serves the full app on an ephemeral local port and returns its address.
pub async fn serve(app_state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = glyphgate_api::build_router(app_state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// App state wired to `launcher`, with default session settings.
pub fn state_with(launcher: Arc<dyn EngineLauncher>) -> AppState {
    AppState::new(SessionConfig::default(), fixed_clock(), launcher)
}

/// Waits until the server reports `expected` running sessions.
pub async fn wait_for_sessions(state: &AppState, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.active_sessions.load(Ordering::Relaxed) != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("active sessions never reached {expected}"));
}

/// Send a GET request and return the response status and JSON body.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return only the status.
pub async fn get_status(app: Router, uri: &str) -> StatusCode {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    app.oneshot(request).await.unwrap().status()
}
