//! Engine launcher backed by a child process.
//!
//! The child writes one JSON object per line on stdout, naming a callback
//! and its positional arguments:
//!
//! ```text
//! {"name":"yn_function","args":["Really quit?","yn","n"]}
//! ```
//!
//! and reads one JSON value per line on stdin: the callback's return value.
//! Calls are strictly sequential, so the child blocks on stdin exactly as
//! long as the session is suspended on client input.

use std::process::Stdio;

use async_trait::async_trait;
use glyphgate_core::error::SessionError;
use glyphgate_core::value::EngineValue;
use glyphgate_session::application::coordinator::EngineHandle;
use glyphgate_session::application::engine::{EngineContext, EngineLauncher, GlyphAppearance};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

/// One callback line from the engine process.
#[derive(Debug, Deserialize)]
struct CallbackLine {
    name: String,
    #[serde(default)]
    args: Vec<EngineValue>,
}

/// Glyph context for process engines. The process resolves appearance
/// itself and passes it with each `print_glyph`; a call without one is
/// drawn blank.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessGlyphs;

impl EngineContext for ProcessGlyphs {
    fn map_glyph(&self, glyph: i64, x: i32, y: i32) -> GlyphAppearance {
        debug!(glyph, x, y, "print_glyph without appearance; drawing blank");
        GlyphAppearance { ch: ' ', color: 0 }
    }
}

/// Starts one engine process per session.
#[derive(Debug, Clone)]
pub struct ProcessEngineLauncher {
    program: String,
    args: Vec<String>,
}

impl ProcessEngineLauncher {
    /// Create a launcher that runs `program` with `args`.
    #[must_use]
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait]
impl EngineLauncher for ProcessEngineLauncher {
    async fn launch(&self, handle: EngineHandle) -> Result<Box<dyn EngineContext>, SessionError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::EngineUnavailable(format!("{}: {e}", self.program)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::EngineUnavailable("engine stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::EngineUnavailable("engine stdout not captured".into()))?;

        info!(program = %self.program, pid = child.id(), "engine process started");
        tokio::spawn(pump(child, stdin, stdout, handle));
        Ok(Box::new(ProcessGlyphs))
    }
}

/// Relays callbacks from the process to the session and answers back until
/// either side goes away. Owns the child so it is killed when the relay
/// stops.
async fn pump(mut child: Child, mut stdin: ChildStdin, stdout: ChildStdout, handle: EngineHandle) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "engine stdout read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<CallbackLine>(&line) {
            Ok(callback) => match handle.call(callback.name, callback.args).await {
                Ok(value) => value,
                Err(SessionError::Disconnected) => break,
                Err(e) => {
                    warn!(error = %e, "callback failed");
                    EngineValue::ZERO
                }
            },
            Err(e) => {
                warn!(error = %e, "unparseable engine line; answering 0");
                EngineValue::ZERO
            }
        };

        let mut encoded = match serde_json::to_string(&reply) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(error = %e, "could not encode reply; answering 0");
                "0".to_owned()
            }
        };
        encoded.push('\n');
        if let Err(e) = stdin.write_all(encoded.as_bytes()).await {
            warn!(error = %e, "engine stdin closed");
            break;
        }
        if let Err(e) = stdin.flush().await {
            warn!(error = %e, "engine stdin flush failed");
            break;
        }
    }

    drop(stdin);
    match child.try_wait() {
        Ok(Some(status)) => info!(%status, "engine process exited"),
        Ok(None) => info!("engine relay stopped; killing process"),
        Err(e) => warn!(error = %e, "engine process status unavailable"),
    }
}
