//! Typesetting collaborator boundary.
//!
//! The mathematical-notation-to-SVG engine is an external tool. The pipeline
//! only sees the [`Typesetter`] trait: source text in, SVG markup out, with
//! a rejected equation surfacing as [`ServerError::Typeset`] so it can be
//! cached as a negative result. Any other failure (spawn, IO) is a system
//! error and is never cached.

use std::env;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::errors::{Result, ServerError};

/// Environment variable overriding the typesetting command.
pub const TYPESET_COMMAND_ENV: &str = "MDMATH_TEX2SVG";
const DEFAULT_TYPESET_COMMAND: &str = "tex2svg";

#[async_trait]
pub trait Typesetter: Send + Sync {
    /// Renders equation source to SVG markup.
    async fn typeset(&self, source: &str) -> Result<String>;
}

/// Production typesetter: spawns the configured command with the equation on
/// stdin and reads SVG from stdout. A non-zero exit is a typesetting error
/// whose message is whatever the tool printed on stderr.
pub struct CommandTypesetter {
    command: String,
}

impl CommandTypesetter {
    /// Resolves the command from the environment and verifies it can be
    /// found. A missing binary is a fatal startup error.
    pub fn from_env() -> Result<Self> {
        let command =
            env::var(TYPESET_COMMAND_ENV).unwrap_or_else(|_| DEFAULT_TYPESET_COMMAND.to_string());
        locate_binary(&command)?;
        debug!(%command, "typesetting command resolved");
        Ok(Self { command })
    }
}

#[async_trait]
impl Typesetter for CommandTypesetter {
    async fn typeset(&self, source: &str) -> Result<String> {
        let mut child = Command::new(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| ServerError::collaborator(&self.command, err.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .await
                .map_err(|err| ServerError::collaborator(&self.command, err.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| ServerError::collaborator(&self.command, err.to_string()))?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|_| {
                ServerError::collaborator(&self.command, "produced invalid UTF-8 markup")
            })
        } else {
            let message = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if message.is_empty() {
                Err(ServerError::Typeset(format!(
                    "typesetting failed with {}",
                    output.status
                )))
            } else {
                Err(ServerError::Typeset(message))
            }
        }
    }
}

/// PATH-style lookup for a collaborator binary.
pub fn locate_binary(command: &str) -> Result<()> {
    let path = Path::new(command);
    if path.components().count() > 1 {
        if path.is_file() {
            return Ok(());
        }
        return Err(ServerError::Startup(format!(
            "collaborator binary not found: {command}"
        )));
    }

    let found = env::var_os("PATH")
        .map(|paths| {
            env::split_paths(&paths).any(|dir| dir.join(command).is_file())
        })
        .unwrap_or(false);

    if found {
        Ok(())
    } else {
        Err(ServerError::Startup(format!(
            "collaborator binary not found on PATH: {command}"
        )))
    }
}
