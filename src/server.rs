//! Dispatch loop and process lifecycle.
//!
//! Strictly sequential: one message is fully decoded and fully handled
//! (including any collaborator subprocess) before the next one is read, so
//! response order always equals request arrival order and the session state
//! needs no locking. Termination signals are observed between messages; the
//! loop exits, teardown removes every artifact, and the process exits with
//! `128 + signal` like a shell would report it.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::errors::{Result, ServerError};
use crate::protocol::{self, FrameReader, Request, ResponseWriter};
use crate::raster::{CommandRaster, RasterBackend};
use crate::render::{ArtifactLifecycle, RenderPipeline};
use crate::typeset::{CommandTypesetter, Typesetter};

/// Why the dispatch loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Stdin closed cleanly between messages
    StreamClosed,
    /// A termination signal arrived; carries the signal number
    Signal(i32),
}

/// Runs the server against stdin/stdout until the stream closes, a signal
/// arrives, or a fatal protocol error occurs. Teardown runs on every path.
pub async fn run() -> Result<ExitReason> {
    let typesetter = CommandTypesetter::from_env()?;
    let raster = CommandRaster::from_env()?;
    let artifacts = ArtifactLifecycle::create()?;
    info!(dir = %artifacts.dir().display(), "serving equation renders");

    let mut pipeline = RenderPipeline::new(typesetter, raster, artifacts);
    let mut shutdown = Shutdown::new()?;

    let reader = FrameReader::new(tokio::io::stdin());
    let writer = ResponseWriter::new(tokio::io::stdout());

    let result = dispatch(reader, writer, &mut pipeline, &mut shutdown).await;
    pipeline.cleanup();
    result
}

/// The dispatch loop proper, generic over the byte streams so tests can
/// drive it in memory.
pub async fn dispatch<I, O, T, R>(
    mut reader: FrameReader<I>,
    mut writer: ResponseWriter<O>,
    pipeline: &mut RenderPipeline<T, R>,
    shutdown: &mut Shutdown,
) -> Result<ExitReason>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    T: Typesetter,
    R: RasterBackend,
{
    let mut config = SessionConfig::default();

    loop {
        let request = tokio::select! {
            signal = shutdown.recv() => {
                info!(signal, "termination signal received");
                return Ok(ExitReason::Signal(signal));
            }
            decoded = protocol::decode(&mut reader) => match decoded? {
                Some(request) => request,
                None => {
                    info!("input stream closed");
                    return Ok(ExitReason::StreamClosed);
                }
            },
        };

        match request {
            Request::Render(render) => {
                debug!(identifier = %render.identifier, "render request");
                let response = pipeline.handle(&render, &config).await;
                writer.write(&response).await?;
            }
            Request::SetScale { kind, value, .. } => {
                debug!(?kind, value, "scale updated");
                config.set_scale(kind, value);
            }
            Request::SetColor { color, .. } => {
                debug!(%color, "session foreground updated");
                config.set_foreground(color);
            }
        }
    }
}

/// Unix termination signals folded into one future.
pub struct Shutdown {
    interrupt: Signal,
    terminate: Signal,
    hangup: Signal,
}

impl Shutdown {
    pub fn new() -> Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).map_err(startup_signal_error)?,
            terminate: signal(SignalKind::terminate()).map_err(startup_signal_error)?,
            hangup: signal(SignalKind::hangup()).map_err(startup_signal_error)?,
        })
    }

    /// Resolves with the raw signal number of whichever arrives first.
    pub async fn recv(&mut self) -> i32 {
        tokio::select! {
            _ = self.interrupt.recv() => SignalKind::interrupt().as_raw_value(),
            _ = self.terminate.recv() => SignalKind::terminate().as_raw_value(),
            _ = self.hangup.recv() => SignalKind::hangup().as_raw_value(),
        }
    }
}

fn startup_signal_error(err: std::io::Error) -> ServerError {
    ServerError::Startup(format!("cannot install signal handler: {err}"))
}
