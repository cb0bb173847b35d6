//! rollcall-engine: liveness sessions for many camera streams.
//!
//! All sessions live on one dedicated OS thread. Async callers talk to it
//! through a clone-safe [`EngineHandle`]; requests for the same stream are
//! therefore serialized, and a session's tracker never sees interleaved
//! frames.

use image::RgbImage;
use rollcall_core::{ConfigError, FaceBox, FaceLandmarks, LivenessConfig, LivenessSession, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

const REQUEST_QUEUE_DEPTH: usize = 16;

/// Identifies one camera stream registered with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub Uuid);

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown stream {0}")]
    UnknownStream(StreamId),
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Engine-wide settings beyond the liveness configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Streams with no request for this long are closed on the next request
    /// the engine handles. `None` keeps streams until `close_stream`.
    pub idle_timeout: Option<Duration>,
}

/// One registered stream and when it last saw a request.
struct Stream {
    session: LivenessSession,
    last_used: Instant,
}

/// Messages sent from async callers to the engine thread.
enum EngineRequest {
    Open {
        config: Option<LivenessConfig>,
        reply: oneshot::Sender<StreamId>,
    },
    Check {
        stream: StreamId,
        frame: RgbImage,
        landmarks: FaceLandmarks,
        face_box: FaceBox,
        reply: oneshot::Sender<Result<Verdict, EngineError>>,
    },
    Reset {
        stream: StreamId,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Close {
        stream: StreamId,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Register a stream using the engine's configuration.
    ///
    /// The stream's session stays in memory until [`EngineHandle::close_stream`]
    /// or, when [`EngineOptions::idle_timeout`] is set, until it goes idle.
    pub async fn open_stream(&self) -> Result<StreamId, EngineError> {
        self.request(|reply| EngineRequest::Open { config: None, reply })
            .await
    }

    /// Register a stream with its own configuration.
    pub async fn open_stream_with(&self, config: LivenessConfig) -> Result<StreamId, EngineError> {
        config.validate()?;
        self.request(|reply| EngineRequest::Open {
            config: Some(config),
            reply,
        })
        .await
    }

    /// Run one liveness check on the stream's session.
    pub async fn check(
        &self,
        stream: StreamId,
        frame: RgbImage,
        landmarks: FaceLandmarks,
        face_box: FaceBox,
    ) -> Result<Verdict, EngineError> {
        self.request(|reply| EngineRequest::Check {
            stream,
            frame,
            landmarks,
            face_box,
            reply,
        })
        .await?
    }

    /// Clear the stream's temporal state, e.g. between attendees.
    pub async fn reset(&self, stream: StreamId) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::Reset { stream, reply })
            .await?
    }

    pub async fn close_stream(&self, stream: StreamId) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::Close { stream, reply })
            .await?
    }
}

/// Spawn the engine on a dedicated OS thread with default options.
///
/// The configuration is validated up front and becomes the default for
/// streams opened without their own.
pub fn spawn_engine(config: LivenessConfig) -> Result<EngineHandle, EngineError> {
    spawn_engine_with(config, EngineOptions::default())
}

pub fn spawn_engine_with(
    config: LivenessConfig,
    options: EngineOptions,
) -> Result<EngineHandle, EngineError> {
    config.validate()?;
    tracing::info!(
        strict = config.strict_mode,
        overall_threshold = config.overall_threshold(),
        window = config.history_window_size,
        idle_timeout = ?options.idle_timeout,
        "liveness engine configured"
    );

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(REQUEST_QUEUE_DEPTH);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            let mut streams: HashMap<StreamId, Stream> = HashMap::new();
            while let Some(req) = rx.blocking_recv() {
                if let Some(idle) = options.idle_timeout {
                    evict_idle(&mut streams, idle);
                }
                handle_request(&config, &mut streams, req);
            }
            tracing::info!(open_streams = streams.len(), "engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

fn evict_idle(streams: &mut HashMap<StreamId, Stream>, idle: Duration) {
    let now = Instant::now();
    streams.retain(|id, stream| {
        let keep = now.duration_since(stream.last_used) < idle;
        if !keep {
            tracing::info!(stream = %id, "idle stream closed");
        }
        keep
    });
}

/// Session for `stream`, marked as used now.
fn touch(
    streams: &mut HashMap<StreamId, Stream>,
    stream: StreamId,
) -> Result<&mut LivenessSession, EngineError> {
    let entry = streams
        .get_mut(&stream)
        .ok_or(EngineError::UnknownStream(stream))?;
    entry.last_used = Instant::now();
    Ok(&mut entry.session)
}

fn handle_request(
    config: &LivenessConfig,
    streams: &mut HashMap<StreamId, Stream>,
    req: EngineRequest,
) {
    match req {
        EngineRequest::Open { config: own, reply } => {
            let id = StreamId(Uuid::new_v4());
            let session = LivenessSession::with_id(id.0, own.unwrap_or_else(|| config.clone()));
            streams.insert(
                id,
                Stream {
                    session,
                    last_used: Instant::now(),
                },
            );
            tracing::info!(stream = %id, open_streams = streams.len(), "stream opened");
            let _ = reply.send(id);
        }
        EngineRequest::Check {
            stream,
            frame,
            landmarks,
            face_box,
            reply,
        } => {
            let result = touch(streams, stream)
                .map(|session| session.check(&frame, &landmarks, &face_box));
            let _ = reply.send(result);
        }
        EngineRequest::Reset { stream, reply } => {
            let result = touch(streams, stream).map(LivenessSession::reset);
            let _ = reply.send(result);
        }
        EngineRequest::Close { stream, reply } => {
            let result = streams
                .remove(&stream)
                .map(|_| tracing::info!(stream = %stream, "stream closed"))
                .ok_or(EngineError::UnknownStream(stream));
            let _ = reply.send(result);
        }
    }
}
