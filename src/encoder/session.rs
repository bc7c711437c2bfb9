//! Encoder session
//!
//! Drives one recorder over the composed stream. Encoded chunks are
//! buffered while recording and drained into a single artifact only after
//! the recorder reports that it has stopped, so no chunk can arrive after
//! the drain.

use super::traits::{EncoderBackend, RecorderEvent};
use crate::utils::error::{CaptureError, CaptureResult};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderState {
    Created,
    Recording,
    Stopped,
}

/// Ordered encoded fragments of one session
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
    total_bytes: usize,
}

impl ChunkBuffer {
    /// Append a chunk; empty chunks are ignored
    pub fn push(&mut self, chunk: Vec<u8>) -> bool {
        if chunk.is_empty() {
            return false;
        }
        self.total_bytes += chunk.len();
        self.chunks.push(chunk);
        true
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Concatenate all chunks in emission order and clear the buffer.
    /// Returns the bytes and the number of chunks they came from.
    pub fn drain(&mut self) -> (Vec<u8>, usize) {
        let count = self.chunks.len();
        let mut data = Vec::with_capacity(self.total_bytes);
        for chunk in self.chunks.drain(..) {
            data.extend_from_slice(&chunk);
        }
        self.total_bytes = 0;
        (data, count)
    }
}

/// The finished recording of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub session_id: Uuid,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub mime_type: String,
    pub chunk_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
}

impl Artifact {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Suggested file extension for a download
    pub fn extension(&self) -> &'static str {
        match super::traits::container_of(&self.mime_type) {
            "video/mp4" => "mp4",
            _ => "webm",
        }
    }
}

pub struct EncoderSession {
    session_id: Uuid,
    mime_type: String,
    state: Arc<RwLock<EncoderState>>,
    backend: Box<dyn EncoderBackend>,
    buffer: Arc<Mutex<ChunkBuffer>>,
}

impl EncoderSession {
    pub fn new(session_id: Uuid, backend: Box<dyn EncoderBackend>) -> Self {
        let mime_type = backend.mime_type();
        Self {
            session_id,
            mime_type,
            state: Arc::new(RwLock::new(EncoderState::Created)),
            backend,
            buffer: Arc::new(Mutex::new(ChunkBuffer::default())),
        }
    }

    pub fn state(&self) -> EncoderState {
        *self.state.read()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Number of chunks buffered so far
    pub fn buffered_chunks(&self) -> usize {
        self.buffer.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn buffer(&self) -> Arc<Mutex<ChunkBuffer>> {
        self.buffer.clone()
    }

    /// Start chunked encoding. `on_stop` receives the artifact exactly once,
    /// after the recorder's stop-completion event.
    pub fn start<F>(&mut self, chunk_interval: Duration, on_stop: F) -> CaptureResult<()>
    where
        F: FnOnce(Artifact) + Send + 'static,
    {
        if self.state() != EncoderState::Created {
            return Err(CaptureError::Encoding(format!(
                "encoder session {} already started",
                self.session_id
            )));
        }

        if chunk_interval.is_zero() {
            return Err(CaptureError::InvalidConfig(
                "chunk interval must be positive".to_string(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.backend.start(chunk_interval, tx)?;
        *self.state.write() = EncoderState::Recording;

        tracing::info!(
            "Encoder session {} recording {} (chunk interval {:?})",
            self.session_id,
            self.mime_type,
            chunk_interval
        );

        tokio::spawn(consume_events(
            rx,
            self.session_id,
            self.mime_type.clone(),
            self.state.clone(),
            self.buffer.clone(),
            on_stop,
        ));
        Ok(())
    }

    /// Ask the recorder to finish. Returns false unless recording.
    pub fn stop(&mut self) -> bool {
        if self.state() != EncoderState::Recording {
            return false;
        }
        tracing::info!("Stopping encoder session {}", self.session_id);
        self.backend.stop();
        true
    }
}

async fn consume_events<F>(
    mut rx: mpsc::UnboundedReceiver<RecorderEvent>,
    session_id: Uuid,
    mime_type: String,
    state: Arc<RwLock<EncoderState>>,
    buffer: Arc<Mutex<ChunkBuffer>>,
    on_stop: F,
) where
    F: FnOnce(Artifact),
{
    let started_at = Utc::now();
    let clock = tokio::time::Instant::now();

    while let Some(event) = rx.recv().await {
        match event {
            RecorderEvent::DataAvailable(chunk) => {
                let size = chunk.len();
                if buffer.lock().push(chunk) {
                    tracing::debug!("Session {} buffered chunk of {} bytes", session_id, size);
                }
            }
            RecorderEvent::Error(message) => {
                tracing::error!("Encoder error in session {}: {}", session_id, message);
            }
            RecorderEvent::Stopped => break,
        }
    }

    *state.write() = EncoderState::Stopped;
    let (data, chunk_count) = buffer.lock().drain();
    let artifact = Artifact {
        session_id,
        data,
        mime_type: super::traits::container_of(&mime_type).to_string(),
        chunk_count,
        started_at,
        finished_at: Utc::now(),
        duration: clock.elapsed(),
    };
    tracing::info!(
        "Session {} finalized: {} bytes from {} chunks",
        session_id,
        artifact.len(),
        chunk_count
    );
    on_stop(artifact);
}
