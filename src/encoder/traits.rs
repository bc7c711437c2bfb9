//! Encoder trait definitions
//!
//! The runtime encoder is a platform collaborator: a host that can report
//! which container/codec combinations it supports and create recorders over
//! a composed stream. A recorder emits encoded chunks through an event
//! channel and signals completion with `RecorderEvent::Stopped` after its
//! last chunk.

use crate::media::MediaStream;
use crate::utils::error::CaptureResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Events a recorder emits while running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// An encoded fragment; may be empty
    DataAvailable(Vec<u8>),
    /// A non-fatal encoder problem
    Error(String),
    /// No further events follow
    Stopped,
}

pub type RecorderEventSender = mpsc::UnboundedSender<RecorderEvent>;

/// Requested encoding configuration; None fields leave the choice to the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderOptions {
    pub mime_type: Option<String>,
    pub bits_per_second: Option<u32>,
}

impl RecorderOptions {
    pub fn new(mime_type: impl Into<String>, bits_per_second: u32) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            bits_per_second: Some(bits_per_second),
        }
    }

    /// True when no configuration was negotiated
    pub fn is_host_default(&self) -> bool {
        self.mime_type.is_none()
    }
}

/// Something that can create recorders
#[async_trait]
pub trait EncoderHost: Send + Sync {
    /// Gather whatever `is_type_supported` needs without blocking the
    /// runtime. Called before every negotiation.
    async fn prepare(&self) {}

    /// Whether a recorder could be created for this mime type
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Create an idle recorder over `stream`
    fn create_recorder(
        &self,
        stream: MediaStream,
        options: RecorderOptions,
    ) -> CaptureResult<Box<dyn EncoderBackend>>;
}

/// One recorder instance
pub trait EncoderBackend: Send {
    /// Media type of the bytes this recorder produces
    fn mime_type(&self) -> String;

    /// Begin encoding; a chunk is emitted at least every `timeslice`
    fn start(&mut self, timeslice: Duration, events: RecorderEventSender) -> CaptureResult<()>;

    /// Request the end of encoding. The recorder flushes its tail and then
    /// sends `RecorderEvent::Stopped`.
    fn stop(&mut self);
}

/// The container part of a mime type, without codec parameters
pub fn container_of(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or(mime_type).trim()
}
