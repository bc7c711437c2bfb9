//! Capture state management
//!
//! The session state machine, start/stop outcomes and lifecycle events.

use crate::capture::{Resolution, SamplerReport};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current state of a capture controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session in progress
    #[default]
    Idle,
    /// Sampling and encoding
    Recording,
    /// Waiting for the encoder to finish
    Stopping,
}

/// Outcome of `start_recording`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "detail")]
pub enum StartStatus {
    Started,
    /// A session is already in progress; nothing changed
    AlreadyRecording,
    /// The target element is not attached to a document
    FailedNoTarget,
    /// No recorder could be created for any configuration
    FailedNoCodec,
    /// The recorder was created but failed to start
    FailedEncoder(String),
    /// The controller's configuration did not validate; nothing was acquired
    FailedInvalidConfig(String),
}

impl StartStatus {
    pub fn is_started(&self) -> bool {
        matches!(self, StartStatus::Started)
    }
}

/// Outcome of `stop_recording`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopStatus {
    Stopped,
    /// No session was recording; nothing changed
    AlreadyStopped,
}

/// Events emitted over a controller's lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum CaptureEvent {
    #[serde(rename_all = "camelCase")]
    Started {
        session_id: Uuid,
        resolution: Resolution,
        mime_type: String,
        has_microphone: bool,
    },
    /// Microphone requested but not granted; recording continues without it
    #[serde(rename_all = "camelCase")]
    MicrophoneUnavailable { reason: String },
    #[serde(rename_all = "camelCase")]
    Stopping { session_id: Uuid },
    /// The sampler ended on its own
    #[serde(rename_all = "camelCase")]
    SamplerFinished { session_id: Uuid, report: SamplerReport },
    #[serde(rename_all = "camelCase")]
    Completed {
        session_id: Uuid,
        bytes: usize,
        chunk_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    StartFailed { status: StartStatus },
}
