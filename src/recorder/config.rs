//! Capture configuration
//!
//! Defaults merged with caller overrides. Overrides can also come from a
//! JSON file holding any subset of the fields.

use crate::utils::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_FRAME_RATE: u32 = 30;
pub const DEFAULT_CHUNK_INTERVAL_MS: u64 = 3_600_000;
pub const DEFAULT_TARGET_BITRATE: u32 = 1_000_000;
pub const DEFAULT_CODEC: &str = "video/webm;codecs=vp8,opus";

/// Settings for one capture controller; fixed once constructed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Samples per second, also the video track rate
    pub frame_rate: u32,

    /// Longest stretch of encoded media held before a chunk is flushed (ms)
    #[serde(rename = "chunkInterval")]
    pub chunk_interval_ms: u64,

    /// Request microphone access when recording starts
    pub capture_microphone: bool,

    /// Encoder bitrate hint in bits per second
    pub target_bitrate: u32,

    /// First mime type tried during negotiation
    pub preferred_codec: String,

    /// Stop the session after this many failed ticks in a row
    pub max_consecutive_capture_failures: Option<u32>,

    /// Input device to open; None selects the default
    pub microphone_device_id: Option<String>,

    /// Give up on the permission prompt after this long (ms)
    #[serde(rename = "microphoneTimeout")]
    pub microphone_timeout_ms: Option<u64>,

    pub audio_sample_rate: u32,

    pub audio_channels: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            chunk_interval_ms: DEFAULT_CHUNK_INTERVAL_MS,
            capture_microphone: false,
            target_bitrate: DEFAULT_TARGET_BITRATE,
            preferred_codec: DEFAULT_CODEC.to_string(),
            max_consecutive_capture_failures: None,
            microphone_device_id: None,
            microphone_timeout_ms: None,
            audio_sample_rate: 48_000,
            audio_channels: 2,
        }
    }
}

/// Caller-supplied partial configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CaptureConfigOverrides {
    pub frame_rate: Option<u32>,
    #[serde(rename = "chunkInterval")]
    pub chunk_interval_ms: Option<u64>,
    pub capture_microphone: Option<bool>,
    pub target_bitrate: Option<u32>,
    pub preferred_codec: Option<String>,
    pub max_consecutive_capture_failures: Option<u32>,
    pub microphone_device_id: Option<String>,
    #[serde(rename = "microphoneTimeout")]
    pub microphone_timeout_ms: Option<u64>,
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: Option<u16>,
}

impl CaptureConfig {
    /// Apply every field set in `overrides`
    pub fn merged(mut self, overrides: CaptureConfigOverrides) -> Self {
        if let Some(v) = overrides.frame_rate {
            self.frame_rate = v;
        }
        if let Some(v) = overrides.chunk_interval_ms {
            self.chunk_interval_ms = v;
        }
        if let Some(v) = overrides.capture_microphone {
            self.capture_microphone = v;
        }
        if let Some(v) = overrides.target_bitrate {
            self.target_bitrate = v;
        }
        if let Some(v) = overrides.preferred_codec {
            self.preferred_codec = v;
        }
        if let Some(v) = overrides.max_consecutive_capture_failures {
            self.max_consecutive_capture_failures = Some(v);
        }
        if let Some(v) = overrides.microphone_device_id {
            self.microphone_device_id = Some(v);
        }
        if let Some(v) = overrides.microphone_timeout_ms {
            self.microphone_timeout_ms = Some(v);
        }
        if let Some(v) = overrides.audio_sample_rate {
            self.audio_sample_rate = v;
        }
        if let Some(v) = overrides.audio_channels {
            self.audio_channels = v;
        }
        self
    }

    /// Parse a JSON object of overrides and merge it over the defaults
    pub fn from_json_str(json: &str) -> CaptureResult<Self> {
        let overrides: CaptureConfigOverrides = serde_json::from_str(json)?;
        let config = Self::default().merged(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Load overrides from a JSON file
    pub fn load(path: &Path) -> CaptureResult<Self> {
        let json = std::fs::read_to_string(path)?;
        tracing::debug!("Loading capture configuration from {:?}", path);
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.frame_rate == 0 {
            return Err(CaptureError::InvalidConfig("frameRate must be positive".to_string()));
        }
        if self.chunk_interval_ms == 0 {
            return Err(CaptureError::InvalidConfig(
                "chunkInterval must be positive".to_string(),
            ));
        }
        if self.target_bitrate == 0 {
            return Err(CaptureError::InvalidConfig(
                "targetBitrate must be positive".to_string(),
            ));
        }
        if self.preferred_codec.trim().is_empty() {
            return Err(CaptureError::InvalidConfig(
                "preferredCodec must not be empty".to_string(),
            ));
        }
        if self.audio_sample_rate == 0 {
            return Err(CaptureError::InvalidConfig(
                "audioSampleRate must be positive".to_string(),
            ));
        }
        if !matches!(self.audio_channels, 1 | 2) {
            return Err(CaptureError::InvalidConfig(format!(
                "audioChannels must be 1 or 2, got {}",
                self.audio_channels
            )));
        }
        Ok(())
    }

    /// Time between sampling ticks
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.frame_rate.max(1) as u64)
    }

    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }

    pub fn microphone_timeout(&self) -> Option<Duration> {
        self.microphone_timeout_ms.map(Duration::from_millis)
    }
}
