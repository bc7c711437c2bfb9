//! Capture trait definitions
//!
//! Platform-agnostic traits for the collaborators the capture pipeline
//! observes but does not own: the target element, the rasterization
//! service, the screen and the media devices.

use crate::media::MediaStream;
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both dimensions are positive
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Size of an RGBA buffer with these dimensions
    pub fn rgba_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Information about a display/screen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Scale factor (e.g., 2.0 for Retina)
    pub scale_factor: f64,

    /// Refresh rate in Hz (if available)
    pub refresh_rate: Option<u32>,
}

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Whether this is an input device
    pub is_input: bool,

    /// Whether this is the default device
    pub is_default: bool,
}

/// A rasterized snapshot of the target element (RGBA8, row-major, no padding)
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Bitmap {
    /// Wrap RGBA pixel data, checking that its length matches the dimensions
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> CaptureResult<Self> {
        let expected = Resolution::new(width, height).rgba_len();
        if data.len() != expected {
            return Err(CaptureError::Rasterize(format!(
                "bitmap size mismatch: got {} bytes, expected {} ({}x{}x4)",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A bitmap filled with one RGBA color
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(Resolution::new(width, height).rgba_len())
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// The rendered element being recorded.
///
/// Supplied at construction and only observed; the recorder never mutates it.
pub trait TargetElement: Send + Sync {
    /// Rendered content-box size in pixels; zero when not laid out
    fn client_size(&self) -> (u32, u32);

    /// Whether the element is still attached to its document
    fn is_connected(&self) -> bool {
        true
    }

    /// Human-readable name used in logs
    fn describe(&self) -> String {
        "element".to_string()
    }
}

/// External element-to-bitmap renderer, invoked once per sampling tick.
///
/// Failures (cross-origin content, detached element) are non-fatal to the
/// session.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(
        &self,
        target: &dyn TargetElement,
        width: u32,
        height: u32,
    ) -> CaptureResult<Bitmap>;
}

/// The display the page is shown on
#[async_trait]
pub trait Screen: Send + Sync {
    /// Full display resolution, used when the element reports no size
    fn resolution(&self) -> Resolution;

    /// Resolves at the next repaint opportunity
    async fn animation_frame(&self);
}

/// A screen with fixed metrics.
///
/// With a refresh rate the repaint hint waits for the next vsync boundary;
/// without one it only yields to the scheduler.
pub struct StaticScreen {
    info: DisplayInfo,
    epoch: tokio::time::Instant,
}

impl StaticScreen {
    pub fn new(info: DisplayInfo) -> Self {
        Self {
            info,
            epoch: tokio::time::Instant::now(),
        }
    }

    /// A screen of the given size without a known refresh rate
    pub fn with_resolution(width: u32, height: u32) -> Self {
        Self::new(DisplayInfo {
            width,
            height,
            scale_factor: 1.0,
            refresh_rate: None,
        })
    }

    pub fn info(&self) -> &DisplayInfo {
        &self.info
    }

    fn until_next_vsync(&self, hz: u32) -> Duration {
        let period = Duration::from_secs_f64(1.0 / hz as f64);
        let elapsed = self.epoch.elapsed().as_nanos();
        let period_ns = period.as_nanos().max(1);
        let remainder = elapsed % period_ns;
        Duration::from_nanos((period_ns - remainder) as u64)
    }
}

#[async_trait]
impl Screen for StaticScreen {
    fn resolution(&self) -> Resolution {
        Resolution::new(self.info.width, self.info.height)
    }

    async fn animation_frame(&self) {
        match self.info.refresh_rate {
            Some(hz) if hz > 0 => tokio::time::sleep(self.until_next_vsync(hz)).await,
            _ => tokio::task::yield_now().await,
        }
    }
}

/// What a device request asks for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
    /// Specific device; None selects the default
    pub device_id: Option<String>,
}

impl MediaConstraints {
    /// Audio-only request, as used for microphone acquisition
    pub fn microphone(device_id: Option<String>) -> Self {
        Self {
            audio: true,
            video: false,
            device_id,
        }
    }
}

/// Hardware media device access
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Request a live device stream; may wait on a permission prompt
    async fn get_user_media(&self, constraints: MediaConstraints) -> CaptureResult<MediaStream>;
}

/// Device access for hosts without any capture hardware
pub struct NoMediaDevices;

#[async_trait]
impl MediaDevices for NoMediaDevices {
    async fn get_user_media(&self, _constraints: MediaConstraints) -> CaptureResult<MediaStream> {
        Err(CaptureError::DeviceNotFound(
            "no media devices available".to_string(),
        ))
    }
}
