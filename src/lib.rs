//! Page Recorder - record a rendered page element to video.
//!
//! A frame sampler rasterizes the target element into an offscreen surface
//! at a fixed rate, an audio graph mixes the microphone with caller-supplied
//! tracks, and an encoder session turns the composed stream into one
//! downloadable artifact per recording session.

pub mod capture;
pub mod encoder;
pub mod media;
pub mod recorder;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use capture::{BitmapSurface, CommandRasterizer, CpalMediaDevices, StaticScreen};
pub use encoder::{Artifact, FfmpegEncoderHost};
pub use media::{AudioTap, MediaStream, MediaTrack};
pub use recorder::{
    CaptureConfig, CaptureConfigOverrides, CaptureController, CaptureEvent, CapturePlatform,
    SessionState, StartStatus, StopStatus,
};
pub use utils::{CaptureError, CaptureResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this more than once is
/// harmless.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "page_recorder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_logging_is_idempotent() {
        super::init_logging();
        super::init_logging();
        tracing::info!("logging initialized");
    }
}
