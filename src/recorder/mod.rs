//! Capture session orchestration
//!
//! - `CaptureConfig` defaults, overrides and validation
//! - the session state machine and lifecycle events
//! - `CaptureController`, which ties sampler, mixer, composer and encoder
//!   together for one session at a time

pub mod config;
pub mod controller;
pub mod state;

pub use config::{CaptureConfig, CaptureConfigOverrides};
pub use controller::{CaptureController, CapturePlatform};
pub use state::{CaptureEvent, SessionState, StartStatus, StopStatus};
