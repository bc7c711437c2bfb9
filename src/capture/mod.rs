//! Element capture
//!
//! Platform traits, the offscreen bitmap surface, the frame sampler and the
//! concrete rasterizer and microphone backends.

pub mod command;
pub mod microphone;
pub mod sampler;
pub mod surface;
pub mod traits;

pub use command::CommandRasterizer;
pub use microphone::CpalMediaDevices;
pub use sampler::{FrameSampler, SamplerExit, SamplerReport};
pub use surface::{BitmapSurface, VideoFrame};
pub use traits::{
    AudioDeviceInfo, Bitmap, DisplayInfo, MediaConstraints, MediaDevices, NoMediaDevices,
    Rasterizer, Resolution, Screen, StaticScreen, TargetElement,
};
