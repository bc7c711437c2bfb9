//! Offscreen bitmap surface
//!
//! Accumulates sampled frames and exposes them as a continuous video track.
//! The surface size is fixed when it is created; the track keeps emitting
//! the last painted frame between repaints.

use super::traits::{Bitmap, Resolution};
use crate::media::{MediaStream, MediaTrack};
use parking_lot::RwLock;
use std::sync::Arc;

/// One frame as seen by a consumer of the surface's video track
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub resolution: Resolution,
    /// Number of paints so far; 0 means the surface is still blank
    pub sequence: u64,
    /// RGBA8 pixels
    pub data: Arc<[u8]>,
}

struct Pixels {
    data: Arc<[u8]>,
    sequence: u64,
}

struct SurfaceInner {
    resolution: Resolution,
    // None once released
    pixels: RwLock<Option<Pixels>>,
}

/// Shared handle to an offscreen drawing surface
#[derive(Clone)]
pub struct BitmapSurface {
    inner: Arc<SurfaceInner>,
}

impl BitmapSurface {
    /// Create a blank (transparent black) surface
    pub fn new(resolution: Resolution) -> Self {
        let data: Arc<[u8]> = vec![0u8; resolution.rgba_len()].into();
        Self {
            inner: Arc::new(SurfaceInner {
                resolution,
                pixels: RwLock::new(Some(Pixels { data, sequence: 0 })),
            }),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.inner.resolution
    }

    /// Paint `bitmap` at the origin, scaled to the surface size.
    ///
    /// Returns false if the surface has been released.
    pub fn draw_bitmap(&self, bitmap: &Bitmap) -> bool {
        let target = self.inner.resolution;
        let data: Arc<[u8]> = if bitmap.resolution() == target {
            bitmap.data.as_slice().into()
        } else {
            scale_nearest(bitmap, target).into()
        };

        let mut guard = self.inner.pixels.write();
        match guard.as_mut() {
            Some(pixels) => {
                pixels.data = data;
                pixels.sequence += 1;
                true
            }
            None => false,
        }
    }

    /// Current contents; None once released
    pub fn snapshot(&self) -> Option<VideoFrame> {
        self.inner.pixels.read().as_ref().map(|pixels| VideoFrame {
            resolution: self.inner.resolution,
            sequence: pixels.sequence,
            data: pixels.data.clone(),
        })
    }

    /// Number of paints so far
    pub fn frames_painted(&self) -> u64 {
        self.inner
            .pixels
            .read()
            .as_ref()
            .map(|p| p.sequence)
            .unwrap_or(0)
    }

    /// Expose the surface as a stream with one video track at `frame_rate`
    pub fn capture_stream(&self, frame_rate: u32) -> MediaStream {
        let track = MediaTrack::video("canvas-capture", self.clone(), frame_rate);
        MediaStream::new(vec![track])
    }

    /// Drop the pixel buffer. Later draws are ignored.
    pub fn release(&self) {
        if self.inner.pixels.write().take().is_some() {
            tracing::debug!("Released {} surface", self.inner.resolution);
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner.pixels.read().is_none()
    }
}

fn scale_nearest(bitmap: &Bitmap, target: Resolution) -> Vec<u8> {
    let mut out = vec![0u8; target.rgba_len()];
    if bitmap.width == 0 || bitmap.height == 0 {
        return out;
    }
    let src_w = bitmap.width as usize;
    let src_h = bitmap.height as usize;
    let dst_w = target.width as usize;
    let dst_h = target.height as usize;

    for y in 0..dst_h {
        let sy = y * src_h / dst_h;
        for x in 0..dst_w {
            let sx = x * src_w / dst_w;
            let src = (sy * src_w + sx) * 4;
            let dst = (y * dst_w + x) * 4;
            out[dst..dst + 4].copy_from_slice(&bitmap.data[src..src + 4]);
        }
    }
    out
}
