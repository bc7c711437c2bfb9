//! Frame sampler
//!
//! Periodically rasterizes the target element into the bitmap surface.
//! Each tick waits for its rasterization to finish before the next one is
//! scheduled, so ticks never overlap.

use super::surface::BitmapSurface;
use super::traits::{Rasterizer, Screen, TargetElement};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Why the sampling loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SamplerExit {
    /// The session left the recording state
    Stopped,
    /// Too many consecutive rasterization failures
    FailureLimit,
}

/// Counters from one sampling run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplerReport {
    pub ticks: u64,
    pub frames_drawn: u64,
    pub failures: u64,
    pub exit: SamplerExit,
}

pub struct FrameSampler {
    target: Arc<dyn TargetElement>,
    rasterizer: Arc<dyn Rasterizer>,
    screen: Arc<dyn Screen>,
    surface: BitmapSurface,
    interval: Duration,
    max_consecutive_failures: Option<u32>,
}

impl FrameSampler {
    pub fn new(
        target: Arc<dyn TargetElement>,
        rasterizer: Arc<dyn Rasterizer>,
        screen: Arc<dyn Screen>,
        surface: BitmapSurface,
        frame_rate: u32,
    ) -> Self {
        Self {
            target,
            rasterizer,
            screen,
            surface,
            interval: Duration::from_secs_f64(1.0 / frame_rate.max(1) as f64),
            max_consecutive_failures: None,
        }
    }

    /// Give up after `limit` consecutive failed ticks; None retries forever
    pub fn with_failure_limit(mut self, limit: Option<u32>) -> Self {
        self.max_consecutive_failures = limit;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sample until `is_active` reports false.
    pub async fn run<F>(self, is_active: F) -> SamplerReport
    where
        F: Fn() -> bool,
    {
        let resolution = self.surface.resolution();
        let mut ticks = 0u64;
        let mut frames_drawn = 0u64;
        let mut failures = 0u64;
        let mut consecutive = 0u32;

        tracing::debug!(
            "Sampling {} at {}x{} every {:?}",
            self.target.describe(),
            resolution.width,
            resolution.height,
            self.interval
        );

        let exit = loop {
            if !is_active() {
                break SamplerExit::Stopped;
            }
            ticks += 1;

            match self
                .rasterizer
                .rasterize(self.target.as_ref(), resolution.width, resolution.height)
                .await
            {
                Ok(bitmap) => {
                    consecutive = 0;
                    // A capture that finished after stop is not drawn.
                    if !is_active() {
                        break SamplerExit::Stopped;
                    }
                    if self.surface.draw_bitmap(&bitmap) {
                        frames_drawn += 1;
                    }
                }
                Err(e) => {
                    failures += 1;
                    consecutive += 1;
                    tracing::warn!(
                        "Error capturing {} (tick {}): {}",
                        self.target.describe(),
                        ticks,
                        e
                    );
                    if let Some(limit) = self.max_consecutive_failures {
                        if consecutive >= limit {
                            tracing::error!(
                                "Giving up after {} consecutive capture failures",
                                consecutive
                            );
                            break SamplerExit::FailureLimit;
                        }
                    }
                }
            }

            tokio::time::sleep(self.interval).await;
            self.screen.animation_frame().await;
        };

        let report = SamplerReport {
            ticks,
            frames_drawn,
            failures,
            exit,
        };
        tracing::debug!("Sampler finished: {:?}", report);
        report
    }
}
