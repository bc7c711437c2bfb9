//! Rasterizer backed by an external screenshot command
//!
//! The command is run once per tick and must write a PNG of the element to
//! stdout. Arguments may contain `{width}`, `{height}` and `{target}`
//! placeholders, filled from the requested size and the element's
//! description (typically a CSS selector).

use super::traits::{Bitmap, Rasterizer, TargetElement};
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub struct CommandRasterizer {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandRasterizer {
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect::<Vec<String>>(),
            timeout: None,
        }
    }

    /// Kill the command if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn expand_args(&self, target: &dyn TargetElement, width: u32, height: u32) -> Vec<String> {
        let description = target.describe();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{width}", &width.to_string())
                    .replace("{height}", &height.to_string())
                    .replace("{target}", &description)
            })
            .collect()
    }
}

#[async_trait]
impl Rasterizer for CommandRasterizer {
    async fn rasterize(
        &self,
        target: &dyn TargetElement,
        width: u32,
        height: u32,
    ) -> CaptureResult<Bitmap> {
        if !target.is_connected() {
            return Err(CaptureError::Rasterize(format!(
                "{} is not attached to a document",
                target.describe()
            )));
        }

        let args = self.expand_args(target, width, height);
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CaptureError::Rasterize(format!("Failed to run {}: {}", self.program, e))
            })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    CaptureError::Rasterize(format!("{} timed out after {:?}", self.program, limit))
                })??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::Rasterize(format!(
                "{} failed: {}",
                self.program,
                stderr.trim()
            )));
        }

        decode_png(&output.stdout)
    }
}

/// Decode PNG bytes into an RGBA8 bitmap
pub fn decode_png(bytes: &[u8]) -> CaptureResult<Bitmap> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| CaptureError::Rasterize(format!("PNG decode error: {}", e)))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| CaptureError::Rasterize(format!("PNG frame error: {}", e)))?;
    let pixels = &buf[..info.buffer_size()];

    let data = match info.color_type {
        png::ColorType::Rgba => pixels.to_vec(),
        png::ColorType::Rgb => {
            let mut rgba = Vec::with_capacity(pixels.len() / 3 * 4);
            for chunk in pixels.chunks(3) {
                rgba.extend_from_slice(chunk);
                rgba.push(255);
            }
            rgba
        }
        png::ColorType::GrayscaleAlpha => {
            let mut rgba = Vec::with_capacity(pixels.len() * 2);
            for chunk in pixels.chunks(2) {
                rgba.extend_from_slice(&[chunk[0], chunk[0], chunk[0], chunk[1]]);
            }
            rgba
        }
        png::ColorType::Grayscale => {
            let mut rgba = Vec::with_capacity(pixels.len() * 4);
            for &g in pixels {
                rgba.extend_from_slice(&[g, g, g, 255]);
            }
            rgba
        }
        other => {
            return Err(CaptureError::Rasterize(format!(
                "Unsupported PNG color type: {:?}",
                other
            )));
        }
    };

    Bitmap::new(info.width, info.height, data)
}
