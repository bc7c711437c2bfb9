//! Fake platform collaborators shared by the unit tests

use crate::capture::traits::{Bitmap, MediaConstraints, MediaDevices, Rasterizer, TargetElement};
use crate::encoder::traits::{
    container_of, EncoderBackend, EncoderHost, RecorderEvent, RecorderEventSender, RecorderOptions,
};
use crate::media::{AudioFormat, AudioTrackWriter, MediaStream, MediaTrack};
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

pub struct FakeElement {
    size: Mutex<(u32, u32)>,
    connected: AtomicBool,
}

impl FakeElement {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            size: Mutex::new((width, height)),
            connected: AtomicBool::new(true),
        })
    }

    pub fn detach(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn resize(&self, width: u32, height: u32) {
        *self.size.lock() = (width, height);
    }
}

impl TargetElement for FakeElement {
    fn client_size(&self) -> (u32, u32) {
        *self.size.lock()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn describe(&self) -> String {
        "#quiz".to_string()
    }
}

/// Paints a solid color per call; fails while the element is detached
pub struct FakeRasterizer {
    calls: AtomicU64,
    sizes: Mutex<Vec<(u32, u32)>>,
    delay: Option<Duration>,
}

impl FakeRasterizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU64::new(0),
            sizes: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU64::new(0),
            sizes: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested_sizes(&self) -> Vec<(u32, u32)> {
        self.sizes.lock().clone()
    }
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(
        &self,
        target: &dyn TargetElement,
        width: u32,
        height: u32,
    ) -> CaptureResult<Bitmap> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.sizes.lock().push((width, height));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !target.is_connected() {
            return Err(CaptureError::Rasterize(
                "element is not attached to a document".to_string(),
            ));
        }
        Ok(Bitmap::filled(width, height, [(n % 256) as u8, 0, 0, 255]))
    }
}

/// Grants or denies microphone access
pub struct FakeDevices {
    grant: bool,
    delay: Option<Duration>,
    requests: AtomicUsize,
    granted: Mutex<Vec<MediaStream>>,
    writers: Mutex<Vec<AudioTrackWriter>>,
}

impl FakeDevices {
    pub fn granting() -> Arc<Self> {
        Self::build(true, None)
    }

    pub fn denying() -> Arc<Self> {
        Self::build(false, None)
    }

    /// Grants only after the prompt has been open for `delay`
    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::build(true, Some(delay))
    }

    fn build(grant: bool, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            grant,
            delay,
            requests: AtomicUsize::new(0),
            granted: Mutex::new(Vec::new()),
            writers: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn granted(&self) -> Vec<MediaStream> {
        self.granted.lock().clone()
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn get_user_media(&self, constraints: MediaConstraints) -> CaptureResult<MediaStream> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        assert!(constraints.audio && !constraints.video);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.grant {
            return Err(CaptureError::PermissionDenied(
                "microphone access was denied".to_string(),
            ));
        }
        let (track, writer) = MediaTrack::audio("Fake Microphone", AudioFormat::new(48_000, 1));
        let stream = MediaStream::new(vec![track]);
        self.granted.lock().push(stream.clone());
        self.writers.lock().push(writer);
        Ok(stream)
    }
}

/// A recorder host that "encodes" the surface frame sequence numbers
pub struct FakeEncoderHost {
    supported: Vec<String>,
    accept_defaults: bool,
    created: Mutex<Vec<(MediaStream, RecorderOptions)>>,
}

impl FakeEncoderHost {
    pub fn webm() -> Arc<Self> {
        Self::build(&["video/webm;codecs=vp8,opus", "video/webm"], true)
    }

    pub fn supporting(types: &[&str], accept_defaults: bool) -> Arc<Self> {
        Self::build(types, accept_defaults)
    }

    fn build(types: &[&str], accept_defaults: bool) -> Arc<Self> {
        Arc::new(Self {
            supported: types.iter().map(|t| t.to_string()).collect(),
            accept_defaults,
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn created(&self) -> Vec<(MediaStream, RecorderOptions)> {
        self.created.lock().clone()
    }
}

impl EncoderHost for FakeEncoderHost {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|t| t == mime_type)
    }

    fn create_recorder(
        &self,
        stream: MediaStream,
        options: RecorderOptions,
    ) -> CaptureResult<Box<dyn EncoderBackend>> {
        if options.is_host_default() && !self.accept_defaults {
            return Err(CaptureError::Unsupported(
                "no supported recording configuration".to_string(),
            ));
        }
        let mime = options
            .mime_type
            .as_deref()
            .map(|m| container_of(m).to_string())
            .unwrap_or_else(|| "video/webm".to_string());
        self.created.lock().push((stream.clone(), options));
        Ok(Box::new(FakeRecorder {
            stream,
            mime,
            stop_tx: None,
        }))
    }
}

pub struct FakeRecorder {
    stream: MediaStream,
    mime: String,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl FakeRecorder {
    /// A recorder over `stream` that does not come from a host
    pub fn over(stream: MediaStream) -> Self {
        Self {
            stream,
            mime: "video/webm".to_string(),
            stop_tx: None,
        }
    }
}

impl EncoderBackend for FakeRecorder {
    fn mime_type(&self) -> String {
        self.mime.clone()
    }

    fn start(&mut self, timeslice: Duration, events: RecorderEventSender) -> CaptureResult<()> {
        let video = self
            .stream
            .video_tracks()
            .into_iter()
            .next()
            .ok_or_else(|| CaptureError::Stream("stream has no video track".to_string()))?;
        let period = Duration::from_secs_f64(1.0 / video.frame_rate().unwrap_or(30).max(1) as f64);
        let (stop_tx, mut stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);

        tokio::spawn(async move {
            let mut frames = tokio::time::interval(period);
            let mut slices =
                tokio::time::interval_at(tokio::time::Instant::now() + timeslice, timeslice);
            let mut pending = Vec::new();
            loop {
                tokio::select! {
                    _ = frames.tick() => {
                        if let Some(frame) = video.video_frame() {
                            if frame.sequence > 0 {
                                pending.extend_from_slice(&frame.sequence.to_le_bytes());
                            }
                        }
                    }
                    _ = slices.tick() => {
                        let chunk = std::mem::take(&mut pending);
                        let _ = events.send(RecorderEvent::DataAvailable(chunk));
                    }
                    _ = &mut stop_rx => break,
                }
            }
            let _ = events.send(RecorderEvent::DataAvailable(pending));
            let _ = events.send(RecorderEvent::Stopped);
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Frame sequence numbers recorded in a fake artifact, in order
pub fn decode_sequences(data: &[u8]) -> Vec<u64> {
    data.chunks_exact(8)
        .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect()
}
