//! FFmpeg recorder backend
//!
//! Encodes a composed stream by piping raw RGBA frames into an `ffmpeg`
//! child process. Audio is sent as interleaved f32le over a loopback TCP
//! socket that ffmpeg connects to as its second input. The muxed output is
//! read from stdout and emitted as chunks every timeslice; webm and
//! fragmented mp4 are both streamable, so the concatenated chunks form a
//! playable file.

use super::traits::{
    EncoderBackend, EncoderHost, RecorderEvent, RecorderEventSender, RecorderOptions,
};
use crate::media::{MediaStream, MediaTrack};
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{broadcast, watch};

const MIN_TIMESLICE: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Webm,
    Mp4,
}

impl Container {
    fn muxer(&self) -> &'static str {
        match self {
            Container::Webm => "webm",
            Container::Mp4 => "mp4",
        }
    }

    fn mime(&self) -> &'static str {
        match self {
            Container::Webm => "video/webm",
            Container::Mp4 => "video/mp4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    Vp8,
    Vp9,
    H264,
}

impl VideoCodec {
    fn encoder(&self) -> &'static str {
        match self {
            VideoCodec::Vp8 => "libvpx",
            VideoCodec::Vp9 => "libvpx-vp9",
            VideoCodec::H264 => "libx264",
        }
    }

    fn token(&self) -> &'static str {
        match self {
            VideoCodec::Vp8 => "vp8",
            VideoCodec::Vp9 => "vp9",
            VideoCodec::H264 => "h264",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Opus,
    Vorbis,
    Aac,
}

impl AudioCodec {
    fn encoder(&self) -> &'static str {
        match self {
            AudioCodec::Opus => "libopus",
            AudioCodec::Vorbis => "libvorbis",
            AudioCodec::Aac => "aac",
        }
    }

    fn token(&self) -> &'static str {
        match self {
            AudioCodec::Opus => "opus",
            AudioCodec::Vorbis => "vorbis",
            AudioCodec::Aac => "aac",
        }
    }
}

/// A container/codec combination ffmpeg can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub container: Container,
    pub video: VideoCodec,
    pub audio: AudioCodec,
}

impl OutputFormat {
    /// Parse a mime type such as `video/webm;codecs=vp8,opus`.
    ///
    /// Missing codecs fall back to the container defaults. Returns None for
    /// unknown containers, unknown codecs and invalid pairings.
    pub fn parse(mime_type: &str) -> Option<Self> {
        let mut parts = mime_type.split(';');
        let container = match parts.next()?.trim().to_ascii_lowercase().as_str() {
            "video/webm" => Container::Webm,
            "video/mp4" => Container::Mp4,
            _ => return None,
        };

        let mut video = None;
        let mut audio = None;
        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            if key.trim() != "codecs" {
                continue;
            }
            for codec in value.trim().trim_matches('"').split(',') {
                let codec = codec.trim().to_ascii_lowercase();
                match codec.as_str() {
                    "vp8" => video = Some(VideoCodec::Vp8),
                    "vp9" | "vp09" => video = Some(VideoCodec::Vp9),
                    "h264" | "avc1" => video = Some(VideoCodec::H264),
                    "opus" => audio = Some(AudioCodec::Opus),
                    "vorbis" => audio = Some(AudioCodec::Vorbis),
                    "aac" => audio = Some(AudioCodec::Aac),
                    c if c.starts_with("avc1.") => video = Some(VideoCodec::H264),
                    c if c.starts_with("vp09.") => video = Some(VideoCodec::Vp9),
                    c if c.starts_with("mp4a") => audio = Some(AudioCodec::Aac),
                    "" => {}
                    _ => return None,
                }
            }
        }

        let format = match container {
            Container::Webm => OutputFormat {
                container,
                video: video.unwrap_or(VideoCodec::Vp8),
                audio: audio.unwrap_or(AudioCodec::Opus),
            },
            Container::Mp4 => OutputFormat {
                container,
                video: video.unwrap_or(VideoCodec::H264),
                audio: audio.unwrap_or(AudioCodec::Aac),
            },
        };
        format.is_valid().then_some(format)
    }

    fn is_valid(&self) -> bool {
        match self.container {
            Container::Webm => {
                self.video != VideoCodec::H264 && self.audio != AudioCodec::Aac
            }
            Container::Mp4 => true,
        }
    }

    /// The mime type the produced bytes carry
    pub fn mime_type(&self) -> String {
        format!(
            "{};codecs={},{}",
            self.container.mime(),
            self.video.token(),
            self.audio.token()
        )
    }
}

/// Parse `ffmpeg -encoders` output into the set of encoder names
pub fn parse_encoder_list(output: &str) -> HashSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            let name = fields.next()?;
            // Capability columns look like "V....D" or "A....."
            let is_entry = flags.len() == 6
                && flags.starts_with(|c: char| matches!(c, 'V' | 'A' | 'S'))
                && name != "=";
            is_entry.then(|| name.to_string())
        })
        .collect()
}

/// Input geometry for one recording
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputLayout {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Sample rate, channels and loopback port of the audio input
    pub audio: Option<(u32, u16, u16)>,
}

/// Arguments for one ffmpeg recording process
pub fn build_args(
    format: &OutputFormat,
    layout: &InputLayout,
    bits_per_second: Option<u32>,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgba".to_string(),
        "-s".to_string(),
        format!("{}x{}", layout.width, layout.height),
        "-r".to_string(),
        layout.frame_rate.to_string(),
        "-i".to_string(),
        "pipe:0".to_string(),
    ];

    if let Some((sample_rate, channels, port)) = layout.audio {
        args.extend([
            "-f".to_string(),
            "f32le".to_string(),
            "-ar".to_string(),
            sample_rate.to_string(),
            "-ac".to_string(),
            channels.to_string(),
            "-i".to_string(),
            format!("tcp://127.0.0.1:{}", port),
        ]);
    }

    args.extend(["-c:v".to_string(), format.video.encoder().to_string()]);
    match format.video {
        VideoCodec::Vp8 | VideoCodec::Vp9 => {
            args.extend([
                "-deadline".to_string(),
                "realtime".to_string(),
                "-cpu-used".to_string(),
                "8".to_string(),
            ]);
        }
        VideoCodec::H264 => {
            args.extend([
                "-preset".to_string(),
                "ultrafast".to_string(),
                "-tune".to_string(),
                "zerolatency".to_string(),
            ]);
        }
    }
    args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
    if let Some(bits) = bits_per_second {
        args.extend(["-b:v".to_string(), bits.to_string()]);
    }

    if layout.audio.is_some() {
        args.extend(["-c:a".to_string(), format.audio.encoder().to_string()]);
    }

    args.extend(["-f".to_string(), format.container.muxer().to_string()]);
    if format.container == Container::Mp4 {
        args.extend([
            "-movflags".to_string(),
            "frag_keyframe+empty_moov+default_base_moof".to_string(),
        ]);
    }
    args.push("pipe:1".to_string());
    args
}

/// Creates ffmpeg recorders, gated on the encoders the binary provides
pub struct FfmpegEncoderHost {
    program: String,
    encoders: Mutex<Option<Arc<HashSet<String>>>>,
}

impl FfmpegEncoderHost {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            encoders: Mutex::new(None),
        }
    }

    /// Use a known encoder set instead of probing the binary
    pub fn with_encoders(
        mut self,
        encoders: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let set: HashSet<String> = encoders.into_iter().map(Into::into).collect();
        self.encoders = Mutex::new(Some(Arc::new(set)));
        self
    }

    fn cached(&self) -> Option<Arc<HashSet<String>>> {
        self.encoders.lock().clone()
    }

    /// Run `ffmpeg -encoders` once and cache the result
    pub async fn probe(&self) -> Arc<HashSet<String>> {
        if let Some(set) = self.cached() {
            return set;
        }
        let output = tokio::process::Command::new(&self.program)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .output()
            .await;
        self.store(output)
    }

    /// Cached encoder set. Without a prior `probe` this runs ffmpeg
    /// synchronously.
    fn encoders(&self) -> Arc<HashSet<String>> {
        if let Some(set) = self.cached() {
            return set;
        }
        tracing::debug!("{} not probed yet, probing synchronously", self.program);
        let output = std::process::Command::new(&self.program)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .output();
        self.store(output)
    }

    fn store(&self, output: std::io::Result<std::process::Output>) -> Arc<HashSet<String>> {
        let set = match output {
            Ok(output) if output.status.success() => {
                parse_encoder_list(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                tracing::warn!(
                    "{} -encoders failed: {}",
                    self.program,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                HashSet::new()
            }
            Err(e) => {
                tracing::warn!("Failed to run {}: {}", self.program, e);
                HashSet::new()
            }
        };
        tracing::debug!("{} provides {} encoders", self.program, set.len());

        // A concurrent probe may have finished first; keep its result
        self.encoders
            .lock()
            .get_or_insert_with(|| Arc::new(set))
            .clone()
    }

    fn supports(&self, format: &OutputFormat) -> bool {
        let encoders = self.encoders();
        encoders.contains(format.video.encoder()) && encoders.contains(format.audio.encoder())
    }
}

impl Default for FfmpegEncoderHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EncoderHost for FfmpegEncoderHost {
    async fn prepare(&self) {
        self.probe().await;
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        OutputFormat::parse(mime_type)
            .map(|format| self.supports(&format))
            .unwrap_or(false)
    }

    fn create_recorder(
        &self,
        stream: MediaStream,
        options: RecorderOptions,
    ) -> CaptureResult<Box<dyn EncoderBackend>> {
        let format = match options.mime_type.as_deref() {
            Some(mime) => OutputFormat::parse(mime)
                .filter(|f| self.supports(f))
                .ok_or_else(|| CaptureError::Unsupported(format!("mime type {}", mime)))?,
            // Host default: first built-in format this binary can encode
            None => [
                "video/webm;codecs=vp8,opus",
                "video/webm;codecs=vp9,opus",
                "video/mp4;codecs=h264,aac",
            ]
            .iter()
            .filter_map(|mime| OutputFormat::parse(mime))
            .find(|f| self.supports(f))
            .ok_or_else(|| {
                CaptureError::Unsupported(format!("{} has no usable encoders", self.program))
            })?,
        };

        if stream.video_tracks().is_empty() {
            return Err(CaptureError::Stream("stream has no video track".to_string()));
        }

        Ok(Box::new(FfmpegRecorder {
            program: self.program.clone(),
            format,
            bits_per_second: options.bits_per_second,
            stream,
            stop_tx: None,
        }))
    }
}

pub struct FfmpegRecorder {
    program: String,
    format: OutputFormat,
    bits_per_second: Option<u32>,
    stream: MediaStream,
    stop_tx: Option<watch::Sender<bool>>,
}

impl EncoderBackend for FfmpegRecorder {
    fn mime_type(&self) -> String {
        self.format.mime_type()
    }

    fn start(&mut self, timeslice: Duration, events: RecorderEventSender) -> CaptureResult<()> {
        if self.stop_tx.is_some() {
            return Err(CaptureError::Encoding("recorder already started".to_string()));
        }

        let video = self
            .stream
            .video_tracks()
            .into_iter()
            .next()
            .ok_or_else(|| CaptureError::Stream("stream has no video track".to_string()))?;
        let frame = video
            .video_frame()
            .ok_or_else(|| CaptureError::Stream("video track has ended".to_string()))?;
        let frame_rate = video.frame_rate().unwrap_or(30).max(1);

        let audio = self.stream.audio_tracks().into_iter().next();
        let listener = match &audio {
            Some(_) => {
                let std_listener = std::net::TcpListener::bind("127.0.0.1:0")?;
                std_listener.set_nonblocking(true)?;
                Some(tokio::net::TcpListener::from_std(std_listener)?)
            }
            None => None,
        };

        let audio_layout = match (&audio, &listener) {
            (Some(track), Some(listener)) => {
                let format = track
                    .audio_format()
                    .ok_or_else(|| CaptureError::Stream("audio track has no format".to_string()))?;
                Some((format.sample_rate, format.channels, listener.local_addr()?.port()))
            }
            _ => None,
        };

        let layout = InputLayout {
            width: frame.resolution.width,
            height: frame.resolution.height,
            frame_rate,
            audio: audio_layout,
        };
        let args = build_args(&self.format, &layout, self.bits_per_second);
        tracing::info!("Starting {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CaptureError::Encoding(format!("Failed to start {}: {}", self.program, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CaptureError::Encoding("Failed to capture ffmpeg stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Encoding("Failed to capture ffmpeg stdout".to_string()))?;
        let stderr = child.stderr.take();

        let (stop_tx, stop_rx) = watch::channel(false);
        self.stop_tx = Some(stop_tx);

        tokio::spawn(write_video(video, frame_rate, stdin, stop_rx.clone()));
        if let (Some(track), Some(listener)) = (audio, listener) {
            tokio::spawn(write_audio(track, listener, stop_rx));
        }

        tokio::spawn(async move {
            let stderr_task = tokio::spawn(async move {
                let mut text = String::new();
                if let Some(mut stderr) = stderr {
                    let _ = stderr.read_to_string(&mut text).await;
                }
                text
            });

            read_output(stdout, timeslice, &events).await;

            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    let detail = stderr_task.await.unwrap_or_default();
                    let _ = events.send(RecorderEvent::Error(format!(
                        "ffmpeg exited with {}: {}",
                        status,
                        detail.trim()
                    )));
                }
                Err(e) => {
                    let _ = events.send(RecorderEvent::Error(format!("ffmpeg wait failed: {}", e)));
                }
            }
            let _ = events.send(RecorderEvent::Stopped);
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(true);
        }
    }
}

/// Feed the latest frame of `video` into ffmpeg at the track frame rate.
/// Closing stdin makes ffmpeg flush and exit.
async fn write_video(
    video: MediaTrack,
    frame_rate: u32,
    mut stdin: tokio::process::ChildStdin,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / frame_rate as f64));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut written: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(frame) = video.video_frame() else {
                    break;
                };
                if let Err(e) = stdin.write_all(&frame.data).await {
                    tracing::warn!("Failed to write frame to ffmpeg: {}", e);
                    break;
                }
                written += 1;
            }
            _ = stop_rx.changed() => break,
        }
    }

    let _ = stdin.shutdown().await;
    tracing::debug!("Video input closed after {} frames", written);
}

/// Stream audio blocks to ffmpeg once it connects to the loopback socket
async fn write_audio(
    track: MediaTrack,
    listener: tokio::net::TcpListener,
    mut stop_rx: watch::Receiver<bool>,
) {
    let Some(mut blocks) = track.subscribe_audio() else {
        return;
    };

    let mut socket = tokio::select! {
        accepted = listener.accept() => match accepted {
            Ok((socket, _)) => socket,
            Err(e) => {
                tracing::warn!("ffmpeg audio connection failed: {}", e);
                return;
            }
        },
        _ = stop_rx.changed() => return,
    };

    loop {
        tokio::select! {
            block = blocks.recv() => match block {
                Ok(block) => {
                    let bytes: Vec<u8> = block.iter().flat_map(|s| s.to_le_bytes()).collect();
                    if let Err(e) = socket.write_all(&bytes).await {
                        tracing::warn!("Failed to write audio to ffmpeg: {}", e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Audio input lagged, {} blocks skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = stop_rx.changed() => break,
        }
    }

    let _ = socket.shutdown().await;
}

/// Collect muxed output and emit it every `timeslice` until EOF
async fn read_output(
    mut stdout: tokio::process::ChildStdout,
    timeslice: Duration,
    events: &RecorderEventSender,
) {
    // `interval_at` panics on a zero period
    let timeslice = timeslice.max(MIN_TIMESLICE);
    let mut slices = tokio::time::interval_at(tokio::time::Instant::now() + timeslice, timeslice);
    let mut pending = Vec::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(e) => {
                    let _ = events.send(RecorderEvent::Error(format!(
                        "ffmpeg output read failed: {}",
                        e
                    )));
                    break;
                }
            },
            _ = slices.tick() => {
                let _ = events.send(RecorderEvent::DataAvailable(std::mem::take(&mut pending)));
            }
        }
    }

    let _ = events.send(RecorderEvent::DataAvailable(pending));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{BitmapSurface, Resolution};

    fn host() -> FfmpegEncoderHost {
        FfmpegEncoderHost::with_program("ffmpeg-not-installed")
            .with_encoders(["libvpx", "libopus", "libx264", "aac"])
    }

    #[test]
    fn test_parse_mime_types() {
        let f = OutputFormat::parse("video/webm;codecs=vp8,opus").unwrap();
        assert_eq!(f.container, Container::Webm);
        assert_eq!(f.video, VideoCodec::Vp8);
        assert_eq!(f.audio, AudioCodec::Opus);

        let f = OutputFormat::parse("video/webm").unwrap();
        assert_eq!(f.mime_type(), "video/webm;codecs=vp8,opus");

        let f = OutputFormat::parse("video/mp4").unwrap();
        assert_eq!((f.video, f.audio), (VideoCodec::H264, AudioCodec::Aac));

        let f = OutputFormat::parse("video/mp4;codecs=\"avc1.42E01E,mp4a.40.2\"").unwrap();
        assert_eq!((f.video, f.audio), (VideoCodec::H264, AudioCodec::Aac));
    }

    #[test]
    fn test_rejects_invalid_pairings() {
        assert!(OutputFormat::parse("video/webm;codecs=h264").is_none());
        assert!(OutputFormat::parse("video/webm;codecs=vp8,aac").is_none());
        assert!(OutputFormat::parse("video/x-matroska").is_none());
        assert!(OutputFormat::parse("video/webm;codecs=av1").is_none());
    }

    #[test]
    fn test_parse_encoder_list() {
        let output = "Encoders:\n V..... = Video\n A..... = Audio\n ------\n\
             V....D libvpx               libvpx VP8 (codec vp8)\n\
             A....D libopus              libopus Opus\n\
             V....D libx264              libx264 H.264\n";
        let set = parse_encoder_list(output);
        assert!(set.contains("libvpx"));
        assert!(set.contains("libopus"));
        assert!(set.contains("libx264"));
        assert!(!set.contains("="));
        assert!(!set.contains("------"));
    }

    #[test]
    fn test_support_follows_encoder_set() {
        let host = host();
        assert!(host.is_type_supported("video/webm;codecs=vp8,opus"));
        assert!(host.is_type_supported("video/webm"));
        assert!(host.is_type_supported("video/mp4"));
        assert!(!host.is_type_supported("video/webm;codecs=vp9"));
        assert!(!host.is_type_supported("video/webm;codecs=h264"));
    }

    #[test]
    fn test_missing_binary_supports_nothing() {
        let host = FfmpegEncoderHost::with_program("/nonexistent/ffmpeg");
        assert!(!host.is_type_supported("video/webm"));
    }

    #[tokio::test]
    async fn test_prepare_probes_asynchronously_and_caches() {
        let host = FfmpegEncoderHost::with_program("/nonexistent/ffmpeg");
        assert!(host.cached().is_none());
        host.prepare().await;
        let probed = host.cached().unwrap();
        assert!(probed.is_empty());
        assert!(Arc::ptr_eq(&probed, &host.probe().await));
        assert!(!host.is_type_supported("video/webm"));
    }

    #[tokio::test]
    async fn test_prepare_keeps_known_encoders() {
        let host = host();
        host.prepare().await;
        assert!(host.is_type_supported("video/mp4"));
    }

    #[test]
    fn test_webm_args_with_audio() {
        let format = OutputFormat::parse("video/webm;codecs=vp8,opus").unwrap();
        let layout = InputLayout {
            width: 640,
            height: 480,
            frame_rate: 30,
            audio: Some((48_000, 2, 40000)),
        };
        let args = build_args(&format, &layout, Some(1_000_000));
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgba -s 640x480 -r 30 -i pipe:0"));
        assert!(joined.contains("-f f32le -ar 48000 -ac 2 -i tcp://127.0.0.1:40000"));
        assert!(joined.contains("-c:v libvpx"));
        assert!(joined.contains("-b:v 1000000"));
        assert!(joined.contains("-c:a libopus"));
        assert!(joined.ends_with("-f webm pipe:1"));
    }

    #[test]
    fn test_mp4_args_are_fragmented_and_silent() {
        let format = OutputFormat::parse("video/mp4").unwrap();
        let layout = InputLayout {
            width: 320,
            height: 240,
            frame_rate: 10,
            audio: None,
        };
        let args = build_args(&format, &layout, None);
        assert!(args.contains(&"frag_keyframe+empty_moov+default_base_moof".to_string()));
        assert!(!args.contains(&"-c:a".to_string()));
        assert!(!args.contains(&"-b:v".to_string()));
    }

    #[test]
    fn test_create_recorder_negotiated_and_default() {
        let host = host();
        let stream = BitmapSurface::new(Resolution::new(4, 4)).capture_stream(30);

        let recorder = host
            .create_recorder(stream.clone(), RecorderOptions::new("video/mp4", 1_000))
            .unwrap();
        assert_eq!(recorder.mime_type(), "video/mp4;codecs=h264,aac");

        let recorder = host.create_recorder(stream.clone(), RecorderOptions::default()).unwrap();
        assert_eq!(recorder.mime_type(), "video/webm;codecs=vp8,opus");

        let err = host
            .create_recorder(stream, RecorderOptions::new("video/webm;codecs=vp9", 1_000))
            .err()
            .unwrap();
        assert_eq!(err.code(), "UNSUPPORTED");
    }

    #[tokio::test]
    async fn test_start_fails_when_binary_missing() {
        let host = FfmpegEncoderHost::with_program("/nonexistent/ffmpeg")
            .with_encoders(["libvpx", "libopus"]);
        let stream = BitmapSurface::new(Resolution::new(4, 4)).capture_stream(30);
        let mut recorder = host.create_recorder(stream, RecorderOptions::default()).unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let err = recorder.start(Duration::from_secs(1), tx).unwrap_err();
        assert_eq!(err.code(), "ENCODING_ERROR");
    }
}
