//! Media tracks and streams
//!
//! A track is a live source of either video frames or audio blocks.
//! Clones share the same underlying track; stopping any clone ends it for
//! every holder.

use crate::capture::surface::{BitmapSurface, VideoFrame};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Interleaved f32 samples
pub type AudioBlock = Arc<[f32]>;

/// Capacity of an audio track's fan-out, in blocks
const AUDIO_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    Live,
    Ended,
}

/// PCM layout of an audio track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

enum TrackSource {
    Video {
        surface: BitmapSurface,
        frame_rate: u32,
    },
    Audio {
        format: AudioFormat,
        sender: broadcast::Sender<AudioBlock>,
    },
}

type EndedHook = Box<dyn FnOnce() + Send>;

struct TrackInner {
    id: Uuid,
    kind: TrackKind,
    label: String,
    state: RwLock<TrackState>,
    source: TrackSource,
    ended_hooks: Mutex<Vec<EndedHook>>,
}

/// A shared handle to one live media track
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    fn from_parts(kind: TrackKind, label: String, source: TrackSource) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: Uuid::new_v4(),
                kind,
                label,
                state: RwLock::new(TrackState::Live),
                source,
                ended_hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A video track that continuously exposes the surface's last painted frame
    pub(crate) fn video(label: impl Into<String>, surface: BitmapSurface, frame_rate: u32) -> Self {
        Self::from_parts(
            TrackKind::Video,
            label.into(),
            TrackSource::Video {
                surface,
                frame_rate,
            },
        )
    }

    /// Create an audio track and the writer that feeds it
    pub fn audio(label: impl Into<String>, format: AudioFormat) -> (Self, AudioTrackWriter) {
        let (sender, _) = broadcast::channel(AUDIO_CHANNEL_CAPACITY);
        let track = Self::from_parts(
            TrackKind::Audio,
            label.into(),
            TrackSource::Audio {
                format,
                sender: sender.clone(),
            },
        );
        let writer = AudioTrackWriter {
            track: track.clone(),
            sender,
        };
        (track, writer)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn state(&self) -> TrackState {
        *self.inner.state.read()
    }

    pub fn is_live(&self) -> bool {
        self.state() == TrackState::Live
    }

    /// Emission rate of a video track
    pub fn frame_rate(&self) -> Option<u32> {
        match &self.inner.source {
            TrackSource::Video { frame_rate, .. } => Some(*frame_rate),
            TrackSource::Audio { .. } => None,
        }
    }

    /// The frame a video track currently emits; None once ended
    pub fn video_frame(&self) -> Option<VideoFrame> {
        if !self.is_live() {
            return None;
        }
        match &self.inner.source {
            TrackSource::Video { surface, .. } => surface.snapshot(),
            TrackSource::Audio { .. } => None,
        }
    }

    pub fn audio_format(&self) -> Option<AudioFormat> {
        match &self.inner.source {
            TrackSource::Audio { format, .. } => Some(*format),
            TrackSource::Video { .. } => None,
        }
    }

    /// Receive every audio block written after this call
    pub fn subscribe_audio(&self) -> Option<broadcast::Receiver<AudioBlock>> {
        match &self.inner.source {
            TrackSource::Audio { sender, .. } => Some(sender.subscribe()),
            TrackSource::Video { .. } => None,
        }
    }

    /// Run `hook` when the track ends; immediately if it already has
    pub fn on_ended(&self, hook: impl FnOnce() + Send + 'static) {
        {
            let state = self.inner.state.read();
            if *state == TrackState::Live {
                self.inner.ended_hooks.lock().push(Box::new(hook));
                return;
            }
        }
        hook();
    }

    /// End the track. Idempotent.
    pub fn stop(&self) {
        {
            let mut state = self.inner.state.write();
            if *state == TrackState::Ended {
                return;
            }
            *state = TrackState::Ended;
        }
        tracing::debug!("Track ended: {} ({})", self.inner.label, self.inner.kind);
        let hooks = std::mem::take(&mut *self.inner.ended_hooks.lock());
        for hook in hooks {
            hook();
        }
    }

    /// Both handles refer to the same track
    pub fn same_track(&self, other: &MediaTrack) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("state", &self.state())
            .finish()
    }
}

/// Producer side of an audio track
pub struct AudioTrackWriter {
    track: MediaTrack,
    sender: broadcast::Sender<AudioBlock>,
}

impl AudioTrackWriter {
    /// Publish interleaved samples; returns false once the track has ended
    pub fn push(&self, samples: &[f32]) -> bool {
        if !self.track.is_live() {
            return false;
        }
        if samples.is_empty() {
            return true;
        }
        // No subscribers is not an error: nobody is listening yet.
        let _ = self.sender.send(Arc::from(samples));
        true
    }

    pub fn track(&self) -> &MediaTrack {
        &self.track
    }
}

/// An ordered set of tracks
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: Uuid,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tracks,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> Vec<MediaTrack> {
        self.tracks_of(TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> Vec<MediaTrack> {
        self.tracks_of(TrackKind::Audio)
    }

    fn tracks_of(&self, kind: TrackKind) -> Vec<MediaTrack> {
        self.tracks
            .iter()
            .filter(|t| t.kind() == kind)
            .cloned()
            .collect()
    }

    /// At least one track is still live
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    /// Stop every track in the stream
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// Read-only view of a live audio track for external observers such as a
/// level meter. It can subscribe to samples but cannot stop the track.
#[derive(Clone)]
pub struct AudioTap {
    track: MediaTrack,
}

impl AudioTap {
    /// The first audio track of `stream`, if any
    pub(crate) fn from_stream(stream: &MediaStream) -> Option<Self> {
        stream
            .audio_tracks()
            .into_iter()
            .next()
            .map(|track| Self { track })
    }

    pub fn label(&self) -> &str {
        self.track.label()
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.track.audio_format()
    }

    pub fn is_live(&self) -> bool {
        self.track.is_live()
    }

    pub fn subscribe(&self) -> Option<broadcast::Receiver<AudioBlock>> {
        self.track.subscribe_audio()
    }
}
