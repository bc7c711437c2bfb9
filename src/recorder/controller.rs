//! Capture controller
//!
//! Orchestrates one recording session at a time: sizes and creates the
//! bitmap surface, builds the audio graph (microphone plus caller tracks),
//! composes the stream, negotiates and starts the encoder, and drives the
//! frame sampler. Everything acquired by a start is released by the cleanup
//! that follows the encoder's completion, or immediately on a failed start.

use super::config::CaptureConfig;
use super::state::{CaptureEvent, SessionState, StartStatus, StopStatus};
use crate::capture::{
    BitmapSurface, FrameSampler, MediaConstraints, MediaDevices, Rasterizer, Resolution,
    SamplerExit, Screen, TargetElement,
};
use crate::encoder::{negotiate, Artifact, EncoderHost, EncoderSession};
use crate::media::{compose, AudioFormat, AudioGraph, AudioTap, MediaStream, MediaTrack};
use crate::utils::error::CaptureError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

/// Platform collaborators a controller records through
pub struct CapturePlatform {
    pub rasterizer: Arc<dyn Rasterizer>,
    pub screen: Arc<dyn Screen>,
    pub devices: Arc<dyn MediaDevices>,
    pub encoder: Arc<dyn EncoderHost>,
}

type CompletionCallback = Box<dyn Fn(Artifact) + Send + Sync>;

/// Everything a start acquires
struct Resources {
    surface: BitmapSurface,
    graph: AudioGraph,
    composed: MediaStream,
    microphone: Option<MediaStream>,
}

impl Resources {
    fn release(&self) {
        self.composed.stop_all();
        if let Some(microphone) = &self.microphone {
            microphone.stop_all();
        }
        self.graph.close();
        self.surface.release();
    }
}

struct ActiveSession {
    id: Uuid,
    // Read by the sampler before every tick
    active: Arc<AtomicBool>,
    resources: Resources,
    encoder: EncoderSession,
}

struct ControllerInner {
    config: CaptureConfig,
    // Set when `config` failed validation; every start is refused
    config_error: Option<String>,
    target: Arc<dyn TargetElement>,
    platform: CapturePlatform,
    on_complete: CompletionCallback,
    state: watch::Sender<SessionState>,
    session: Mutex<Option<ActiveSession>>,
    events: broadcast::Sender<CaptureEvent>,
}

/// Resets a claimed start back to idle unless disarmed
struct StartClaim<'a> {
    state: &'a watch::Sender<SessionState>,
    armed: bool,
}

impl Drop for StartClaim<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_replace(SessionState::Idle);
        }
    }
}

/// Records a target element into a single video artifact per session
pub struct CaptureController {
    inner: Arc<ControllerInner>,
}

impl CaptureController {
    pub fn new<F>(
        config: CaptureConfig,
        on_complete: F,
        target: Arc<dyn TargetElement>,
        platform: CapturePlatform,
    ) -> Self
    where
        F: Fn(Artifact) + Send + Sync + 'static,
    {
        let config_error = config.validate().err().map(|e| {
            tracing::warn!("Capture configuration is invalid, starts will be refused: {}", e);
            e.to_string()
        });
        let (state, _) = watch::channel(SessionState::Idle);
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(ControllerInner {
                config,
                config_error,
                target,
                platform,
                on_complete: Box::new(on_complete),
                state,
                session: Mutex::new(None),
                events,
            }),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.inner.events.subscribe()
    }

    /// Resolves once no session is in progress
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|state| *state == SessionState::Idle).await;
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.inner.session.lock().as_ref().map(|s| s.id)
    }

    /// Fixed size of the current session's surface
    pub fn capture_resolution(&self) -> Option<Resolution> {
        self.inner
            .session
            .lock()
            .as_ref()
            .map(|s| s.resources.surface.resolution())
    }

    /// Chunks encoded so far in the current session
    pub fn buffered_chunks(&self) -> usize {
        self.inner
            .session
            .lock()
            .as_ref()
            .map(|s| s.encoder.buffered_chunks())
            .unwrap_or(0)
    }

    /// Read-only view of the granted microphone, e.g. for a level meter
    pub fn microphone(&self) -> Option<AudioTap> {
        self.inner
            .session
            .lock()
            .as_ref()
            .and_then(|s| s.resources.microphone.as_ref())
            .and_then(AudioTap::from_stream)
    }

    /// Start a session. `extra_audio_tracks` are mixed in alongside the
    /// microphone; the controller never stops them.
    pub async fn start_recording(&self, extra_audio_tracks: Vec<MediaTrack>) -> StartStatus {
        let inner = &self.inner;
        if let Some(reason) = &inner.config_error {
            tracing::error!("Refusing to start capture: {}", reason);
            let status = StartStatus::FailedInvalidConfig(reason.clone());
            inner.emit(CaptureEvent::StartFailed {
                status: status.clone(),
            });
            return status;
        }

        let claimed = inner.state.send_if_modified(|state| {
            if *state == SessionState::Idle {
                *state = SessionState::Recording;
                true
            } else {
                false
            }
        });
        if !claimed {
            tracing::warn!("Capture already in progress, ignoring start");
            return StartStatus::AlreadyRecording;
        }

        let mut claim = StartClaim {
            state: &inner.state,
            armed: true,
        };
        let status = inner.begin(extra_audio_tracks).await;
        if status.is_started() {
            claim.armed = false;
        } else {
            drop(claim);
            inner.emit(CaptureEvent::StartFailed {
                status: status.clone(),
            });
        }
        status
    }

    /// Stop the current session. The artifact is delivered once the encoder
    /// has flushed.
    pub fn stop_recording(&self) -> StopStatus {
        self.inner.stop_session(None)
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        if self.inner.stop_session(None) == StopStatus::Stopped {
            tracing::debug!("Capture controller dropped while recording");
        }
    }
}

impl ControllerInner {
    fn emit(&self, event: CaptureEvent) {
        let _ = self.events.send(event);
    }

    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Element size, or the screen size when the element reports none
    fn target_resolution(&self) -> Resolution {
        let (width, height) = self.target.client_size();
        if width == 0 || height == 0 {
            let screen = self.platform.screen.resolution();
            tracing::debug!(
                "{} has no client size, using screen resolution {}",
                self.target.describe(),
                screen
            );
            screen
        } else {
            Resolution::new(width, height)
        }
    }

    async fn acquire_microphone(&self) -> Option<MediaStream> {
        let constraints = MediaConstraints::microphone(self.config.microphone_device_id.clone());
        let request = self.platform.devices.get_user_media(constraints);
        let result = match self.config.microphone_timeout() {
            Some(limit) => match tokio::time::timeout(limit, request).await {
                Ok(result) => result,
                Err(_) => Err(CaptureError::PermissionDenied(format!(
                    "no answer to the microphone request within {:?}",
                    limit
                ))),
            },
            None => request.await,
        };

        match result {
            Ok(stream) => {
                tracing::info!(
                    "Microphone granted with {} audio tracks",
                    stream.audio_tracks().len()
                );
                Some(stream)
            }
            Err(e) => {
                tracing::warn!("Error getting microphone access, recording without it: {}", e);
                self.emit(CaptureEvent::MicrophoneUnavailable {
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    async fn begin(self: &Arc<Self>, extra_audio_tracks: Vec<MediaTrack>) -> StartStatus {
        let config = &self.config;
        if !self.target.is_connected() {
            tracing::error!(
                "Capture target {} is not attached to a document",
                self.target.describe()
            );
            return StartStatus::FailedNoTarget;
        }
        let resolution = self.target_resolution();
        if !resolution.is_valid() {
            tracing::error!("No usable capture resolution for {}", self.target.describe());
            return StartStatus::FailedNoTarget;
        }

        let session_id = Uuid::new_v4();
        tracing::info!(
            "Starting capture session {} of {} at {} ({} fps)",
            session_id,
            self.target.describe(),
            resolution,
            config.frame_rate
        );

        let surface = BitmapSurface::new(resolution);
        let video_stream = surface.capture_stream(config.frame_rate);
        let graph = AudioGraph::new(AudioFormat::new(
            config.audio_sample_rate,
            config.audio_channels,
        ));
        let destination = graph.create_destination();

        let microphone = if config.capture_microphone {
            self.acquire_microphone().await
        } else {
            None
        };

        let mut sources: Vec<MediaTrack> = microphone
            .iter()
            .flat_map(|stream| stream.audio_tracks())
            .collect();
        sources.extend(extra_audio_tracks);
        for track in &sources {
            if let Err(e) = graph.connect(track, &destination) {
                tracing::warn!("Skipping audio track '{}': {}", track.label(), e);
            }
        }

        let composed = compose(&video_stream, &destination.stream());
        let resources = Resources {
            surface,
            graph,
            composed,
            microphone,
        };

        self.platform.encoder.prepare().await;
        let negotiated = negotiate(
            self.platform.encoder.as_ref(),
            &config.preferred_codec,
            config.target_bitrate,
        );
        let used_defaults = negotiated.is_none();
        let backend = match self
            .platform
            .encoder
            .create_recorder(resources.composed.clone(), negotiated.unwrap_or_default())
        {
            Ok(backend) => backend,
            Err(e) => {
                resources.release();
                if used_defaults {
                    tracing::error!("No supported recording configuration: {}", e);
                    return StartStatus::FailedNoCodec;
                }
                tracing::error!("Failed to create recorder: {}", e);
                return StartStatus::FailedEncoder(e.to_string());
            }
        };

        let mut encoder = EncoderSession::new(session_id, backend);
        let mime_type = encoder.mime_type().to_string();
        let active = Arc::new(AtomicBool::new(true));
        let on_stop = {
            let inner = self.clone();
            move |artifact: Artifact| inner.finish(session_id, artifact)
        };

        // Held until the session is stored so an early completion finds it
        let mut slot = self.session.lock();
        if let Err(e) = encoder.start(config.chunk_interval(), on_stop) {
            drop(slot);
            resources.release();
            tracing::error!("Failed to start recorder: {}", e);
            return StartStatus::FailedEncoder(e.to_string());
        }

        let sampler = FrameSampler::new(
            self.target.clone(),
            self.platform.rasterizer.clone(),
            self.platform.screen.clone(),
            resources.surface.clone(),
            config.frame_rate,
        )
        .with_failure_limit(config.max_consecutive_capture_failures);
        tokio::spawn(run_sampler(
            Arc::downgrade(self),
            session_id,
            sampler,
            active.clone(),
        ));

        let has_microphone = resources.microphone.is_some();
        *slot = Some(ActiveSession {
            id: session_id,
            active,
            resources,
            encoder,
        });
        drop(slot);

        self.emit(CaptureEvent::Started {
            session_id,
            resolution,
            mime_type,
            has_microphone,
        });
        StartStatus::Started
    }

    /// Stop the current session, or only `expected` when given
    fn stop_session(&self, expected: Option<Uuid>) -> StopStatus {
        let mut slot = self.session.lock();
        let Some(session) = slot.as_mut() else {
            return StopStatus::AlreadyStopped;
        };
        if expected.is_some_and(|id| id != session.id) || self.state() != SessionState::Recording {
            return StopStatus::AlreadyStopped;
        }

        tracing::info!("Stopping capture session {}", session.id);
        session.active.store(false, Ordering::SeqCst);
        session.encoder.stop();
        session.resources.composed.stop_all();
        let session_id = session.id;
        self.state.send_replace(SessionState::Stopping);
        drop(slot);

        self.emit(CaptureEvent::Stopping { session_id });
        StopStatus::Stopped
    }

    /// Encoder completion: deliver the artifact, then release the session
    fn finish(&self, session_id: Uuid, artifact: Artifact) {
        let session = {
            let mut slot = self.session.lock();
            match slot.as_ref() {
                Some(s) if s.id == session_id => slot.take(),
                _ => None,
            }
        };

        let bytes = artifact.len();
        let chunk_count = artifact.chunk_count;
        (self.on_complete)(artifact);

        let Some(session) = session else {
            tracing::warn!("Completion for unknown capture session {}", session_id);
            return;
        };
        session.active.store(false, Ordering::SeqCst);
        session.resources.release();
        tracing::info!("Capture session {} cleaned up", session_id);

        self.emit(CaptureEvent::Completed {
            session_id,
            bytes,
            chunk_count,
        });
        self.state.send_replace(SessionState::Idle);
    }
}

async fn run_sampler(
    inner: Weak<ControllerInner>,
    session_id: Uuid,
    sampler: FrameSampler,
    active: Arc<AtomicBool>,
) {
    let report = sampler.run(move || active.load(Ordering::SeqCst)).await;
    let Some(inner) = inner.upgrade() else {
        return;
    };
    inner.emit(CaptureEvent::SamplerFinished { session_id, report });
    if report.exit == SamplerExit::FailureLimit {
        tracing::warn!(
            "Stopping capture session {} after repeated capture failures",
            session_id
        );
        inner.stop_session(Some(session_id));
    }
}
