//! Audio mixing graph
//!
//! A shared processing graph in which every input track becomes a source
//! node connected to a mixing destination. The destination's stream carries
//! one audio track with the sum of all connected inputs.

use super::track::{AudioBlock, AudioFormat, AudioTrackWriter, MediaStream, MediaTrack, TrackKind};
use crate::utils::error::{CaptureError, CaptureResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::task::JoinHandle;

/// Rendering period of the graph
pub const RENDER_QUANTUM: Duration = Duration::from_millis(10);

/// Longest backlog kept per input before old audio is dropped
const MAX_PENDING: Duration = Duration::from_secs(1);

struct SourceNode {
    track: MediaTrack,
    format: AudioFormat,
    receiver: broadcast::Receiver<AudioBlock>,
    // Converted to the graph format
    pending: VecDeque<f32>,
}

/// The shared audio processing graph
pub struct AudioGraph {
    format: AudioFormat,
    closed: Arc<AtomicBool>,
    renderers: Mutex<Vec<JoinHandle<()>>>,
}

impl AudioGraph {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            closed: Arc::new(AtomicBool::new(false)),
            renderers: Mutex::new(Vec::new()),
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Create a mixing destination and start rendering into it
    pub fn create_destination(&self) -> MediaStreamDestination {
        let (track, writer) = MediaTrack::audio("mixed-audio", self.format);
        let inputs = Arc::new(Mutex::new(Vec::new()));

        let handle = tokio::spawn(render_loop(
            self.format,
            inputs.clone(),
            writer,
            self.closed.clone(),
        ));
        self.renderers.lock().push(handle);

        MediaStreamDestination {
            stream: MediaStream::new(vec![track]),
            inputs,
        }
    }

    /// Wrap `track` as a source node and connect it to `destination`
    pub fn connect(
        &self,
        track: &MediaTrack,
        destination: &MediaStreamDestination,
    ) -> CaptureResult<()> {
        if self.is_closed() {
            return Err(CaptureError::Stream("audio graph is closed".to_string()));
        }
        if track.kind() != TrackKind::Audio {
            return Err(CaptureError::Stream(format!(
                "cannot connect {} track '{}' to the audio graph",
                track.kind(),
                track.label()
            )));
        }
        let (format, receiver) = match (track.audio_format(), track.subscribe_audio()) {
            (Some(format), Some(receiver)) => (format, receiver),
            _ => {
                return Err(CaptureError::Stream(format!(
                    "track '{}' has no audio source",
                    track.label()
                )))
            }
        };
        if format.sample_rate != self.format.sample_rate {
            tracing::debug!(
                "Resampling '{}' from {}Hz to {}Hz",
                track.label(),
                format.sample_rate,
                self.format.sample_rate
            );
        }

        destination.inputs.lock().push(SourceNode {
            track: track.clone(),
            format,
            receiver,
            pending: VecDeque::new(),
        });
        tracing::debug!("Connected '{}' to mixer", track.label());
        Ok(())
    }

    /// Stop rendering and release the graph
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for handle in self.renderers.lock().drain(..) {
            handle.abort();
        }
        tracing::debug!("Audio graph closed");
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        self.close();
    }
}

/// The mixing destination node
pub struct MediaStreamDestination {
    stream: MediaStream,
    inputs: Arc<Mutex<Vec<SourceNode>>>,
}

impl MediaStreamDestination {
    /// Stream with the single mixed audio track
    pub fn stream(&self) -> MediaStream {
        self.stream.clone()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.lock().len()
    }
}

async fn render_loop(
    format: AudioFormat,
    inputs: Arc<Mutex<Vec<SourceNode>>>,
    writer: AudioTrackWriter,
    closed: Arc<AtomicBool>,
) {
    let channels = format.channels.max(1) as usize;
    let frames = (format.sample_rate as u64 * RENDER_QUANTUM.as_millis() as u64 / 1000) as usize;
    let max_pending =
        (format.sample_rate as u64 * MAX_PENDING.as_millis() as u64 / 1000) as usize * channels;
    let mut ticker = tokio::time::interval(RENDER_QUANTUM);

    loop {
        ticker.tick().await;
        if closed.load(Ordering::SeqCst) || !writer.track().is_live() {
            break;
        }

        let mut mix = vec![0.0f32; frames * channels];
        {
            let mut nodes = inputs.lock();
            for node in nodes.iter_mut() {
                pull_input(node, format, max_pending);
                let take = node.pending.len().min(frames * channels);
                for (out, sample) in mix.iter_mut().zip(node.pending.drain(..take)) {
                    *out += sample;
                }
            }
        }
        for sample in mix.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        if !writer.push(&mix) {
            break;
        }
    }
    tracing::debug!("Mixer render loop finished");
}

fn pull_input(node: &mut SourceNode, target: AudioFormat, max_pending: usize) {
    loop {
        match node.receiver.try_recv() {
            Ok(block) => {
                let converted = convert_block(&block, node.format, target);
                node.pending.extend(converted);
            }
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(
                    "Mixer input '{}' lagged, dropped {} blocks",
                    node.track.label(),
                    skipped
                );
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    if node.pending.len() > max_pending {
        let excess = node.pending.len() - max_pending;
        node.pending.drain(..excess);
    }
}

/// Convert interleaved samples between channel layouts and sample rates.
///
/// Channels are averaged down or repeated up; the rate is converted by
/// nearest-sample picking.
pub fn convert_block(samples: &[f32], from: AudioFormat, to: AudioFormat) -> Vec<f32> {
    let in_ch = from.channels.max(1) as usize;
    let out_ch = to.channels.max(1) as usize;
    let in_frames = samples.len() / in_ch;
    if in_frames == 0 {
        return Vec::new();
    }

    let out_frames = if from.sample_rate == to.sample_rate || from.sample_rate == 0 {
        in_frames
    } else {
        ((in_frames as u64 * to.sample_rate as u64) / from.sample_rate as u64) as usize
    };

    let mut out = Vec::with_capacity(out_frames * out_ch);
    for i in 0..out_frames {
        let src = if out_frames == in_frames {
            i
        } else {
            ((i as u64 * from.sample_rate as u64) / to.sample_rate.max(1) as u64) as usize
        }
        .min(in_frames - 1);
        let frame = &samples[src * in_ch..src * in_ch + in_ch];

        if in_ch == out_ch {
            out.extend_from_slice(frame);
        } else if out_ch < in_ch {
            let mean = frame.iter().sum::<f32>() / in_ch as f32;
            out.extend(std::iter::repeat(mean).take(out_ch));
        } else {
            for c in 0..out_ch {
                out.push(frame[c % in_ch]);
            }
        }
    }
    out
}
