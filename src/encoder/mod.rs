//! Encoding
//!
//! Recorder negotiation, chunked encoder sessions and the ffmpeg backend.

pub mod ffmpeg;
pub mod negotiate;
pub mod session;
pub mod traits;

pub use ffmpeg::{FfmpegEncoderHost, OutputFormat};
pub use negotiate::{candidate_options, negotiate, FALLBACK_MIME_TYPES};
pub use session::{Artifact, ChunkBuffer, EncoderSession, EncoderState};
pub use traits::{
    container_of, EncoderBackend, EncoderHost, RecorderEvent, RecorderEventSender, RecorderOptions,
};
