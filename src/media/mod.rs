//! Media primitives
//!
//! Tracks and streams, the audio mixing graph and stream composition.

pub mod composer;
pub mod mixer;
pub mod track;

pub use composer::compose;
pub use mixer::{AudioGraph, MediaStreamDestination};
pub use track::{
    AudioBlock, AudioFormat, AudioTap, AudioTrackWriter, MediaStream, MediaTrack, TrackKind,
    TrackState,
};
