//! Stream composition

use super::track::MediaStream;

/// Merge the video tracks of `video_source` and the audio tracks of
/// `audio_source` into one stream, video first.
pub fn compose(video_source: &MediaStream, audio_source: &MediaStream) -> MediaStream {
    let mut tracks = video_source.video_tracks();
    tracks.extend(audio_source.audio_tracks());
    MediaStream::new(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{BitmapSurface, Resolution};
    use crate::media::{AudioFormat, MediaTrack, TrackKind};

    #[test]
    fn test_takes_only_matching_kinds() {
        let surface = BitmapSurface::new(Resolution::new(2, 2));
        let (stray_audio, _w1) = MediaTrack::audio("stray", AudioFormat::new(48_000, 1));
        let mut video_tracks = surface.capture_stream(30).tracks().to_vec();
        video_tracks.push(stray_audio.clone());
        let video_source = MediaStream::new(video_tracks);

        let (mixed, _w2) = MediaTrack::audio("mixed", AudioFormat::new(48_000, 2));
        let audio_source = MediaStream::new(vec![mixed.clone()]);

        let composed = compose(&video_source, &audio_source);
        let kinds: Vec<TrackKind> = composed.tracks().iter().map(|t| t.kind()).collect();
        assert_eq!(kinds, vec![TrackKind::Video, TrackKind::Audio]);
        assert!(composed.audio_tracks()[0].same_track(&mixed));
        assert!(!composed.tracks().iter().any(|t| t.same_track(&stray_audio)));
    }

    #[test]
    fn test_stopping_composed_stream_stops_sources() {
        let surface = BitmapSurface::new(Resolution::new(2, 2));
        let video_source = surface.capture_stream(10);
        let (mixed, _w) = MediaTrack::audio("mixed", AudioFormat::new(48_000, 2));
        let audio_source = MediaStream::new(vec![mixed]);

        let composed = compose(&video_source, &audio_source);
        composed.stop_all();
        assert!(!video_source.is_active());
        assert!(!audio_source.is_active());
    }
}
