//! Encoding configuration negotiation

use super::traits::{EncoderHost, RecorderOptions};

/// Fallback mime types probed after the preferred codec, in order
pub const FALLBACK_MIME_TYPES: [&str; 4] = [
    "video/webm;codecs=vp8,opus",
    "video/webm;codecs=h264",
    "video/webm",
    "video/mp4",
];

/// Ordered candidate configurations, duplicates removed
pub fn candidate_options(preferred_codec: &str, bits_per_second: u32) -> Vec<RecorderOptions> {
    let mut candidates: Vec<RecorderOptions> = Vec::with_capacity(FALLBACK_MIME_TYPES.len() + 1);
    for mime in std::iter::once(preferred_codec).chain(FALLBACK_MIME_TYPES) {
        let mime = mime.trim();
        if mime.is_empty() {
            continue;
        }
        if candidates.iter().any(|c| c.mime_type.as_deref() == Some(mime)) {
            continue;
        }
        candidates.push(RecorderOptions::new(mime, bits_per_second));
    }
    candidates
}

/// First candidate the host supports, or None when the host defaults apply
pub fn negotiate(
    host: &dyn EncoderHost,
    preferred_codec: &str,
    bits_per_second: u32,
) -> Option<RecorderOptions> {
    let chosen = candidate_options(preferred_codec, bits_per_second)
        .into_iter()
        .find(|option| {
            option
                .mime_type
                .as_deref()
                .map(|mime| host.is_type_supported(mime))
                .unwrap_or(false)
        });

    match &chosen {
        Some(option) => tracing::info!("Negotiated recorder configuration: {:?}", option),
        None => tracing::warn!("No candidate mime type supported, using recorder defaults"),
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeEncoderHost;

    #[test]
    fn test_candidates_start_with_preferred_and_dedupe() {
        let candidates = candidate_options("video/webm;codecs=vp8,opus", 2_000_000);
        let mimes: Vec<&str> = candidates
            .iter()
            .filter_map(|c| c.mime_type.as_deref())
            .collect();
        assert_eq!(
            mimes,
            vec![
                "video/webm;codecs=vp8,opus",
                "video/webm;codecs=h264",
                "video/webm",
                "video/mp4"
            ]
        );
        assert!(candidates.iter().all(|c| c.bits_per_second == Some(2_000_000)));
    }

    #[test]
    fn test_custom_preferred_codec_goes_first() {
        let candidates = candidate_options("video/webm;codecs=vp9", 1_000_000);
        assert_eq!(candidates.len(), 5);
        assert_eq!(
            candidates[0].mime_type.as_deref(),
            Some("video/webm;codecs=vp9")
        );
    }

    #[test]
    fn test_picks_first_supported() {
        let host = FakeEncoderHost::supporting(&["video/mp4", "video/webm"], false);
        let chosen = negotiate(host.as_ref(), "video/webm;codecs=vp9", 500_000).unwrap();
        assert_eq!(chosen.mime_type.as_deref(), Some("video/webm"));
        assert_eq!(chosen.bits_per_second, Some(500_000));
    }

    #[test]
    fn test_none_when_nothing_supported() {
        let host = FakeEncoderHost::supporting(&[], true);
        assert!(negotiate(host.as_ref(), "video/webm", 1).is_none());
    }
}
