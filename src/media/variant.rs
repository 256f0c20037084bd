use crate::domain::MediaVariant;

/// Container accepted for the audio artifact (saved as `.m4a`).
pub const AUDIO_MIME_PREFIX: &str = "audio/mp4";

/// Pick the best audio rendition.
///
/// Only `audio/mp4` variants qualify. If any of them is the original audio
/// track, dubbed tracks are ignored. The highest bitrate wins; on a tie the
/// first one listed is kept.
pub fn select_best_audio(variants: &[MediaVariant]) -> Option<&MediaVariant> {
    let audio: Vec<&MediaVariant> = variants
        .iter()
        .filter(|v| v.mime_type.starts_with(AUDIO_MIME_PREFIX))
        .collect();

    let has_original = audio.iter().any(|v| v.is_original_track());

    audio
        .into_iter()
        .filter(|v| !has_original || v.is_original_track())
        .fold(None, |best: Option<&MediaVariant>, v| match best {
            Some(b) if b.bitrate >= v.bitrate => Some(b),
            _ => Some(v),
        })
}
