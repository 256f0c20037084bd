//! Per-item delivery.
//!
//! [`ItemPublisher::publish`] walks one item through the states named by
//! [`Stage`]: normalize the title, look up media info, pick the audio
//! variant, download it at a paced rate, transcode, fetch artwork, send the
//! message sequence and finally commit the feed cursor. Each state is its own
//! method returning [`Step`]; an `Err` ends the run with that outcome.
//!
//! The cursor is written last, so a crash anywhere before it leads to the
//! item being delivered again on the next run.

pub mod caption;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, error, info, warn};

use crate::app::TubechanError;
use crate::config::Config;
use crate::domain::{DeliveryOutcome, Feed, FeedItem, MediaInfo, MediaVariant, Stage};
use crate::media::{select_best_audio, MediaError, MediaSource, ThrottledStream};
use crate::messenger::{AudioMessage, InputFile, Messenger, Notifier, PhotoMessage, TextMessage};
use crate::normalizer::{split_paragraphs, TitleNormalizer, MESSAGE_CEILING};
use crate::store::{CursorStore, FeedState};
use crate::transcoder::Transcoder;

/// Not-yet-playable items older than this are reported to the operator.
const OVERDUE_AFTER_HOURS: i64 = 24;

/// Outcome of one state. `Err` stops the item.
pub type Step<T> = std::result::Result<T, DeliveryOutcome>;

#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub chat_id: String,
    pub performer: String,
    pub work_dir: PathBuf,
    /// Download pace as a multiple of the variant bitrate; 0 disables pacing.
    pub download_rate_multiplier: u64,
}

impl PublisherSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chat_id: config.telegram.chat_id.clone(),
            performer: config.telegram.performer.clone(),
            work_dir: config.work_dir(),
            download_rate_multiplier: config.download_rate_multiplier,
        }
    }
}

/// Cover and preview images of an item.
#[derive(Debug, Default)]
pub struct Artwork {
    pub cover: Option<Vec<u8>>,
    pub preview: Option<Vec<u8>>,
}

/// Transcoded (or original) audio ready for upload.
#[derive(Debug)]
pub struct AudioArtifact {
    pub name: String,
    pub bytes: Vec<u8>,
}

pub struct ItemPublisher {
    media: Arc<dyn MediaSource + Send + Sync>,
    messenger: Arc<dyn Messenger + Send + Sync>,
    transcoder: Option<Arc<dyn Transcoder + Send + Sync>>,
    store: Arc<dyn CursorStore + Send + Sync>,
    notifier: Notifier,
    settings: PublisherSettings,
}

impl ItemPublisher {
    pub fn new(
        media: Arc<dyn MediaSource + Send + Sync>,
        messenger: Arc<dyn Messenger + Send + Sync>,
        transcoder: Option<Arc<dyn Transcoder + Send + Sync>>,
        store: Arc<dyn CursorStore + Send + Sync>,
        notifier: Notifier,
        settings: PublisherSettings,
    ) -> Self {
        Self {
            media,
            messenger,
            transcoder,
            store,
            notifier,
            settings,
        }
    }

    /// Deliver one item and, on success, move the feed's cursor to it.
    pub async fn publish(&self, feed: &mut Feed, item: &FeedItem) -> DeliveryOutcome {
        let outcome = match self.deliver(feed, item).await {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(outcome) => outcome,
        };

        let label = feed.display_title().to_string();
        match &outcome {
            DeliveryOutcome::Delivered => {
                info!(feed = %label, item = %item.id, cursor = %feed.cursor, "delivered");
            }
            DeliveryOutcome::SkippedPermanently(reason) => {
                warn!(feed = %label, item = %item.id, "skipped for good: {}", reason);
            }
            DeliveryOutcome::SkippedTransiently(reason) => {
                info!(feed = %label, item = %item.id, "not ready yet: {}", reason);
                if is_overdue(item, Utc::now()) {
                    self.notifier
                        .notify(&format!(
                            "{}: {} still not playable {}h after publishing: {}",
                            label,
                            item.short_link(),
                            OVERDUE_AFTER_HOURS,
                            reason
                        ))
                        .await;
                }
            }
            DeliveryOutcome::Failed { stage, error } => {
                error!(feed = %label, item = %item.id, %stage, "delivery failed: {}", error);
                self.notifier
                    .notify(&format!("{}: {} {}", label, item.short_link(), outcome))
                    .await;
            }
        }

        outcome
    }

    async fn deliver(&self, feed: &mut Feed, item: &FeedItem) -> Step<()> {
        let title = normalize(feed, item)?;

        let info = match self.fetch_info(item).await {
            Ok(info) => info,
            Err(DeliveryOutcome::SkippedPermanently(reason)) => {
                self.announce_unavailable(&title, item, &reason).await?;
                self.commit_cursor(feed, item).await?;
                return Err(DeliveryOutcome::SkippedPermanently(reason));
            }
            Err(outcome) => return Err(outcome),
        };

        let variant = select_variant(&info)?;
        let audio = self.download(&info, &variant).await?;
        let audio = self.transcode(item, audio).await?;
        let artwork = self.fetch_thumbnail(feed, item).await?;

        self.publish_sequence(feed, item, &title, &info, audio, artwork)
            .await?;
        self.commit_cursor(feed, item).await
    }

    async fn fetch_info(&self, item: &FeedItem) -> Step<MediaInfo> {
        match self.media.info(&item.id).await {
            Ok(info) => Ok(info),
            Err(TubechanError::Media(MediaError::NotPlayable { status, reason })) => Err(
                DeliveryOutcome::SkippedTransiently(format!("{}: {}", status, reason)),
            ),
            Err(TubechanError::Media(MediaError::Restricted(reason))) => {
                Err(DeliveryOutcome::SkippedPermanently(reason))
            }
            Err(e) => Err(DeliveryOutcome::failed(Stage::FetchInfo, e)),
        }
    }

    async fn download(&self, info: &MediaInfo, variant: &MediaVariant) -> Step<Vec<u8>> {
        let failed = |e: TubechanError| DeliveryOutcome::failed(Stage::Download, e);

        let stream = self.media.open(variant).await.map_err(failed)?;
        let rate_bps = variant
            .bitrate
            .saturating_mul(self.settings.download_rate_multiplier);

        let bytes = ThrottledStream::new(stream, rate_bps)
            .read_to_end()
            .await
            .map_err(|e| failed(e.into()))?;

        debug!(
            bytes = bytes.len(),
            bitrate = variant.bitrate,
            duration = info.duration_secs,
            "downloaded audio"
        );
        check_integrity(info.duration_secs, variant.bitrate, bytes.len()).map_err(failed)?;
        Ok(bytes)
    }

    /// Re-encodes through a file pair in the work dir. Both files are removed
    /// whatever happens.
    async fn transcode(&self, item: &FeedItem, audio: Vec<u8>) -> Step<AudioArtifact> {
        let stem = item.artifact_stem();
        let Some(transcoder) = &self.transcoder else {
            return Ok(AudioArtifact {
                name: format!("{}.m4a", stem),
                bytes: audio,
            });
        };

        let failed = |e: TubechanError| DeliveryOutcome::failed(Stage::Transcode, e);
        let name = format!("{}.{}k.m4a", stem, transcoder.bitrate_kbps());
        let src = self.settings.work_dir.join(format!("{}.m4a", stem));
        let dst = self.settings.work_dir.join(&name);

        tokio::fs::create_dir_all(&self.settings.work_dir)
            .await
            .map_err(|e| failed(e.into()))?;
        tokio::fs::write(&src, &audio)
            .await
            .map_err(|e| failed(e.into()))?;
        drop(audio);

        // leftover from an interrupted run; ffmpeg will not overwrite it
        remove_artifact(&dst).await;
        let result = transcoder.transcode(&src, &dst).await;
        remove_artifact(&src).await;

        if let Err(e) = result {
            remove_artifact(&dst).await;
            return Err(failed(e));
        }

        let bytes = tokio::fs::read(&dst).await.map_err(|e| failed(e.into()));
        remove_artifact(&dst).await;
        Ok(AudioArtifact { name, bytes: bytes? })
    }

    async fn fetch_thumbnail(&self, feed: &Feed, item: &FeedItem) -> Step<Artwork> {
        let failed = |e: TubechanError| DeliveryOutcome::failed(Stage::FetchThumbnail, e);
        let mut artwork = Artwork::default();

        if !feed.options.skip_cover {
            let url = item
                .thumbnails
                .cover()
                .ok_or_else(|| failed(TubechanError::Other("no usable cover thumbnail".into())))?;
            artwork.cover = Some(self.media.fetch_image(url).await.map_err(failed)?);
        }

        if let Some(url) = item.thumbnails.preview() {
            artwork.preview = Some(self.media.fetch_image(url).await.map_err(failed)?);
        }

        Ok(artwork)
    }

    /// Steps a to e: upload cover and audio as throwaway messages to obtain
    /// reusable file ids, then post the permanent cover, audio and
    /// description messages.
    async fn publish_sequence(
        &self,
        feed: &Feed,
        item: &FeedItem,
        title: &str,
        info: &MediaInfo,
        audio: AudioArtifact,
        artwork: Artwork,
    ) -> Step<()> {
        let failed = |e: TubechanError| DeliveryOutcome::failed(Stage::Publish, e);
        let chat = self.settings.chat_id.as_str();

        let cover_id = match artwork.cover {
            Some(bytes) => {
                let upload = PhotoMessage {
                    photo: InputFile::Upload {
                        name: format!("{}.jpg", item.artifact_stem()),
                        bytes,
                    },
                    caption: None,
                };
                let sent = self.messenger.send_photo(chat, upload).await.map_err(failed)?;
                let file_id = sent
                    .largest_photo()
                    .map(|p| p.file_id.clone())
                    .ok_or_else(|| failed(missing_file_id("sendPhoto")))?;
                self.messenger
                    .delete_message(chat, sent.message_id)
                    .await
                    .map_err(failed)?;
                Some(file_id)
            }
            None => None,
        };

        let upload = AudioMessage {
            audio: InputFile::Upload {
                name: audio.name,
                bytes: audio.bytes,
            },
            caption: None,
            performer: Some(self.settings.performer.clone()).filter(|p| !p.is_empty()),
            title: Some(title.to_string()),
            duration_secs: Some(info.duration_secs),
            thumbnail: artwork.preview,
        };
        let sent = self.messenger.send_audio(chat, upload).await.map_err(failed)?;
        let audio_id = sent
            .audio
            .as_ref()
            .map(|a| a.file_id.clone())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| failed(missing_file_id("sendAudio")))?;
        self.messenger
            .delete_message(chat, sent.message_id)
            .await
            .map_err(failed)?;

        if let Some(file_id) = cover_id {
            let cover = PhotoMessage {
                photo: InputFile::Reference(file_id),
                caption: Some(caption::cover_caption(title)),
            };
            self.messenger.send_photo(chat, cover).await.map_err(failed)?;
        }

        let text = caption::audio_caption(title, &self.settings.performer, item, info.duration_secs);
        self.messenger
            .send_audio(chat, AudioMessage::reference(audio_id, text))
            .await
            .map_err(failed)?;

        if !feed.options.skip_description {
            for chunk in split_paragraphs(&item.description, MESSAGE_CEILING) {
                if chunk.trim().is_empty() {
                    continue;
                }
                self.messenger
                    .send_text(chat, &TextMessage::plain(chunk))
                    .await
                    .map_err(failed)?;
            }
        }

        Ok(())
    }

    async fn announce_unavailable(&self, title: &str, item: &FeedItem, reason: &str) -> Step<()> {
        let notice = TextMessage::plain(caption::unavailable_notice(title, item, reason));
        self.messenger
            .send_text(&self.settings.chat_id, &notice)
            .await
            .map_err(|e| DeliveryOutcome::failed(Stage::Publish, e))?;
        Ok(())
    }

    /// Persist the item's timestamp as the feed cursor. The in-memory cursor
    /// follows only once the store has accepted it.
    async fn commit_cursor(&self, feed: &mut Feed, item: &FeedItem) -> Step<()> {
        let mut next = feed.cursor.clone();
        if !next.advance(&item.published_at) {
            debug!(
                feed = %feed.display_title(),
                cursor = %feed.cursor,
                published_at = %item.published_at,
                "cursor not advanced"
            );
            return Ok(());
        }

        let state = FeedState {
            cursor: next.clone(),
            playlist_id: feed.playlist_id.clone(),
        };
        self.store
            .put(&feed.id, &state)
            .await
            .map_err(|e| DeliveryOutcome::failed(Stage::CommitCursor, e))?;

        feed.cursor = next;
        Ok(())
    }
}

fn normalize(feed: &Feed, item: &FeedItem) -> Step<String> {
    let normalizer = TitleNormalizer::from_options(&feed.options)
        .map_err(|e| DeliveryOutcome::failed(Stage::Normalize, e))?;
    Ok(normalizer.normalize(&item.title))
}

fn select_variant(info: &MediaInfo) -> Step<MediaVariant> {
    select_best_audio(&info.variants).cloned().ok_or_else(|| {
        DeliveryOutcome::failed(
            Stage::SelectVariant,
            MediaError::Unavailable(format!(
                "no audio variant among {} formats",
                info.variants.len()
            )),
        )
    })
}

/// Rejects a download smaller than half of what duration and bitrate
/// promise. Without a duration or bitrate there is nothing to check.
pub fn check_integrity(duration_secs: u64, bitrate: u64, actual: usize) -> Result<(), TubechanError> {
    let expected = duration_secs.saturating_mul(bitrate) / 8;
    let actual = actual as u64;
    if expected > 0 && actual.saturating_mul(2) < expected {
        return Err(TubechanError::Integrity { expected, actual });
    }
    Ok(())
}

/// Whether an item has been published for longer than the grace period.
pub fn is_overdue(item: &FeedItem, now: DateTime<Utc>) -> bool {
    item.published()
        .map(|at| now - at > ChronoDuration::hours(OVERDUE_AFTER_HOURS))
        .unwrap_or(false)
}

fn missing_file_id(method: &str) -> TubechanError {
    TubechanError::Telegram {
        method: method.to_string(),
        description: "response carries no file id".to_string(),
    }
}

async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_integrity_accepts_full_download() {
        // 10 minutes at 128 kbit/s is 9.6 MB
        assert!(check_integrity(600, 128_000, 9_600_000).is_ok());
        assert!(check_integrity(600, 128_000, 4_800_000).is_ok());
    }

    #[test]
    fn test_integrity_rejects_truncated_download() {
        match check_integrity(600, 128_000, 4_799_999) {
            Err(TubechanError::Integrity { expected, actual }) => {
                assert_eq!(expected, 9_600_000);
                assert_eq!(actual, 4_799_999);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_integrity_without_expectation() {
        assert!(check_integrity(0, 128_000, 0).is_ok());
        assert!(check_integrity(600, 0, 10).is_ok());
    }

    #[test]
    fn test_overdue() {
        let item = FeedItem::new("a", "2024-03-01T10:00:00Z");
        let day_later = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 1).unwrap();

        assert!(!is_overdue(&item, day_later));
        assert!(is_overdue(&item, after));
        assert!(!is_overdue(&FeedItem::new("b", "soon"), after));
    }

    #[test]
    fn test_select_variant_without_audio_fails() {
        let info = MediaInfo {
            duration_secs: 10,
            variants: vec![MediaVariant {
                mime_type: "video/mp4".into(),
                bitrate: 1_000_000,
                track: None,
                url: String::new(),
            }],
        };
        match select_variant(&info) {
            Err(DeliveryOutcome::Failed { stage, .. }) => assert_eq!(stage, Stage::SelectVariant),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_bad_title_pattern_fails_normalize() {
        let mut feed = Feed::new("f", crate::domain::FeedSource::PlaylistId("PL".into()));
        feed.options.title_clean = Some("(".into());
        let item = FeedItem::new("a", "2024-03-01T10:00:00Z");

        match normalize(&feed, &item) {
            Err(DeliveryOutcome::Failed { stage, .. }) => assert_eq!(stage, Stage::Normalize),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
