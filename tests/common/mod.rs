//! In-memory collaborators for driving the pipeline without network access.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use tubechan::app::{Result, TubechanError};
use tubechan::domain::{Feed, FeedItem, FeedSource, MediaInfo, MediaVariant, Thumbnail, Thumbnails};
use tubechan::media::{ByteStream, MediaError, MediaSource};
use tubechan::messenger::{
    Audio, AudioMessage, InputFile, Messenger, Notifier, PhotoMessage, PhotoSize, SentMessage,
    TextMessage,
};
use tubechan::publisher::{ItemPublisher, PublisherSettings};
use tubechan::scheduler::{ChannelScheduler, SchedulerSettings, Shutdown};
use tubechan::source::{FeedDiffEngine, FeedLister, ListingPage};
use tubechan::store::MemoryCursorStore;
use tubechan::transcoder::Transcoder;

pub const CHANNEL: &str = "@channel";
pub const OPERATOR: &str = "ops";
pub const PERFORMER: &str = "The Show";

/// 10 seconds at 8 kbit/s: 10 000 bytes expected.
pub const DURATION_SECS: u64 = 10;
pub const BITRATE: u64 = 8_000;
pub const FULL_SIZE: usize = 10_000;

fn thumb(url: &str) -> Option<Thumbnail> {
    Some(Thumbnail {
        url: url.to_string(),
        width: 0,
        height: 0,
    })
}

pub fn item(id: &str, published_at: &str) -> FeedItem {
    FeedItem {
        id: id.to_string(),
        title: format!("Episode {}", id),
        description: format!("Notes for {}", id),
        published_at: published_at.to_string(),
        thumbnails: Thumbnails {
            medium: thumb(&format!("https://img/{}/medium.jpg", id)),
            maxres: thumb(&format!("https://img/{}/maxres.jpg", id)),
            ..Default::default()
        },
    }
}

pub fn feed(id: &str) -> Feed {
    let mut feed = Feed::new(id, FeedSource::PlaylistId(format!("UU{}", id)));
    feed.label = format!("Feed {}", id);
    feed
}

/// Serves a fixed newest-first listing.
#[derive(Default)]
pub struct FakeLister {
    newest_first: Mutex<Vec<FeedItem>>,
    pub list_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    resolve_error: Mutex<Option<String>>,
}

impl FakeLister {
    /// `items` may be given in any order; they are served newest first.
    pub fn new(mut items: Vec<FeedItem>) -> Self {
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Self {
            newest_first: Mutex::new(items),
            ..Default::default()
        }
    }

    pub fn ambiguous(reason: &str) -> Self {
        let lister = Self::default();
        *lister.resolve_error.lock().unwrap() = Some(reason.to_string());
        lister
    }

    pub fn publish(&self, item: FeedItem) {
        let mut items = self.newest_first.lock().unwrap();
        items.insert(0, item);
    }
}

#[async_trait]
impl FeedLister for FakeLister {
    async fn resolve_playlist(&self, source: &FeedSource) -> Result<String> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.resolve_error.lock().unwrap().clone() {
            return Err(TubechanError::Resolve(reason));
        }
        Ok(format!("UU-{}", source))
    }

    async fn list_page(
        &self,
        _playlist_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<ListingPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let items = self.newest_first.lock().unwrap().clone();
        let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + page_size as usize).min(items.len());
        Ok(ListingPage {
            items: items[start..end].to_vec(),
            next_page_token: (end < items.len()).then(|| end.to_string()),
        })
    }
}

/// Media source with per-item overrides.
#[derive(Default)]
pub struct FakeMedia {
    errors: Mutex<HashMap<String, MediaError>>,
    sizes: Mutex<HashMap<String, usize>>,
    pub opened: AtomicUsize,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_info(&self, item_id: &str, error: MediaError) {
        self.errors.lock().unwrap().insert(item_id.to_string(), error);
    }

    pub fn clear_error(&self, item_id: &str) {
        self.errors.lock().unwrap().remove(item_id);
    }

    /// Serve `size` bytes instead of the full payload.
    pub fn truncate(&self, item_id: &str, size: usize) {
        self.sizes.lock().unwrap().insert(item_id.to_string(), size);
    }
}

#[async_trait]
impl MediaSource for FakeMedia {
    async fn info(&self, item_id: &str) -> Result<MediaInfo> {
        if let Some(error) = self.errors.lock().unwrap().get(item_id) {
            return Err(error.clone().into());
        }
        Ok(MediaInfo {
            duration_secs: DURATION_SECS,
            variants: vec![
                MediaVariant {
                    mime_type: "video/mp4".into(),
                    bitrate: 900_000,
                    track: None,
                    url: format!("https://media/{}/video", item_id),
                },
                MediaVariant {
                    mime_type: "audio/mp4; codecs=\"mp4a.40.5\"".into(),
                    bitrate: BITRATE / 2,
                    track: None,
                    url: format!("https://media/{}/low", item_id),
                },
                MediaVariant {
                    mime_type: "audio/mp4; codecs=\"mp4a.40.2\"".into(),
                    bitrate: BITRATE,
                    track: None,
                    url: format!("https://media/{}/audio", item_id),
                },
            ],
        })
    }

    async fn open(&self, variant: &MediaVariant) -> Result<ByteStream> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        assert!(variant.url.ends_with("/audio"), "picked {}", variant.url);

        let item_id = variant.url.split('/').nth(3).unwrap_or_default().to_string();
        let size = self
            .sizes
            .lock()
            .unwrap()
            .get(&item_id)
            .copied()
            .unwrap_or(FULL_SIZE);

        let chunks: Vec<std::io::Result<Vec<u8>>> = (0..size)
            .step_by(1_000)
            .map(|start| Ok(vec![7u8; (size - start).min(1_000)]))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        Ok(url.as_bytes().to_vec())
    }
}

/// One recorded messenger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub chat_id: String,
    pub action: String,
}

/// Records every call and answers like the Bot API would.
#[derive(Default)]
pub struct RecordingMessenger {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    fail_on: Mutex<Option<String>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call whose action starts with `prefix`.
    pub fn fail_on(&self, prefix: Option<&str>) {
        *self.fail_on.lock().unwrap() = prefix.map(String::from);
    }

    pub fn channel_actions(&self) -> Vec<String> {
        self.actions_for(CHANNEL)
    }

    pub fn operator_messages(&self) -> Vec<String> {
        self.actions_for(OPERATOR)
    }

    fn actions_for(&self, chat_id: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.chat_id == chat_id)
            .map(|c| c.action.clone())
            .collect()
    }

    fn record(&self, chat_id: &str, action: String) -> Result<i64> {
        if let Some(prefix) = self.fail_on.lock().unwrap().as_deref() {
            if action.starts_with(prefix) {
                return Err(TubechanError::Telegram {
                    method: prefix.to_string(),
                    description: "Too Many Requests: retry after 5".into(),
                });
            }
        }
        self.calls.lock().unwrap().push(Call {
            chat_id: chat_id.to_string(),
            action,
        });
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 100)
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: &str, message: &TextMessage) -> Result<SentMessage> {
        let message_id = self.record(chat_id, format!("text:{}", message.text))?;
        Ok(SentMessage {
            message_id,
            ..Default::default()
        })
    }

    async fn send_photo(&self, chat_id: &str, message: PhotoMessage) -> Result<SentMessage> {
        match message.photo {
            InputFile::Upload { name, .. } => {
                let message_id = self.record(chat_id, format!("photo-upload:{}", name))?;
                Ok(SentMessage {
                    message_id,
                    photo: vec![
                        PhotoSize {
                            file_id: format!("{}-small", name),
                            width: 90,
                            height: 51,
                        },
                        PhotoSize {
                            file_id: format!("{}-big", name),
                            width: 1280,
                            height: 720,
                        },
                    ],
                    audio: None,
                })
            }
            InputFile::Reference(file_id) => {
                let caption = message.caption.unwrap_or_default();
                let message_id = self.record(chat_id, format!("photo:{}:{}", file_id, caption))?;
                Ok(SentMessage {
                    message_id,
                    ..Default::default()
                })
            }
        }
    }

    async fn send_audio(&self, chat_id: &str, message: AudioMessage) -> Result<SentMessage> {
        match message.audio {
            InputFile::Upload { name, bytes } => {
                let action = format!(
                    "audio-upload:{}:{}:{}",
                    name,
                    bytes.len(),
                    message.performer.unwrap_or_default()
                );
                let message_id = self.record(chat_id, action)?;
                Ok(SentMessage {
                    message_id,
                    photo: Vec::new(),
                    audio: Some(Audio {
                        file_id: format!("{}-audio", name),
                        duration: message.duration_secs.unwrap_or_default(),
                    }),
                })
            }
            InputFile::Reference(file_id) => {
                let caption = message.caption.unwrap_or_default();
                let message_id = self.record(chat_id, format!("audio:{}:{}", file_id, caption))?;
                Ok(SentMessage {
                    message_id,
                    ..Default::default()
                })
            }
        }
    }

    async fn delete_message(&self, chat_id: &str, message_id: i64) -> Result<()> {
        self.record(chat_id, format!("delete:{}", message_id))?;
        Ok(())
    }
}

/// Copies the source file to the destination, or fails for chosen items.
#[derive(Default)]
pub struct FakeTranscoder {
    failing: Mutex<HashSet<String>>,
    pub runs: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, item_id: &str, fail: bool) {
        let mut failing = self.failing.lock().unwrap();
        if fail {
            failing.insert(item_id.to_string());
        } else {
            failing.remove(item_id);
        }
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, src: &Path, dst: &Path) -> Result<()> {
        self.runs
            .lock()
            .unwrap()
            .push((src.to_path_buf(), dst.to_path_buf()));

        let name = src
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let fails = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|id| name.contains(&format!(".{}.", id)));
        if fails {
            return Err(TubechanError::Transcode("exit status: 1".into()));
        }

        let bytes = tokio::fs::read(src).await?;
        tokio::fs::write(dst, &bytes[..bytes.len() / 2]).await?;
        Ok(())
    }

    fn bitrate_kbps(&self) -> u32 {
        48
    }
}

/// All fakes wired together.
pub struct Harness {
    pub lister: Arc<FakeLister>,
    pub media: Arc<FakeMedia>,
    pub messenger: Arc<RecordingMessenger>,
    pub transcoder: Option<Arc<FakeTranscoder>>,
    pub store: Arc<MemoryCursorStore>,
    pub shutdown: Shutdown,
    pub work_dir: tempfile::TempDir,
    pub page_size: u32,
    pub backfill_limit: usize,
    pub item_interval: Duration,
    pub burst_threshold: usize,
}

impl Harness {
    pub fn new(items: Vec<FeedItem>) -> Self {
        Self::with_lister(FakeLister::new(items))
    }

    pub fn with_lister(lister: FakeLister) -> Self {
        Self {
            lister: Arc::new(lister),
            media: Arc::new(FakeMedia::new()),
            messenger: Arc::new(RecordingMessenger::new()),
            transcoder: Some(Arc::new(FakeTranscoder::new())),
            store: Arc::new(MemoryCursorStore::new()),
            shutdown: Shutdown::new(),
            work_dir: tempfile::tempdir().unwrap(),
            page_size: 2,
            backfill_limit: 50,
            item_interval: Duration::from_secs(60),
            burst_threshold: 10,
        }
    }

    pub fn without_transcoder(mut self) -> Self {
        self.transcoder = None;
        self
    }

    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.messenger.clone(), OPERATOR)
    }

    pub fn diff(&self) -> FeedDiffEngine {
        FeedDiffEngine::new(
            self.lister.clone(),
            self.store.clone(),
            self.page_size,
            self.backfill_limit,
        )
    }

    pub fn publisher(&self) -> ItemPublisher {
        let transcoder = self
            .transcoder
            .clone()
            .map(|t| t as Arc<dyn Transcoder + Send + Sync>);

        ItemPublisher::new(
            self.media.clone(),
            self.messenger.clone(),
            transcoder,
            self.store.clone(),
            self.notifier(),
            PublisherSettings {
                chat_id: CHANNEL.to_string(),
                performer: PERFORMER.to_string(),
                work_dir: self.work_dir.path().to_path_buf(),
                download_rate_multiplier: 0,
            },
        )
    }

    pub fn scheduler(&self, feeds: Vec<Feed>) -> ChannelScheduler {
        ChannelScheduler::new(
            feeds,
            self.diff(),
            self.publisher(),
            self.store.clone(),
            self.notifier(),
            SchedulerSettings {
                interval: Duration::from_secs(3600),
                item_interval: self.item_interval,
                burst_threshold: self.burst_threshold,
            },
            self.shutdown.clone(),
        )
    }

    /// Cursor the store holds for `feed_id`, as a plain string.
    pub fn stored_cursor(&self, feed_id: &str) -> String {
        self.store
            .document()
            .feeds
            .get(feed_id)
            .map(|s| s.cursor.as_str().to_string())
            .unwrap_or_default()
    }

    /// Every cursor value ever written for `feed_id`, in write order.
    pub fn cursor_writes(&self, feed_id: &str) -> Vec<String> {
        self.store
            .writes()
            .into_iter()
            .filter(|(id, _)| id == feed_id)
            .map(|(_, s)| s.cursor.as_str().to_string())
            .collect()
    }
}
