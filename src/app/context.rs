use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::app::error::{Result, TubechanError};
use crate::config::Config;
use crate::domain::Feed;
use crate::media::{MediaSource, YtDlpMedia};
use crate::messenger::{Messenger, Notifier, TelegramMessenger};
use crate::publisher::{ItemPublisher, PublisherSettings};
use crate::source::{FeedDiffEngine, FeedLister, YouTubeLister};
use crate::store::{CursorStore, FileCursorStore, HttpCursorStore};
use crate::transcoder::{FfmpegTranscoder, Transcoder};

/// All collaborators, built once from the loaded configuration.
pub struct AppContext {
    pub config: Config,
    pub lister: Arc<dyn FeedLister + Send + Sync>,
    pub media: Arc<dyn MediaSource + Send + Sync>,
    pub messenger: Arc<dyn Messenger + Send + Sync>,
    pub transcoder: Option<Arc<dyn Transcoder + Send + Sync>>,
    pub store: Arc<dyn CursorStore + Send + Sync>,
    pub notifier: Notifier,
}

impl AppContext {
    pub fn from_config(config: Config) -> Result<Self> {
        let lister: Arc<dyn FeedLister + Send + Sync> = Arc::new(YouTubeLister::new(
            &config.youtube.api_url,
            config.youtube.api_key.clone(),
        )?);
        let media: Arc<dyn MediaSource + Send + Sync> =
            Arc::new(YtDlpMedia::new(config.youtube.yt_dlp_path.clone())?);
        let messenger: Arc<dyn Messenger + Send + Sync> = Arc::new(TelegramMessenger::new(
            &config.telegram.api_url,
            &config.telegram.token,
        )?);

        let transcoder = match (&config.transcoder.path, config.transcoder.enabled()) {
            (Some(path), true) => Some(Arc::new(FfmpegTranscoder::new(
                path.clone(),
                config.transcoder.bitrate_kbps,
            )) as Arc<dyn Transcoder + Send + Sync>),
            _ => None,
        };

        let store = Self::build_store(&config)?;
        let notifier = Notifier::new(messenger.clone(), config.telegram.operator_chat_id.clone());

        Ok(Self {
            config,
            lister,
            media,
            messenger,
            transcoder,
            store,
            notifier,
        })
    }

    /// Remote document if a URL is configured, otherwise a local file.
    fn build_store(config: &Config) -> Result<Arc<dyn CursorStore + Send + Sync>> {
        if let Some(url) = &config.store.url {
            info!("Cursor store: {}", url);
            return Ok(Arc::new(HttpCursorStore::new(
                url.clone(),
                config.store.token.clone(),
            )?));
        }

        let path = match &config.store.path {
            Some(p) => p.clone(),
            None => Self::default_state_path()?,
        };
        info!("Cursor store: {}", path.display());
        Ok(Arc::new(FileCursorStore::new(path)))
    }

    fn default_state_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| TubechanError::Config("Could not find data directory".into()))?;
        Ok(data_dir.join("tubechan").join("state.json"))
    }

    pub fn feeds(&self) -> Result<Vec<Feed>> {
        self.config
            .feeds()
            .map_err(|e| TubechanError::Config(e.to_string()))
    }

    pub fn diff_engine(&self) -> FeedDiffEngine {
        FeedDiffEngine::new(
            self.lister.clone(),
            self.store.clone(),
            self.config.page_size,
            self.config.backfill_limit(),
        )
    }

    pub fn publisher(&self) -> ItemPublisher {
        ItemPublisher::new(
            self.media.clone(),
            self.messenger.clone(),
            self.transcoder.clone(),
            self.store.clone(),
            self.notifier.clone(),
            PublisherSettings::from_config(&self.config),
        )
    }
}
