//! Configuration management for tubechan.
//!
//! Configuration is read once at startup from `~/.config/tubechan/config.toml`
//! (or the path given on the command line / in `TUBECHAN_CONFIG`). If the file
//! doesn't exist, a default configuration with comments is created and the
//! caller is told to fill in the required settings.

pub mod duration;

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::domain::{Cursor, Feed, FeedOptions, FeedSource};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const DEFAULT_BURST_THRESHOLD: usize = 10;

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Time between the starts of two sync cycles.
    #[serde(deserialize_with = "duration::deserialize")]
    pub interval: Duration,
    /// Pause between items when a feed has a backlog.
    #[serde(deserialize_with = "duration::deserialize")]
    pub item_interval: Duration,
    /// A feed backlog larger than this turns on `item_interval` pauses.
    pub burst_threshold: usize,
    /// Items requested per listing page.
    pub page_size: u32,
    /// Most items collected for a feed with no cursor yet.
    pub backfill_limit: Option<usize>,
    /// Directory for temporary audio artifacts.
    pub work_dir: Option<PathBuf>,
    /// Download pace as a multiple of the variant's nominal bitrate. 0 disables pacing.
    pub download_rate_multiplier: u64,
    pub telegram: TelegramConfig,
    pub youtube: YouTubeConfig,
    pub transcoder: TranscoderConfig,
    pub store: StoreConfig,
    pub feeds: Vec<FeedConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            item_interval: Duration::from_secs(60),
            burst_threshold: DEFAULT_BURST_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
            backfill_limit: None,
            work_dir: None,
            download_rate_multiplier: 4,
            telegram: TelegramConfig::default(),
            youtube: YouTubeConfig::default(),
            transcoder: TranscoderConfig::default(),
            store: StoreConfig::default(),
            feeds: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_url: String,
    pub token: String,
    /// Channel the items are published to.
    pub chat_id: String,
    /// Chat that receives failure reports.
    pub operator_chat_id: String,
    /// Performer shown on audio messages.
    pub performer: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.telegram.org".to_string(),
            token: String::new(),
            chat_id: String::new(),
            operator_chat_id: String::new(),
            performer: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    pub api_url: String,
    pub api_key: String,
    pub yt_dlp_path: PathBuf,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_url: "https://www.googleapis.com/youtube/v3".to_string(),
            api_key: String::new(),
            yt_dlp_path: PathBuf::from("yt-dlp"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub path: Option<PathBuf>,
    pub bitrate_kbps: u32,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("ffmpeg")),
            bitrate_kbps: 60,
        }
    }
}

impl TranscoderConfig {
    pub fn enabled(&self) -> bool {
        self.bitrate_kbps > 0
            && self
                .path
                .as_ref()
                .map(|p| !p.as_os_str().is_empty())
                .unwrap_or(false)
    }
}

/// Where cursors are persisted. `url` wins over `path`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: Option<Url>,
    pub token: Option<String>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub id: String,
    pub label: String,
    pub username: Option<String>,
    pub channel_id: Option<String>,
    pub playlist_id: Option<String>,
    /// Initial cursor, used until the store has one.
    pub cursor: Option<String>,
    #[serde(flatten)]
    pub options: FeedOptions,
}

impl FeedConfig {
    pub fn source(&self) -> Result<FeedSource, ConfigError> {
        let sources = [
            self.username.clone().map(FeedSource::Username),
            self.channel_id.clone().map(FeedSource::ChannelId),
            self.playlist_id.clone().map(FeedSource::PlaylistId),
        ];
        let mut given = sources.into_iter().flatten().filter(|s| match s {
            FeedSource::Username(v) | FeedSource::ChannelId(v) | FeedSource::PlaylistId(v) => {
                !v.trim().is_empty()
            }
        });

        match (given.next(), given.next()) {
            (Some(source), None) => Ok(source),
            (None, _) => Err(ConfigError::Invalid(format!(
                "feed `{}` needs one of username, channel_id or playlist_id",
                self.id
            ))),
            (Some(_), Some(_)) => Err(ConfigError::Invalid(format!(
                "feed `{}` has more than one of username, channel_id, playlist_id",
                self.id
            ))),
        }
    }

    pub fn to_feed(&self) -> Result<Feed, ConfigError> {
        let mut feed = Feed::new(self.id.clone(), self.source()?);
        feed.label = self.label.clone();
        feed.options = self.options.clone();
        if let Some(cursor) = &self.cursor {
            feed.cursor = Cursor::new(cursor.clone());
        }
        Ok(feed)
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// Environment overrides are applied and the result is validated, so a
    /// returned config is ready to run.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Err(ConfigError::Invalid(format!(
                "created a default config at {}; fill in the telegram, youtube and feeds sections",
                config_path.display()
            )));
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })?;

        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;

        Ok(config)
    }

    /// Get the default config file path: `~/.config/tubechan/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var("TUBECHAN_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("tubechan").join("config.toml"))
    }

    /// Secrets can live in the environment instead of the file.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(token) = non_empty("TUBECHAN_TELEGRAM_TOKEN") {
            self.telegram.token = token;
        }
        if let Some(key) = non_empty("TUBECHAN_YOUTUBE_KEY") {
            self.youtube.api_key = key;
        }
        if let Some(token) = non_empty("TUBECHAN_STORE_TOKEN") {
            self.store.token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("telegram.token", &self.telegram.token),
            ("telegram.chat_id", &self.telegram.chat_id),
            ("telegram.operator_chat_id", &self.telegram.operator_chat_id),
            ("youtube.api_key", &self.youtube.api_key),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        if self.interval.is_zero() {
            return Err(ConfigError::Invalid("interval must be positive".into()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive".into()));
        }
        if self.feeds.is_empty() {
            return Err(ConfigError::Invalid("no feeds configured".into()));
        }

        let mut seen = HashSet::new();
        for feed in &self.feeds {
            if feed.id.trim().is_empty() {
                return Err(ConfigError::Invalid("feed without id".into()));
            }
            if !seen.insert(feed.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate feed id `{}`", feed.id)));
            }
            feed.source()?;
            if let Some(pattern) = &feed.options.title_clean {
                Regex::new(pattern).map_err(|e| {
                    ConfigError::Invalid(format!("feed `{}` title_clean: {}", feed.id, e))
                })?;
            }
        }

        Ok(())
    }

    pub fn feeds(&self) -> Result<Vec<Feed>, ConfigError> {
        self.feeds.iter().map(FeedConfig::to_feed).collect()
    }

    pub fn backfill_limit(&self) -> usize {
        self.backfill_limit.unwrap_or(self.page_size as usize)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    pub fn default_config_content() -> String {
        r##"# tubechan configuration
#
# Durations accept "90s", "30m", "1h", "1d" or a number of seconds.

# Time between two sync cycles
interval = "1h"
# Pause between items when a feed has more than burst_threshold pending items
item_interval = "1m"
burst_threshold = 10
# Items per listing page; also the backfill size for feeds without a cursor
page_size = 50
# Download pace as a multiple of the audio bitrate (0 = unthrottled)
download_rate_multiplier = 4
# work_dir = "/var/tmp/tubechan"

[telegram]
api_url = "https://api.telegram.org"
# Or set TUBECHAN_TELEGRAM_TOKEN
token = ""
chat_id = ""
operator_chat_id = ""
performer = ""

[youtube]
# Or set TUBECHAN_YOUTUBE_KEY
api_key = ""
yt_dlp_path = "yt-dlp"

[transcoder]
# Remove path or set bitrate_kbps = 0 to upload the original audio
path = "ffmpeg"
bitrate_kbps = 60

[store]
# Remote state document (GET/PUT), token may come from TUBECHAN_STORE_TOKEN
# url = "https://example.com/tubechan/state.json"
# Local state file, used when no url is set
# path = "/var/lib/tubechan/state.json"

# [[feeds]]
# id = "example"
# label = "Example channel"
# username = "example"          # or channel_id = "UC..." or playlist_id = "UU..."
# skip_cover = false
# skip_description = false
# title_clean = " \\| Example$"
# title_unquote = true
# suspended = false
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
