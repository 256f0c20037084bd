use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// Thumbnail candidates by resolution tier, lowest to highest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thumbnails {
    pub default: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
    pub standard: Option<Thumbnail>,
    pub maxres: Option<Thumbnail>,
}

fn usable(tier: &Option<Thumbnail>) -> Option<&str> {
    tier.as_ref()
        .map(|t| t.url.as_str())
        .filter(|url| !url.is_empty())
}

impl Thumbnails {
    /// Highest-resolution candidate with a usable URL.
    pub fn cover(&self) -> Option<&str> {
        usable(&self.maxres)
            .or_else(|| usable(&self.standard))
            .or_else(|| usable(&self.high))
            .or_else(|| usable(&self.medium))
            .or_else(|| usable(&self.default))
    }

    /// Small thumbnail attached to the audio upload.
    pub fn preview(&self) -> Option<&str> {
        usable(&self.medium)
    }
}

/// One entry of a feed listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub description: String,
    /// ISO-8601 UTC, e.g. `2024-01-02T03:04:05Z`.
    pub published_at: String,
    pub thumbnails: Thumbnails,
}

impl FeedItem {
    pub fn new(id: impl Into<String>, published_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            published_at: published_at.into(),
            thumbnails: Thumbnails::default(),
        }
    }

    pub fn published(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.published_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn short_link(&self) -> String {
        format!("youtu.be/{}", self.id)
    }

    /// File name stem for downloaded artifacts: `20240102.030405.<id>`.
    pub fn artifact_stem(&self) -> String {
        match self.published() {
            Some(at) => format!("{}.{}", at.format("%Y%m%d.%H%M%S"), self.id),
            None => self.id.clone(),
        }
    }
}

/// One encoded rendition of an item's media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaVariant {
    /// MIME-type-like tag, e.g. `audio/mp4; codecs="mp4a.40.2"`.
    pub mime_type: String,
    /// Nominal bitrate in bits per second.
    pub bitrate: u64,
    /// Audio track label, e.g. `English (United States) original`.
    pub track: Option<String>,
    pub url: String,
}

impl MediaVariant {
    pub fn is_original_track(&self) -> bool {
        self.track
            .as_deref()
            .map(|t| t.to_lowercase().contains("original"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaInfo {
    pub duration_secs: u64,
    pub variants: Vec<MediaVariant>,
}
