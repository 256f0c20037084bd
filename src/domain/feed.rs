use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a feed's items come from. Only a playlist can be listed; the other
/// two are resolved to their uploads playlist once and then cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    Username(String),
    ChannelId(String),
    PlaylistId(String),
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Username(name) => write!(f, "username:{}", name),
            FeedSource::ChannelId(id) => write!(f, "channel:{}", id),
            FeedSource::PlaylistId(id) => write!(f, "playlist:{}", id),
        }
    }
}

/// Per-feed delivery options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedOptions {
    pub skip_cover: bool,
    pub skip_description: bool,
    pub title_clean: Option<String>,
    pub title_unquote: bool,
    pub suspended: bool,
}

/// Publication timestamp of the last delivered item.
///
/// Timestamps are fixed-format ISO-8601 UTC strings (`2024-01-02T03:04:05Z`),
/// so plain string ordering is chronological ordering. The empty cursor sorts
/// before everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether an item published at `published_at` is newer than the cursor.
    pub fn admits(&self, published_at: &str) -> bool {
        self.is_empty() || published_at > self.0.as_str()
    }

    /// Move the cursor forward. Returns `false` (and leaves the cursor
    /// untouched) when `published_at` is not strictly newer.
    pub fn advance(&mut self, published_at: &str) -> bool {
        if !self.admits(published_at) || published_at.is_empty() {
            return false;
        }
        self.0 = published_at.to_string();
        true
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("(none)")
        } else {
            f.write_str(&self.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: String,
    pub label: String,
    pub source: FeedSource,
    /// Uploads playlist, once known.
    pub playlist_id: Option<String>,
    pub options: FeedOptions,
    pub cursor: Cursor,
}

impl Feed {
    pub fn new(id: impl Into<String>, source: FeedSource) -> Self {
        let playlist_id = match &source {
            FeedSource::PlaylistId(id) => Some(id.clone()),
            _ => None,
        };

        Self {
            id: id.into(),
            label: String::new(),
            source,
            playlist_id,
            options: FeedOptions::default(),
            cursor: Cursor::empty(),
        }
    }

    pub fn display_title(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}
