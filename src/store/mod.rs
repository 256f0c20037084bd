pub mod file;
pub mod http;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::Result;
use crate::domain::Cursor;

pub use file::FileCursorStore;
pub use http::HttpCursorStore;
pub use memory::MemoryCursorStore;

/// What survives a restart for one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedState {
    pub cursor: Cursor,
    /// Resolved uploads playlist, so resolution happens once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<String>,
}

/// The whole persisted document, keyed by feed id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDocument {
    pub feeds: BTreeMap<String, FeedState>,
}

/// Durable home of feed cursors. `put` returning `Ok` means the state
/// survives a crash.
#[async_trait]
pub trait CursorStore {
    async fn get(&self, feed_id: &str) -> Result<Option<FeedState>>;
    async fn put(&self, feed_id: &str, state: &FeedState) -> Result<()>;
}
