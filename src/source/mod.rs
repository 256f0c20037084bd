//! Feed listing: the upstream API seam and the diff engine that turns a
//! newest-first listing into the ordered set of undelivered items.

pub mod diff;
pub mod youtube;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::{FeedItem, FeedSource};

pub use diff::{FeedDiffEngine, PendingItems};
pub use youtube::YouTubeLister;

/// One page of a newest-first listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub items: Vec<FeedItem>,
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait FeedLister {
    /// Uploads playlist of a channel. Exactly one match or a `Resolve` error.
    async fn resolve_playlist(&self, source: &FeedSource) -> Result<String>;

    async fn list_page(
        &self,
        playlist_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<ListingPage>;
}
