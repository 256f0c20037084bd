use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::{debug, info};

use crate::app::Result;
use crate::domain::{Cursor, Feed, FeedItem};
use crate::source::FeedLister;
use crate::store::{CursorStore, FeedState};

/// Undelivered items of one feed, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingItems {
    pub playlist_id: String,
    pub items: Vec<FeedItem>,
}

/// Works out which items of a feed are newer than its cursor.
pub struct FeedDiffEngine {
    lister: Arc<dyn FeedLister + Send + Sync>,
    store: Arc<dyn CursorStore + Send + Sync>,
    page_size: u32,
    backfill_limit: usize,
}

impl FeedDiffEngine {
    pub fn new(
        lister: Arc<dyn FeedLister + Send + Sync>,
        store: Arc<dyn CursorStore + Send + Sync>,
        page_size: u32,
        backfill_limit: usize,
    ) -> Self {
        Self {
            lister,
            store,
            page_size,
            backfill_limit,
        }
    }

    /// The feed's uploads playlist, resolving and persisting it on first use.
    pub async fn ensure_playlist(&self, feed: &mut Feed) -> Result<String> {
        if let Some(id) = &feed.playlist_id {
            return Ok(id.clone());
        }

        let playlist_id = self.lister.resolve_playlist(&feed.source).await?;
        let state = FeedState {
            cursor: feed.cursor.clone(),
            playlist_id: Some(playlist_id.clone()),
        };
        self.store.put(&feed.id, &state).await?;

        info!(feed = %feed.display_title(), playlist = %playlist_id, "resolved {}", feed.source);
        feed.playlist_id = Some(playlist_id.clone());
        Ok(playlist_id)
    }

    /// Pages through the newest-first listing until the cursor boundary and
    /// returns the newer items in publication order.
    pub async fn pending(&self, feed: &mut Feed) -> Result<PendingItems> {
        let playlist_id = self.ensure_playlist(feed).await?;
        let limit = feed.cursor.is_empty().then_some(self.backfill_limit);

        let mut collected = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .lister
                .list_page(&playlist_id, self.page_size, page_token.as_deref())
                .await?;
            pages += 1;

            if collect_page(&feed.cursor, page.items, &mut collected, limit).is_break() {
                break;
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            feed = %feed.display_title(),
            cursor = %feed.cursor,
            pages,
            pending = collected.len(),
            "listing done"
        );

        Ok(PendingItems {
            playlist_id,
            items: into_publication_order(collected),
        })
    }
}

/// Takes items from one newest-first page while they are newer than the
/// cursor. Breaks at the first item at or before the cursor, or when
/// `limit` items have been collected.
pub fn collect_page(
    cursor: &Cursor,
    items: Vec<FeedItem>,
    collected: &mut Vec<FeedItem>,
    limit: Option<usize>,
) -> ControlFlow<()> {
    let full = |collected: &Vec<FeedItem>| limit.is_some_and(|l| collected.len() >= l);

    for item in items {
        if full(collected) || !cursor.admits(&item.published_at) {
            return ControlFlow::Break(());
        }
        collected.push(item);
    }

    if full(collected) {
        ControlFlow::Break(())
    } else {
        ControlFlow::Continue(())
    }
}

fn into_publication_order(mut items: Vec<FeedItem>) -> Vec<FeedItem> {
    items.reverse();
    items.sort_by(|a, b| a.published_at.cmp(&b.published_at));
    items
}
