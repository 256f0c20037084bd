use std::sync::Mutex;

use async_trait::async_trait;

use crate::app::{Result, TubechanError};
use crate::store::{CursorStore, FeedState, StateDocument};

/// In-process store. Keeps a log of every write so tests can check that
/// cursors only ever move forward.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    document: StateDocument,
    writes: Vec<(String, FeedState)>,
    fail_writes: bool,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: StateDocument) -> Self {
        Self {
            inner: Mutex::new(Inner {
                document,
                ..Default::default()
            }),
        }
    }

    /// Make every following `put` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn document(&self) -> StateDocument {
        self.lock().document.clone()
    }

    pub fn writes(&self) -> Vec<(String, FeedState)> {
        self.lock().writes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // poisoned only if a writer panicked; the document is still whole
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn get(&self, feed_id: &str) -> Result<Option<FeedState>> {
        Ok(self.lock().document.feeds.get(feed_id).cloned())
    }

    async fn put(&self, feed_id: &str, state: &FeedState) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(TubechanError::Store("write rejected".into()));
        }
        inner.document.feeds.insert(feed_id.to_string(), state.clone());
        inner.writes.push((feed_id.to_string(), state.clone()));
        Ok(())
    }
}
