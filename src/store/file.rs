use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::app::Result;
use crate::store::{CursorStore, FeedState, StateDocument};

/// State document in a local JSON file.
pub struct FileCursorStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<StateDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(StateDocument::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StateDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes to a sibling temp file, then renames over the target.
    async fn write(&self, document: &StateDocument) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(document)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn get(&self, feed_id: &str) -> Result<Option<FeedState>> {
        Ok(self.read().await?.feeds.remove(feed_id))
    }

    async fn put(&self, feed_id: &str, state: &FeedState) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read().await?;
        document.feeds.insert(feed_id.to_string(), state.clone());
        self.write(&document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Cursor;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCursorStore::new(dir.path().join("state.json"));
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_keeps_other_feeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCursorStore::new(dir.path().join("nested").join("state.json"));

        let a = FeedState {
            cursor: Cursor::new("2024-01-01T00:00:00Z"),
            playlist_id: None,
        };
        let b = FeedState {
            cursor: Cursor::new("2024-02-01T00:00:00Z"),
            playlist_id: Some("UU2".into()),
        };
        store.put("a", &a).await.unwrap();
        store.put("b", &b).await.unwrap();

        let reopened = FileCursorStore::new(store.path());
        assert_eq!(reopened.get("a").await.unwrap(), Some(a));
        assert_eq!(reopened.get("b").await.unwrap(), Some(b));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json").unwrap();

        assert!(FileCursorStore::new(path).get("a").await.is_err());
    }
}
