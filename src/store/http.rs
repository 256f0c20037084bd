use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::app::{Result, TubechanError};
use crate::store::{CursorStore, FeedState, StateDocument};

/// State document kept behind a remote URL: GET to read, PUT to replace.
pub struct HttpCursorStore {
    client: Client,
    url: Url,
    token: Option<String>,
    write_lock: Mutex<()>,
}

impl HttpCursorStore {
    pub fn new(url: Url, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url,
            token,
            write_lock: Mutex::new(()),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch(&self) -> Result<StateDocument> {
        let response = self
            .authorize(self.client.get(self.url.clone()))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Ok(StateDocument::default()),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(TubechanError::Store(format!("GET {}: {}", self.url, status))),
        }
    }

    async fn replace(&self, document: &StateDocument) -> Result<()> {
        let response = self
            .authorize(self.client.put(self.url.clone()))
            .json(document)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TubechanError::Store(format!("PUT {}: {}", self.url, status)));
        }
        Ok(())
    }
}

#[async_trait]
impl CursorStore for HttpCursorStore {
    async fn get(&self, feed_id: &str) -> Result<Option<FeedState>> {
        Ok(self.fetch().await?.feeds.remove(feed_id))
    }

    async fn put(&self, feed_id: &str, state: &FeedState) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.fetch().await?;
        document.feeds.insert(feed_id.to_string(), state.clone());
        self.replace(&document).await?;
        debug!(feed = feed_id, cursor = %state.cursor, "cursor stored");
        Ok(())
    }
}
