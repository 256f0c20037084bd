use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::app::{Result, TubechanError};
use crate::domain::{FeedItem, FeedSource, Thumbnails};
use crate::source::{FeedLister, ListingPage};

/// YouTube Data API v3 client.
pub struct YouTubeLister {
    client: Client,
    api_url: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ChannelList {
    #[serde(default)]
    items: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Channel {
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemList {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    published_at: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: String,
}

impl From<Snippet> for FeedItem {
    fn from(snippet: Snippet) -> Self {
        FeedItem {
            id: snippet.resource_id.video_id,
            title: snippet.title,
            description: snippet.description,
            published_at: snippet.published_at,
            thumbnails: snippet.thumbnails,
        }
    }
}

impl YouTubeLister {
    pub fn new(api_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .brotli(true)
            .user_agent(concat!("tubechan/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // trailing slash so `join` appends instead of replacing the last segment
        let api_url = Url::parse(&format!("{}/", api_url.trim_end_matches('/')))?;

        Ok(Self {
            client,
            api_url,
            api_key: api_key.into(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.api_url.join(endpoint)?;
        debug!(endpoint, "youtube request");

        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TubechanError::Listing(format!(
                "{} returned {}: {}",
                endpoint,
                status,
                body.trim()
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl FeedLister for YouTubeLister {
    async fn resolve_playlist(&self, source: &FeedSource) -> Result<String> {
        let filter = match source {
            FeedSource::PlaylistId(id) => return Ok(id.clone()),
            FeedSource::Username(name) => ("forUsername", name.as_str()),
            FeedSource::ChannelId(id) => ("id", id.as_str()),
        };

        let list: ChannelList = self
            .get("channels", &[("part", "contentDetails"), filter])
            .await?;

        match list.items.as_slice() {
            [channel] => Ok(channel.content_details.related_playlists.uploads.clone()),
            [] => Err(TubechanError::Resolve(format!("no channel matches {}", source))),
            many => Err(TubechanError::Resolve(format!(
                "{} channels match {}",
                many.len(),
                source
            ))),
        }
    }

    async fn list_page(
        &self,
        playlist_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<ListingPage> {
        let max_results = page_size.to_string();
        let mut query = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let list: PlaylistItemList = self.get("playlistItems", &query).await?;

        Ok(ListingPage {
            items: list.items.into_iter().map(|i| i.snippet.into()).collect(),
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}
