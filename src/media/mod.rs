//! Media acquisition: metadata lookup, variant choice and paced download.
//!
//! - [`MediaSource`]: async trait over the extraction backend
//! - [`YtDlpMedia`](ytdlp::YtDlpMedia): `yt-dlp` + reqwest implementation
//! - [`select_best_audio`](variant::select_best_audio): variant choice
//! - [`ThrottledStream`](throttle::ThrottledStream): bandwidth cap

pub mod throttle;
pub mod variant;
pub mod ytdlp;

use std::io;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::app::Result;
use crate::domain::{MediaInfo, MediaVariant};

pub use throttle::ThrottledStream;
pub use variant::select_best_audio;
pub use ytdlp::YtDlpMedia;

pub type ByteStream = BoxStream<'static, io::Result<Vec<u8>>>;

/// Why an item's media cannot be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// Exists but cannot be played yet, e.g. a live event that has not begun.
    #[error("not playable ({status}): {reason}")]
    NotPlayable { status: String, reason: String },

    /// Age gate, embedding disabled, private or region locked.
    #[error("restricted: {0}")]
    Restricted(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MediaSource {
    /// Duration and available renditions of an item.
    async fn info(&self, item_id: &str) -> Result<MediaInfo>;

    /// Byte stream of one rendition.
    async fn open(&self, variant: &MediaVariant) -> Result<ByteStream>;

    /// Plain download of a small resource such as a thumbnail.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}
