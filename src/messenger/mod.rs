//! Messaging platform seam.
//!
//! The pipeline talks to the channel through [`Messenger`];
//! [`TelegramMessenger`](telegram::TelegramMessenger) is the Bot API
//! implementation. [`Notifier`] reports to the operator chat and never fails.

pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::app::Result;

pub use telegram::TelegramMessenger;

/// A file either uploaded with the request or referenced by a file id the
/// platform returned earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFile {
    Upload { name: String, bytes: Vec<u8> },
    Reference(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextMessage {
    pub text: String,
    pub disable_preview: bool,
    pub silent: bool,
}

impl TextMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            disable_preview: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoMessage {
    pub photo: InputFile,
    /// HTML caption.
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioMessage {
    pub audio: InputFile,
    pub caption: Option<String>,
    pub performer: Option<String>,
    pub title: Option<String>,
    pub duration_secs: Option<u64>,
    pub thumbnail: Option<Vec<u8>>,
}

impl AudioMessage {
    pub fn reference(file_id: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            audio: InputFile::Reference(file_id.into()),
            caption: Some(caption.into()),
            performer: None,
            title: None,
            duration_secs: None,
            thumbnail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Audio {
    pub file_id: String,
    #[serde(default)]
    pub duration: u64,
}

/// The parts of a sent message the pipeline cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
    pub audio: Option<Audio>,
}

impl SentMessage {
    /// Widest rendition of an uploaded photo; the first one wins a tie.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo
            .iter()
            .filter(|p| !p.file_id.is_empty())
            .fold(None, |best: Option<&PhotoSize>, p| match best {
                Some(b) if b.width >= p.width => Some(b),
                _ => Some(p),
            })
    }
}

#[async_trait]
pub trait Messenger {
    async fn send_text(&self, chat_id: &str, message: &TextMessage) -> Result<SentMessage>;
    async fn send_photo(&self, chat_id: &str, message: PhotoMessage) -> Result<SentMessage>;
    async fn send_audio(&self, chat_id: &str, message: AudioMessage) -> Result<SentMessage>;
    async fn delete_message(&self, chat_id: &str, message_id: i64) -> Result<()>;
}

/// Best-effort reports to the operator chat.
#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn Messenger + Send + Sync>,
    chat_id: String,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn Messenger + Send + Sync>, chat_id: impl Into<String>) -> Self {
        Self {
            messenger,
            chat_id: chat_id.into(),
        }
    }

    pub async fn notify(&self, text: &str) {
        let message = TextMessage {
            silent: true,
            ..TextMessage::plain(text)
        };
        if let Err(e) = self.messenger.send_text(&self.chat_id, &message).await {
            warn!("Failed to notify operator: {}", e);
        }
    }
}
