use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::app::{Result, TubechanError};
use crate::messenger::{AudioMessage, InputFile, Messenger, PhotoMessage, SentMessage, TextMessage};

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

/// Telegram Bot API client.
pub struct TelegramMessenger {
    client: Client,
    base_url: String,
}

impl TelegramMessenger {
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn post_json<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        debug!(method, "telegram request");
        let response = self.client.post(self.method_url(method)).json(body).send().await?;
        decode(method, response).await
    }

    async fn post_form<T: DeserializeOwned>(&self, method: &str, form: Form) -> Result<T> {
        debug!(method, "telegram upload");
        let response = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await?;
        decode(method, response).await
    }
}

async fn decode<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let bytes = response.bytes().await?;
    let body: ApiResponse<T> = match serde_json::from_slice(&bytes) {
        Ok(body) => body,
        Err(e) if status.is_success() => return Err(e.into()),
        Err(_) => {
            return Err(TubechanError::Telegram {
                method: method.to_string(),
                description: format!("HTTP {}", status),
            })
        }
    };

    if !body.ok {
        return Err(TubechanError::Telegram {
            method: method.to_string(),
            description: body
                .description
                .unwrap_or_else(|| format!("HTTP {}", status)),
        });
    }

    body.result.ok_or_else(|| TubechanError::Telegram {
        method: method.to_string(),
        description: "response without result".to_string(),
    })
}

fn file_part(name: &str, bytes: Vec<u8>) -> Part {
    Part::bytes(bytes).file_name(name.to_string())
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat_id: &str, message: &TextMessage) -> Result<SentMessage> {
        let body = json!({
            "chat_id": chat_id,
            "text": message.text,
            "link_preview_options": { "is_disabled": message.disable_preview },
            "disable_notification": message.silent,
        });
        self.post_json("sendMessage", &body).await
    }

    async fn send_photo(&self, chat_id: &str, message: PhotoMessage) -> Result<SentMessage> {
        match message.photo {
            InputFile::Reference(file_id) => {
                let mut body = json!({ "chat_id": chat_id, "photo": file_id });
                if let Some(caption) = message.caption {
                    body["caption"] = json!(caption);
                    body["parse_mode"] = json!("HTML");
                }
                self.post_json("sendPhoto", &body).await
            }
            InputFile::Upload { name, bytes } => {
                let mut form = Form::new()
                    .text("chat_id", chat_id.to_string())
                    .part("photo", file_part(&name, bytes));
                if let Some(caption) = message.caption {
                    form = form.text("caption", caption).text("parse_mode", "HTML");
                }
                self.post_form("sendPhoto", form).await
            }
        }
    }

    async fn send_audio(&self, chat_id: &str, message: AudioMessage) -> Result<SentMessage> {
        match message.audio {
            InputFile::Reference(file_id) => {
                let mut body = json!({ "chat_id": chat_id, "audio": file_id });
                if let Some(caption) = message.caption {
                    body["caption"] = json!(caption);
                }
                self.post_json("sendAudio", &body).await
            }
            InputFile::Upload { name, bytes } => {
                let mut form = Form::new()
                    .text("chat_id", chat_id.to_string())
                    .part("audio", file_part(&name, bytes));
                if let Some(caption) = message.caption {
                    form = form.text("caption", caption);
                }
                if let Some(performer) = message.performer {
                    form = form.text("performer", performer);
                }
                if let Some(title) = message.title {
                    form = form.text("title", title);
                }
                if let Some(duration) = message.duration_secs {
                    form = form.text("duration", duration.to_string());
                }
                if let Some(thumbnail) = message.thumbnail {
                    form = form.part("thumbnail", file_part(&format!("{}.thumb", name), thumbnail));
                }
                self.post_form("sendAudio", form).await
            }
        }
    }

    async fn delete_message(&self, chat_id: &str, message_id: i64) -> Result<()> {
        let body = json!({ "chat_id": chat_id, "message_id": message_id });
        let _: bool = self.post_json("deleteMessage", &body).await?;
        Ok(())
    }
}
