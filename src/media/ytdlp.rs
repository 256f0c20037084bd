use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tokio::process::Command;

use crate::app::{Result, TubechanError};
use crate::domain::{MediaInfo, MediaVariant};
use crate::media::{ByteStream, MediaError, MediaSource};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Metadata from the `yt-dlp` executable, content over plain HTTP.
pub struct YtDlpMedia {
    program: PathBuf,
    client: Client,
}

impl YtDlpMedia {
    pub fn new(program: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("tubechan/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            program: program.into(),
            client,
        })
    }
}

#[async_trait]
impl MediaSource for YtDlpMedia {
    async fn info(&self, item_id: &str) -> Result<MediaInfo> {
        let output = Command::new(&self.program)
            .args(["--dump-single-json", "--no-warnings", "--skip-download", "--"])
            .arg(format!("{}{}", WATCH_URL, item_id))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                TubechanError::Other(format!("cannot run {}: {}", self.program.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr).into());
        }

        parse_info(&output.stdout)
    }

    async fn open(&self, variant: &MediaVariant) -> Result<ByteStream> {
        let response = self.client.get(&variant.url).send().await?;
        response.error_for_status_ref()?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(io::Error::other))
            .boxed())
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        response.error_for_status_ref()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    duration: Option<f64>,
    live_status: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    url: Option<String>,
    ext: Option<String>,
    acodec: Option<String>,
    vcodec: Option<String>,
    abr: Option<f64>,
    tbr: Option<f64>,
    format_note: Option<String>,
}

fn parse_info(json: &[u8]) -> Result<MediaInfo> {
    let raw: RawInfo = serde_json::from_slice(json)?;

    match raw.live_status.as_deref() {
        Some("is_upcoming") => {
            return Err(MediaError::NotPlayable {
                status: "LIVE_STREAM_OFFLINE".into(),
                reason: "live event has not started yet".into(),
            }
            .into())
        }
        Some("is_live") => {
            return Err(MediaError::NotPlayable {
                status: "LIVE_STREAM".into(),
                reason: "broadcast is still running".into(),
            }
            .into())
        }
        _ => {}
    }

    let variants = raw.formats.into_iter().filter_map(to_variant).collect();

    Ok(MediaInfo {
        duration_secs: raw.duration.map(|d| d.round() as u64).unwrap_or(0),
        variants,
    })
}

fn to_variant(format: RawFormat) -> Option<MediaVariant> {
    let url = format.url?;
    let ext = format.ext.unwrap_or_default();
    let acodec = format.acodec.unwrap_or_else(|| "none".into());
    let vcodec = format.vcodec.unwrap_or_else(|| "none".into());

    let mime_type = if vcodec != "none" {
        format!("video/{}", ext)
    } else if acodec != "none" {
        let container = match ext.as_str() {
            "m4a" | "mp4" => "mp4",
            other => other,
        };
        format!("audio/{}; codecs=\"{}\"", container, acodec)
    } else {
        return None;
    };

    let kbps = format.abr.or(format.tbr).unwrap_or(0.0);

    Some(MediaVariant {
        mime_type,
        bitrate: (kbps * 1000.0).round() as u64,
        track: format.format_note,
        url,
    })
}

/// Map `yt-dlp` error output to a media error.
pub fn classify_failure(stderr: &str) -> MediaError {
    let line = stderr
        .lines()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .unwrap_or(stderr)
        .trim()
        .to_string();
    let lower = line.to_lowercase();

    const NOT_YET: [&str; 3] = ["live event will begin", "premieres in", "this live event"];
    const RESTRICTED: [&str; 6] = [
        "confirm your age",
        "age-restricted",
        "embedding",
        "private video",
        "members-only",
        "not available in your country",
    ];

    if NOT_YET.iter().any(|p| lower.contains(p)) {
        MediaError::NotPlayable {
            status: "LIVE_STREAM_OFFLINE".into(),
            reason: line,
        }
    } else if RESTRICTED.iter().any(|p| lower.contains(p)) {
        MediaError::Restricted(line)
    } else {
        MediaError::Unavailable(line)
    }
}
