use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use serde::Deserialize;

/// Alert delivery seam. Fire-and-forget from the pipeline's perspective:
/// failures are reported back as `Err`, never retried here.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, chat_id: &str, text: &str) -> anyhow::Result<()>;
    async fn send_photo(&self, chat_id: &str, photo: &Path, caption: &str) -> anyhow::Result<()>;
}

/// Incoming update from the Bot API long poll. Only the fields the command
/// loop needs; everything else in the payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub text: Option<String>,
    pub chat: Chat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Every Bot API call comes back in this envelope; `ok: false` carries the
/// human-readable reason in `description`.
#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

/// Long-poll window for getUpdates. The HTTP client timeout must outlive it.
const POLL_TIMEOUT_SECS: u64 = 50;

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url("https://api.telegram.org", token)
    }

    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Long-polls for updates past `offset`. Returns an empty list when the
    /// window elapses quietly.
    pub async fn get_updates(&self, offset: i64) -> anyhow::Result<Vec<Update>> {
        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", POLL_TIMEOUT_SECS.to_string()),
            ])
            .send()
            .await
            .context("getUpdates request failed")?;

        let payload: ApiResponse<Vec<Update>> = response
            .json()
            .await
            .context("getUpdates response was not valid JSON")?;

        if !payload.ok {
            bail!(
                "getUpdates rejected: {}",
                payload.description.unwrap_or_else(|| "no reason given".into())
            );
        }

        Ok(payload.result.unwrap_or_default())
    }

    async fn check_send(&self, response: reqwest::Response, method: &str) -> anyhow::Result<()> {
        let payload: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .with_context(|| format!("{method} response was not valid JSON"))?;

        if !payload.ok {
            bail!(
                "{method} rejected: {}",
                payload.description.unwrap_or_else(|| "no reason given".into())
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_text(&self, chat_id: &str, text: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .form(&[("chat_id", chat_id), ("text", text)])
            .send()
            .await
            .context("sendMessage request failed")?;

        self.check_send(response, "sendMessage").await
    }

    async fn send_photo(&self, chat_id: &str, photo: &Path, caption: &str) -> anyhow::Result<()> {
        let bytes = tokio::fs::read(photo)
            .await
            .with_context(|| format!("could not read chart image {}", photo.display()))?;

        let file_name = photo
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chart.png".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .context("could not build photo part")?;

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .context("sendPhoto request failed")?;

        self.check_send(response, "sendPhoto").await
    }
}
