use crate::traits::Publisher;
use crate::types::{RelayError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize)]
struct TelegramResponse {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

enum Attempt {
    Sent,
    Rejected(StatusCode, TelegramResponse),
}

/// Telegram Bot API `sendMessage` client.
pub struct TelegramClient {
    client: Client,
    api_url: String,
    token: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, chat_id: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(20)).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.token)
    }

    async fn post_once(&self, text: &str, preview_options: &str) -> Result<Attempt> {
        let form = [
            ("chat_id", self.chat_id.as_str()),
            ("text", text),
            ("parse_mode", "HTML"),
            ("link_preview_options", preview_options),
        ];
        let response = self.client.post(self.send_url()).form(&form).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(Attempt::Sent);
        }
        let body: TelegramResponse = response.json().await.unwrap_or_default();
        Ok(Attempt::Rejected(status, body))
    }
}

/// JSON for the `link_preview_options` field.
pub fn link_preview_options(preview_link: Option<&str>) -> String {
    match preview_link {
        Some(link) => json!({
            "is_disabled": false,
            "url": link,
            "prefer_large_media": true,
            "show_above_text": true,
        }),
        None => json!({ "is_disabled": true }),
    }
    .to_string()
}

#[async_trait]
impl Publisher for TelegramClient {
    async fn send(&self, text: &str, preview_link: Option<&str>) -> Result<()> {
        let options = link_preview_options(preview_link);

        let (status, body) = match self.post_once(text, &options).await? {
            Attempt::Sent => return Ok(()),
            Attempt::Rejected(status, body) => (status, body),
        };

        let retry_after = body.parameters.as_ref().and_then(|p| p.retry_after);
        let (status, body) = match (status, retry_after) {
            (StatusCode::TOO_MANY_REQUESTS, Some(secs)) => {
                let wait = secs.min(MAX_RETRY_AFTER_SECS);
                warn!("Telegram rate limit, retrying in {}s", wait);
                tokio::time::sleep(Duration::from_secs(wait)).await;
                match self.post_once(text, &options).await? {
                    Attempt::Sent => return Ok(()),
                    Attempt::Rejected(status, body) => (status, body),
                }
            }
            _ => (status, body),
        };

        debug!("sendMessage rejected: {:?}", body);
        Err(RelayError::Telegram {
            status: status.as_u16(),
            description: body.description.unwrap_or_else(|| "no description".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_options_json() {
        let disabled: serde_json::Value = serde_json::from_str(&link_preview_options(None)).unwrap();
        assert_eq!(disabled, json!({ "is_disabled": true }));

        let enabled: serde_json::Value =
            serde_json::from_str(&link_preview_options(Some("https://youtu.be/x"))).unwrap();
        assert_eq!(enabled["url"], "https://youtu.be/x");
        assert_eq!(enabled["show_above_text"], true);
        assert_eq!(enabled["is_disabled"], false);
    }
}
