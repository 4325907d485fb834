use crate::traits::FeedReader;
use crate::types::{InputItem, ReaderConfig, RelayError, Result, StreamContents};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

const READ_STATE: &str = "user/-/state/com.google/read";

#[derive(Debug, Clone, Default)]
struct Session {
    auth: String,
    post_token: Option<String>,
}

/// Client for the Google Reader compatible API (FreshRSS `greader.php`).
pub struct GReaderClient {
    client: Client,
    config: ReaderConfig,
    session: RwLock<Option<Session>>,
}

impl GReaderClient {
    pub fn new(config: ReaderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            session: RwLock::new(None),
        })
    }

    fn api_base(&self) -> String {
        format!("{}/api/greader.php/reader/api/0", self.config.base_url)
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base())?;
        url.path_segments_mut()
            .map_err(|_| RelayError::Reader(format!("Cannot build API path on {}", self.api_base())))?
            .extend(segments);
        Ok(url)
    }

    async fn auth_header(&self) -> Result<String> {
        let session = self.session.read().await;
        session
            .as_ref()
            .map(|s| format!("GoogleLogin auth={}", s.auth))
            .ok_or_else(|| RelayError::Auth("not logged in".to_string()))
    }

    async fn fetch_post_token(&self, auth_header: &str) -> Option<String> {
        let url = self.api_url(&["token"]).ok()?;
        match self.client.get(url).header("Authorization", auth_header).send().await {
            Ok(response) if response.status().is_success() => {
                let token = response.text().await.ok()?.trim().to_string();
                (!token.is_empty()).then_some(token)
            }
            Ok(response) => {
                debug!("No POST token available (HTTP {})", response.status());
                None
            }
            Err(e) => {
                debug!("POST token request failed: {}", e);
                None
            }
        }
    }

    /// GET with exponential backoff on transport errors, 5xx and 429.
    async fn get_with_retry(&self, url: Url, query: &[(&str, String)]) -> Result<Response> {
        let auth = self.auth_header().await?;

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_millis(self.config.retry_delay_ms),
            initial_interval: Duration::from_millis(self.config.retry_delay_ms),
            max_interval: Duration::from_millis(self.config.retry_delay_ms * 16),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.timeout_seconds * 4)),
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            let result = self
                .client
                .get(url.clone())
                .header("Authorization", &auth)
                .query(query)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let retryable = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
                    last_error = Some(RelayError::Reader(format!(
                        "HTTP {} from {}",
                        status,
                        url.path()
                    )));
                    if !retryable {
                        break;
                    }
                }
                Err(e) => {
                    last_error = Some(RelayError::Http(e));
                }
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url.path(), delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
            break;
        }

        Err(last_error.unwrap_or_else(|| RelayError::Reader("request failed".to_string())))
    }
}

#[async_trait]
impl FeedReader for GReaderClient {
    fn backend_name(&self) -> &'static str {
        "greader"
    }

    async fn login(&self) -> Result<()> {
        let login_url = format!("{}/api/greader.php/accounts/ClientLogin", self.config.base_url);
        let response = self
            .client
            .get(&login_url)
            .query(&[("Email", self.config.user.as_str()), ("Passwd", self.config.password.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let auth = parse_auth_token(&body).ok_or_else(|| {
            RelayError::Auth(format!("no Auth token in ClientLogin response (HTTP {})", status))
        })?;

        let auth_header = format!("GoogleLogin auth={}", auth);
        let post_token = self.fetch_post_token(&auth_header).await;

        *self.session.write().await = Some(Session { auth, post_token });
        info!("Logged in to {} as {}", self.config.base_url, self.config.user);
        Ok(())
    }

    async fn unread_items(&self, category: &str, limit: usize) -> Result<Vec<InputItem>> {
        let url = self.api_url(&["stream", "contents", "user", "-", "label", category])?;
        let query = [("n", limit.to_string()), ("xt", READ_STATE.to_string())];

        let response = self.get_with_retry(url, &query).await?;
        let contents: StreamContents = response.json().await?;

        let total = contents.items.len();
        let items: Vec<InputItem> = contents
            .items
            .into_iter()
            .filter_map(|item| item.into_input_item())
            .collect();

        if items.len() < total {
            debug!("Dropped {} items without a link in {}", total - items.len(), category);
        }
        debug!("Category {} has {} unread items", category, items.len());
        Ok(items)
    }

    async fn mark_read(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let auth = self.auth_header().await?;
        let post_token = self.session.read().await.as_ref().and_then(|s| s.post_token.clone());

        let mut form: Vec<(&str, &str)> = ids.iter().map(|id| ("i", id.as_str())).collect();
        form.push(("a", READ_STATE));
        if let Some(token) = post_token.as_deref() {
            form.push(("T", token));
        }

        let response = self
            .client
            .post(self.api_url(&["edit-tag"])?)
            .header("Authorization", auth)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RelayError::Reader(format!(
                "edit-tag failed with HTTP {}",
                response.status()
            )));
        }

        debug!("Marked {} items read", ids.len());
        Ok(())
    }
}

/// Pull the value of the `Auth=` line out of a ClientLogin response body.
pub fn parse_auth_token(body: &str) -> Option<String> {
    body.lines()
        .find_map(|line| line.trim().strip_prefix("Auth="))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
