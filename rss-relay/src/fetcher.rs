use crate::types::{FetchConfig, RelayError, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

/// Fetches article pages with a browser-like user agent and a per-host delay.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    rate_limiter: Arc<Mutex<HashMap<String, Instant>>>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            config,
            rate_limiter: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        debug!("Fetching page: {}", url);

        self.apply_rate_limit(url).await?;

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(RelayError::General(format!(
                "HTTP {}: {}",
                response.status(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        Ok(response.text().await?)
    }

    async fn apply_rate_limit(&self, url: &str) -> Result<()> {
        if self.config.min_host_interval_ms == 0 {
            return Ok(());
        }

        let host = Url::parse(url)?.host_str().unwrap_or("").to_string();
        let min_interval = Duration::from_millis(self.config.min_host_interval_ms);

        // Reserve the next slot for this host, then wait for it without holding the lock.
        let wait_time = {
            let mut rate_limiter = self.rate_limiter.lock().await;
            let now = Instant::now();
            let slot = match rate_limiter.get(&host) {
                Some(last) if *last + min_interval > now => *last + min_interval,
                _ => now,
            };
            rate_limiter.insert(host.clone(), slot);
            slot.saturating_duration_since(now)
        };

        if !wait_time.is_zero() {
            debug!("Rate limiting {}: waiting {:?}", host, wait_time);
            tokio::time::sleep(wait_time).await;
        }

        Ok(())
    }
}
