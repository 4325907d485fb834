use crate::traits::FeedReader;
use crate::types::{
    parse_id_list, FeverAuth, FeverFeeds, FeverGroups, FeverItems, FeverUnread, InputItem,
    ReaderConfig, RelayError, Result,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

/// The Fever API caps `with_ids` at 50 ids per call.
const ITEMS_PER_REQUEST: usize = 50;

/// Client for the Fever API (`fever.php`).
pub struct FeverClient {
    client: Client,
    config: ReaderConfig,
    api_key: String,
}

impl FeverClient {
    pub fn new(config: ReaderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let api_key = fever_api_key(&config.user, &config.password);

        Ok(Self { client, config, api_key })
    }

    fn endpoint(&self, verb: &str) -> String {
        if verb.is_empty() {
            format!("{}/api/fever.php?api", self.config.base_url)
        } else {
            format!("{}/api/fever.php?api&{}", self.config.base_url, verb)
        }
    }

    async fn call<T: DeserializeOwned>(&self, verb: &str) -> Result<T> {
        let response = self
            .client
            .post(self.endpoint(verb))
            .form(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Reader(format!("Fever {} failed with HTTP {}", verb, status)));
        }

        let body = response.text().await?;
        let auth: FeverAuth = serde_json::from_str(&body)?;
        if auth.auth != 1 {
            return Err(RelayError::Auth("Fever API rejected the api_key".to_string()));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn group_feeds(&self, category: &str) -> Result<Option<HashSet<i64>>> {
        let groups: FeverGroups = self.call("groups").await?;

        let group_id = match groups
            .groups
            .iter()
            .find(|g| g.title.eq_ignore_ascii_case(category))
        {
            Some(group) => group.id,
            None => return Ok(None),
        };

        let feeds = groups
            .feeds_groups
            .iter()
            .filter(|fg| fg.group_id == group_id)
            .flat_map(|fg| parse_id_list(&fg.feed_ids))
            .collect();
        Ok(Some(feeds))
    }
}

#[async_trait]
impl FeedReader for FeverClient {
    fn backend_name(&self) -> &'static str {
        "fever"
    }

    async fn login(&self) -> Result<()> {
        let _: FeverAuth = self.call("").await?;
        info!("Authenticated against Fever API at {}", self.config.base_url);
        Ok(())
    }

    async fn unread_items(&self, category: &str, limit: usize) -> Result<Vec<InputItem>> {
        let feed_ids = match self.group_feeds(category).await? {
            Some(ids) => ids,
            None => {
                warn!("Fever group not found: {}", category);
                return Ok(Vec::new());
            }
        };

        let feeds: FeverFeeds = self.call("feeds").await?;
        let feed_titles: HashMap<i64, String> = feeds
            .feeds
            .into_iter()
            .filter(|f| feed_ids.contains(&f.id))
            .map(|f| (f.id, f.title))
            .collect();

        let unread: FeverUnread = self.call("unread_item_ids").await?;
        let unread_ids = parse_id_list(&unread.unread_item_ids);
        debug!("Fever reports {} unread items overall", unread_ids.len());

        let mut items = Vec::new();
        for chunk in unread_ids.chunks(ITEMS_PER_REQUEST) {
            let with_ids = chunk.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");
            let batch: FeverItems = self.call(&format!("items&with_ids={}", with_ids)).await?;
            items.extend(batch.items.into_iter().filter(|item| feed_ids.contains(&item.feed_id)));
        }

        items.sort_by(|a, b| b.created_on_time.cmp(&a.created_on_time));
        items.truncate(limit);

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let source = feed_titles.get(&item.feed_id).cloned().unwrap_or_default();
                item.into_input_item(&source)
            })
            .collect())
    }

    async fn mark_read(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            let _: FeverAuth = self.call(&format!("mark=item&as=read&id={}", id)).await?;
        }
        if !ids.is_empty() {
            debug!("Marked {} items read", ids.len());
        }
        Ok(())
    }
}

/// Fever authenticates with md5("user:password") in hex.
pub fn fever_api_key(user: &str, password: &str) -> String {
    format!("{:x}", md5::compute(format!("{}:{}", user, password)))
}
