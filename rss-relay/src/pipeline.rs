use crate::format::{digest_entry, digest_messages, direct_post};
use crate::processing::{ItemProcessor, ProcessedItem};
use crate::traits::{FeedReader, Publisher};
use crate::types::{
    CategoryReport, CategorySpec, DeliveryMode, InputItem, Result, RunReport, SummaryOutcome,
};
use futures::stream::{self, StreamExt};
use interfaces::state::SeenLinks;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub categories: Vec<CategorySpec>,
    pub items_per_category: usize,
    pub workers: usize,
    pub youtube_pause: Duration,
    pub poll_interval: Option<Duration>,
    pub dry_run: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            items_per_category: 80,
            workers: 2,
            youtube_pause: Duration::from_secs(15),
            poll_interval: None,
            dry_run: false,
        }
    }
}

/// Fetch → process → post → mark read, category by category.
pub struct RelayPipeline {
    reader: Arc<dyn FeedReader>,
    publisher: Arc<dyn Publisher>,
    processor: Arc<ItemProcessor>,
    settings: PipelineSettings,
    seen: Option<Mutex<SeenLinks>>,
}

impl RelayPipeline {
    pub fn new(
        reader: Arc<dyn FeedReader>,
        publisher: Arc<dyn Publisher>,
        processor: Arc<ItemProcessor>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            reader,
            publisher,
            processor,
            settings,
            seen: None,
        }
    }

    pub fn with_seen_links(mut self, seen: SeenLinks) -> Self {
        self.seen = Some(Mutex::new(seen));
        self
    }

    /// Log in and run one pass, or keep polling until Ctrl-C when an interval is set.
    pub async fn run(&self) -> Result<()> {
        let Some(interval) = self.settings.poll_interval else {
            self.reader.login().await?;
            let report = self.run_once().await;
            info!("Pass finished: {} posted, {} marked read", report.posted(), report.marked_read());
            return Ok(());
        };

        loop {
            match self.reader.login().await {
                Ok(()) => {
                    let report = self.run_once().await;
                    info!(
                        "Pass finished: {} posted, {} marked read; next in {:?}",
                        report.posted(),
                        report.marked_read(),
                        interval
                    );
                }
                Err(e) => error!("Login to {} failed: {}", self.reader.backend_name(), e),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping");
                    break;
                }
            }
        }
        Ok(())
    }

    /// One pass over every configured category. Requires a prior `login`.
    pub async fn run_once(&self) -> RunReport {
        let span = info_span!("pass", run_id = %Uuid::new_v4());
        async {
            let mut report = RunReport::default();
            for category in &self.settings.categories {
                let span = info_span!("category", name = %category.name, mode = %category.mode);
                let category_report = self.run_category(category).instrument(span).await;
                report.categories.push(category_report);
            }
            self.persist_seen().await;
            report
        }
        .instrument(span)
        .await
    }

    pub async fn run_category(&self, category: &CategorySpec) -> CategoryReport {
        info!("--- {} ---", category.name.to_uppercase());
        let mut report = CategoryReport::new(category);

        let items = match self
            .reader
            .unread_items(&category.name, self.settings.items_per_category)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                error!("Could not load {}: {}", category.name, e);
                return report;
            }
        };
        report.fetched = items.len();
        if items.is_empty() {
            return report;
        }

        let (fresh, already_seen) = self.split_seen(items).await;
        if !already_seen.is_empty() {
            report.already_seen = already_seen.len();
            info!("{} items were posted before, marking read", already_seen.len());
            let ids: Vec<String> = already_seen.into_iter().map(|item| item.id).collect();
            self.mark_read(&ids, &mut report).await;
        }

        let processed = self.process_items(&fresh, category.mode).await;
        report.unavailable = fresh.len() - processed.len();

        match category.mode {
            DeliveryMode::Digest => self.deliver_digest(category, processed, &mut report).await,
            DeliveryMode::Direct => self.deliver_direct(processed, &mut report).await,
        }

        report
    }

    async fn split_seen(&self, items: Vec<InputItem>) -> (Vec<InputItem>, Vec<InputItem>) {
        match &self.seen {
            Some(seen) => {
                let seen = seen.lock().await;
                items.into_iter().partition(|item| !seen.contains(&item.link))
            }
            None => (items, Vec::new()),
        }
    }

    /// Bounded fan-out over items; results come back in feed order, then get
    /// reversed so the oldest item goes first.
    async fn process_items(&self, items: &[InputItem], mode: DeliveryMode) -> Vec<ProcessedItem> {
        let processor = &self.processor;
        let results: Vec<Option<ProcessedItem>> = stream::iter(items)
            .map(|item| processor.process(item, mode))
            .buffered(self.settings.workers.max(1))
            .collect()
            .await;

        let mut processed: Vec<ProcessedItem> = results.into_iter().flatten().collect();
        processed.reverse();
        processed
    }

    async fn deliver_digest(
        &self,
        category: &CategorySpec,
        processed: Vec<ProcessedItem>,
        report: &mut CategoryReport,
    ) {
        let mut entries = Vec::new();
        let mut posted_links = Vec::new();
        for item in &processed {
            if let ProcessedItem::Digest { link, tag, outcome, .. } = item {
                match outcome {
                    SummaryOutcome::Summary(summary) => {
                        entries.push(digest_entry(link, summary, tag));
                        posted_links.push(link.clone());
                    }
                    SummaryOutcome::Skip(reason) => {
                        report.skipped += 1;
                        info!("SKIP ({}): {}", reason, link);
                    }
                    SummaryOutcome::Unavailable => {}
                }
            }
        }
        report.summarized = entries.len();

        let ids: Vec<String> = processed.iter().map(|item| item.id().to_string()).collect();
        let messages = digest_messages(&category.name, &entries);

        if self.settings.dry_run {
            for message in &messages {
                info!("[dry run] would send:\n{}", message);
            }
            return;
        }

        if messages.is_empty() {
            if !ids.is_empty() {
                info!("Only skipped items in {}, marking them read", category.name);
                self.mark_read(&ids, report).await;
            }
            return;
        }

        for (n, message) in messages.iter().enumerate() {
            if let Err(e) = self.publisher.send(message, None).await {
                error!("Digest part {}/{} for {} failed: {}", n + 1, messages.len(), category.name, e);
                return;
            }
        }

        report.posted += entries.len();
        info!("Digest for {} sent ({} items)", category.name, entries.len());
        self.remember(&posted_links).await;
        self.mark_read(&ids, report).await;
    }

    async fn deliver_direct(&self, processed: Vec<ProcessedItem>, report: &mut CategoryReport) {
        for item in processed {
            let ProcessedItem::Direct { id, link, tag, title, is_youtube } = item else {
                continue;
            };
            let message = direct_post(&link, &title, &tag);

            if self.settings.dry_run {
                info!("[dry run] would send:\n{}", message);
                continue;
            }

            if is_youtube && !self.settings.youtube_pause.is_zero() {
                info!("YouTube pause {:?}...", self.settings.youtube_pause);
                tokio::time::sleep(self.settings.youtube_pause).await;
            }

            match self.publisher.send(&message, Some(&link)).await {
                Ok(()) => {
                    report.posted += 1;
                    info!("Posted: {}", tag);
                    self.remember(std::slice::from_ref(&link)).await;
                    self.mark_read(&[id], report).await;
                }
                Err(e) => warn!("Could not post {}: {}", link, e),
            }
        }
    }

    async fn mark_read(&self, ids: &[String], report: &mut CategoryReport) {
        if self.settings.dry_run || ids.is_empty() {
            return;
        }
        match self.reader.mark_read(ids).await {
            Ok(()) => report.marked_read += ids.len(),
            Err(e) => warn!("Could not mark {} items read: {}", ids.len(), e),
        }
    }

    async fn remember(&self, links: &[String]) {
        if let Some(seen) = &self.seen {
            let mut seen = seen.lock().await;
            for link in links {
                seen.insert(link);
            }
        }
    }

    async fn persist_seen(&self) {
        if self.settings.dry_run {
            return;
        }
        if let Some(seen) = &self.seen {
            let mut seen = seen.lock().await;
            if let Err(e) = seen.save().await {
                warn!("Could not save seen links: {:#}", e);
            }
        }
    }
}
