#![allow(dead_code)]

use async_trait::async_trait;
use rss_relay::types::{InputItem, RelayError, Result};
use rss_relay::{FeedReader, LlmAdapter};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Article body long enough to pass the minimum text length.
pub fn article_text(marker: &str) -> String {
    format!(
        "{marker} The city council approved the new transit budget after a long debate, \
         allocating funds for two tram lines and a fleet of electric buses that will enter service next spring."
    )
}

type Responder = dyn Fn(&str) -> Result<String> + Send + Sync;

/// LLM adapter whose answers come from a closure; records every prompt.
pub struct ScriptedAdapter {
    name: String,
    delay: Duration,
    responder: Box<Responder>,
    prompts: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedAdapter {
    pub fn with_fn(name: &str, responder: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            responder: Box::new(responder),
            prompts: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn answering(name: &str, answer: &str) -> Self {
        let answer = answer.to_string();
        Self::with_fn(name, move |_| Ok(answer.clone()))
    }

    /// Answers from the list in turn, repeating the last one.
    pub fn answering_in_turn(name: &str, answers: &[&str]) -> Self {
        let answers: Vec<String> = answers.iter().map(|a| a.to_string()).collect();
        let next = AtomicUsize::new(0);
        Self::with_fn(name, move |_| {
            let n = next.fetch_add(1, Ordering::SeqCst).min(answers.len() - 1);
            Ok(answers[n].clone())
        })
    }

    pub fn failing(name: &str) -> Self {
        let provider = name.to_string();
        Self::with_fn(name, move |_| {
            Err(RelayError::Provider {
                provider: provider.clone(),
                status: 429,
                message: "rate limited".to_string(),
            })
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }
}

#[async_trait]
impl LlmAdapter for ScriptedAdapter {
    fn adapter_name(&self) -> String {
        self.name.clone()
    }

    fn model(&self) -> String {
        format!("test/{}", self.name)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.responder)(prompt)
    }
}

/// In-memory reader: fixed unread items per category, records mark-read calls.
#[derive(Default)]
pub struct FakeReader {
    items: HashMap<String, Vec<InputItem>>,
    pub marked: Mutex<Vec<String>>,
    pub fail_categories: Vec<String>,
}

impl FakeReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(mut self, category: &str, items: Vec<InputItem>) -> Self {
        self.items.insert(category.to_string(), items);
        self
    }

    pub fn failing_on(mut self, category: &str) -> Self {
        self.fail_categories.push(category.to_string());
        self
    }

    pub fn marked(&self) -> Vec<String> {
        let mut marked = self.marked.lock().unwrap().clone();
        marked.sort();
        marked
    }
}

#[async_trait]
impl FeedReader for FakeReader {
    fn backend_name(&self) -> &'static str {
        "fake"
    }

    async fn login(&self) -> Result<()> {
        Ok(())
    }

    async fn unread_items(&self, category: &str, limit: usize) -> Result<Vec<InputItem>> {
        if self.fail_categories.iter().any(|c| c == category) {
            return Err(RelayError::Reader(format!("HTTP 500 for {}", category)));
        }
        let mut items = self.items.get(category).cloned().unwrap_or_default();
        items.truncate(limit);
        Ok(items)
    }

    async fn mark_read(&self, ids: &[String]) -> Result<()> {
        self.marked.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }
}

pub fn input_item(id: &str, link: &str, title: &str, source_title: &str) -> InputItem {
    InputItem {
        id: id.to_string(),
        link: link.to_string(),
        title: title.to_string(),
        source_title: source_title.to_string(),
        html: String::new(),
        enclosure_types: Vec::new(),
        published: None,
    }
}
