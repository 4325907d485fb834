use crate::llm_adapter::{LlmAdapter, LlmAdapterRegistry};
use crate::types::{RelayError, SkipReason, SummaryOutcome};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Appended to summaries of video items.
pub const VIDEO_MARKER: &str = "🎬";

/// Answers this short that mention SKIP are the model declining to summarize.
const SKIP_ANSWER_MAX_CHARS: usize = 10;

/// Order in which providers are asked for a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStrategy {
    /// Roster order, first success wins.
    Sequential,
    /// Random roster permutation per item, first success wins.
    Shuffled,
    /// Every provider at once, first success wins.
    FanOut,
}

impl FromStr for SummaryStrategy {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "ordered" => Ok(SummaryStrategy::Sequential),
            "shuffled" | "random" => Ok(SummaryStrategy::Shuffled),
            "fanout" | "fan-out" | "parallel" => Ok(SummaryStrategy::FanOut),
            other => Err(RelayError::Config(format!("unknown summary strategy: {}", other))),
        }
    }
}

/// The last N accepted summaries. Fed to the prompt as context and used to
/// catch near-identical answers.
#[derive(Debug, Clone)]
pub struct SummaryWindow {
    capacity: usize,
    entries: VecDeque<String>,
}

impl SummaryWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, summary: String) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(summary);
    }

    pub fn context(&self) -> String {
        self.entries.iter().cloned().collect::<Vec<_>>().join("\n")
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest similarity between `candidate` and any entry, in [0, 1].
    pub fn max_similarity(&self, candidate: &str) -> f64 {
        let candidate = comparable(candidate);
        self.entries
            .iter()
            .map(|entry| strsim::normalized_levenshtein(&candidate, &comparable(entry)))
            .fold(0.0, f64::max)
    }

    pub fn near_duplicate(&self, candidate: &str, threshold: f64) -> bool {
        !self.entries.is_empty() && self.max_similarity(candidate) >= threshold
    }
}

/// Lowercased, marker-free, whitespace-collapsed form used for comparisons.
fn comparable(text: &str) -> String {
    text.replace(VIDEO_MARKER, "")
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn build_prompt(text: &str, context: &str, language: &str) -> String {
    format!(
        "Summarize the news in ONE sentence (up to 30 words) in {language}. \
         Describe the concrete event and its outcome.\n\
         IMPORTANT: If the text EXACTLY repeats the meaning of these lines, answer only with the word SKIP. \
         But if it is a continuation of the topic or another event from the same series, you MUST write the summary.\n\
         Context of previous news:\n{context}\n\nNews text: {text}"
    )
}

/// Trim the answer and drop trailing periods.
pub fn clean_answer(answer: &str) -> String {
    answer.trim().trim_end_matches('.').trim_end().to_string()
}

pub fn is_skip_answer(answer: &str) -> bool {
    answer.to_uppercase().contains("SKIP") && answer.chars().count() < SKIP_ANSWER_MAX_CHARS
}

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub strategy: SummaryStrategy,
    pub window_size: usize,
    pub dedup_threshold: f64,
    pub language: String,
    pub min_text_chars: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            strategy: SummaryStrategy::Shuffled,
            window_size: 8,
            dedup_threshold: 0.9,
            language: "Russian".to_string(),
            min_text_chars: 100,
        }
    }
}

/// One-sentence summaries with provider fallback and near-duplicate
/// suppression. Cheap to clone; clones share the window.
#[derive(Clone)]
pub struct Summarizer {
    registry: LlmAdapterRegistry,
    config: SummarizerConfig,
    window: Arc<Mutex<SummaryWindow>>,
}

impl Summarizer {
    pub fn new(registry: LlmAdapterRegistry, config: SummarizerConfig) -> Self {
        let window = Arc::new(Mutex::new(SummaryWindow::new(config.window_size)));
        Self { registry, config, window }
    }

    pub async fn recent_summaries(&self) -> Vec<String> {
        self.window.lock().await.entries()
    }

    pub async fn summarize(&self, text: &str, is_video: bool) -> SummaryOutcome {
        let text = text.trim();
        if text.chars().count() < self.config.min_text_chars {
            debug!("Text too short to summarize ({} chars)", text.chars().count());
            return SummaryOutcome::Unavailable;
        }

        let context = self.window.lock().await.context();
        let prompt = build_prompt(text, &context, &self.config.language);

        let answer = match self.config.strategy {
            SummaryStrategy::Sequential => self.ask_in_order(self.registry.ordered(), &prompt).await,
            SummaryStrategy::Shuffled => self.ask_in_order(self.registry.shuffled(), &prompt).await,
            SummaryStrategy::FanOut => self.ask_fan_out(self.registry.ordered(), &prompt).await,
        };

        let Some(answer) = answer else {
            warn!("No provider produced a summary");
            return SummaryOutcome::Unavailable;
        };

        let answer = clean_answer(&answer);
        if is_skip_answer(&answer) {
            return SummaryOutcome::Skip(SkipReason::ModelSaidSkip);
        }

        let summary = if is_video && !answer.contains(VIDEO_MARKER) {
            format!("{} {}", answer, VIDEO_MARKER)
        } else {
            answer
        };

        // Check and insert under one lock so concurrent workers cannot both accept the same story.
        let mut window = self.window.lock().await;
        let similarity = window.max_similarity(&summary);
        if !window.is_empty() && similarity >= self.config.dedup_threshold {
            debug!("Summary is {:.2} similar to a recent one, skipping", similarity);
            return SummaryOutcome::Skip(SkipReason::NearDuplicate);
        }
        window.push(summary.clone());

        SummaryOutcome::Summary(summary)
    }

    async fn ask_in_order(&self, adapters: Vec<Arc<dyn LlmAdapter>>, prompt: &str) -> Option<String> {
        for adapter in adapters {
            match adapter.complete(prompt).await {
                Ok(answer) => {
                    info!("{} answered", adapter.label());
                    return Some(answer);
                }
                Err(e) => warn!("{} failed: {}", adapter.label(), e),
            }
        }
        None
    }

    async fn ask_fan_out(&self, adapters: Vec<Arc<dyn LlmAdapter>>, prompt: &str) -> Option<String> {
        let mut pending: FuturesUnordered<_> = adapters
            .into_iter()
            .map(|adapter| async move {
                let result = adapter.complete(prompt).await;
                (adapter.label(), result)
            })
            .collect();

        while let Some((label, result)) = pending.next().await {
            match result {
                Ok(answer) => {
                    info!("{} answered first ({} requests dropped)", label, pending.len());
                    return Some(answer);
                }
                Err(e) => warn!("{} failed: {}", label, e),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_evicts_oldest() {
        let mut window = SummaryWindow::new(2);
        window.push("a".into());
        window.push("b".into());
        window.push("c".into());
        assert_eq!(window.entries(), vec!["b".to_string(), "c".to_string()]);
        assert_eq!(window.context(), "b\nc");
    }

    #[test]
    fn near_duplicates_ignore_case_spacing_and_marker() {
        let mut window = SummaryWindow::new(8);
        window.push("Central bank raised the key rate to 21 percent 🎬".into());
        assert!(window.near_duplicate("central bank  raised the key rate to 21 percent", 0.9));
        assert!(!window.near_duplicate("Heavy snow closed the airport for six hours", 0.9));
        assert!(!SummaryWindow::new(8).near_duplicate("anything", 0.1));
    }

    #[test]
    fn answer_cleaning_and_skip_detection() {
        assert_eq!(clean_answer("  The rate was raised...  "), "The rate was raised");
        assert!(is_skip_answer("SKIP"));
        assert!(is_skip_answer("skip."));
        assert!(!is_skip_answer("We do not skip this important sentence"));
    }

    #[test]
    fn prompt_carries_context_text_and_language() {
        let prompt = build_prompt("Body", "line one\nline two", "English");
        assert!(prompt.contains("in English"));
        assert!(prompt.contains("line one\nline two"));
        assert!(prompt.ends_with("News text: Body"));
    }

    #[test]
    fn strategy_parsing() {
        assert_eq!("FanOut".parse::<SummaryStrategy>().ok(), Some(SummaryStrategy::FanOut));
        assert_eq!("sequential".parse::<SummaryStrategy>().ok(), Some(SummaryStrategy::Sequential));
        assert!("bogus".parse::<SummaryStrategy>().is_err());
    }
}
