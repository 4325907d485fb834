use crate::digest::{SummarizerConfig, SummaryStrategy};
use crate::llm_adapter::{LlmAdapterBuilder, LlmAdapterRegistry, ProviderKind};
use crate::pipeline::PipelineSettings;
use crate::types::{CategorySpec, FetchConfig, ReaderConfig, RelayError, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OPENROUTER_MODELS: &str = "google/gemini-2.0-flash-lite-preview-02-05:free,\
google/gemini-2.0-pro-experimental-02-05:free,\
google/gemini-2.0-flash-lite-001,\
meta-llama/llama-3.3-70b-instruct:free,\
deepseek/deepseek-r1:free";

/// Upper bound for the per-category worker pool.
pub const MAX_WORKERS: usize = 8;

/// Everything comes from the environment; every variable can also be given as a flag.
#[derive(Debug, Clone, Parser)]
#[command(name = "rss-relay", version, about = "Relay unread reader items to a Telegram chat, optionally as LLM digests")]
pub struct RelayArgs {
    /// Reader base URL, e.g. https://rss.example.com
    #[arg(long, env = "FRESHRSS_URL")]
    pub reader_url: String,

    #[arg(long, env = "FRESHRSS_USER")]
    pub reader_user: String,

    #[arg(long, env = "FRESHRSS_PASS", hide_env_values = true)]
    pub reader_pass: String,

    /// Reader protocol: greader or fever
    #[arg(long, env = "READER_API", default_value = "greader")]
    pub reader_api: String,

    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: String,

    /// Group and channel ids are negative, e.g. -1001234567890
    #[arg(long, env = "CHAT_ID", allow_hyphen_values = true)]
    pub chat_id: String,

    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,

    /// Comma separated categories delivered as summarized digests
    #[arg(long, env = "CATEGORIES_AI", default_value = "")]
    pub categories_ai: String,

    /// Comma separated categories posted item by item
    #[arg(long, env = "CATEGORIES_DIRECT", default_value = "")]
    pub categories_direct: String,

    #[arg(long, env = "OPENROUTER_KEY", hide_env_values = true)]
    pub openrouter_key: Option<String>,

    #[arg(long, env = "AI_MODELS", default_value = DEFAULT_OPENROUTER_MODELS)]
    pub openrouter_models: String,

    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub groq_key: Option<String>,

    #[arg(long, env = "GROQ_MODELS", default_value = "llama-3.3-70b-versatile")]
    pub groq_models: String,

    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    pub mistral_key: Option<String>,

    #[arg(long, env = "MISTRAL_MODELS", default_value = "mistral-small-latest")]
    pub mistral_models: String,

    #[arg(long, env = "COHERE_API_KEY", hide_env_values = true)]
    pub cohere_key: Option<String>,

    #[arg(long, env = "COHERE_MODELS", default_value = "command-r-08-2024")]
    pub cohere_models: String,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_key: Option<String>,

    #[arg(long, env = "GEMINI_MODELS", default_value = "gemini-2.0-flash")]
    pub gemini_models: String,

    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    #[arg(long, env = "HF_MODELS", default_value = "meta-llama/Llama-3.3-70B-Instruct")]
    pub hf_models: String,

    /// sequential, shuffled or fanout
    #[arg(long, env = "SUMMARY_STRATEGY", default_value = "shuffled")]
    pub summary_strategy: SummaryStrategy,

    #[arg(long, env = "SUMMARY_WINDOW", default_value_t = 8)]
    pub summary_window: usize,

    #[arg(long, env = "DEDUP_THRESHOLD", default_value_t = 0.9)]
    pub dedup_threshold: f64,

    #[arg(long, env = "SUMMARY_LANGUAGE", default_value = "Russian")]
    pub summary_language: String,

    #[arg(long, env = "MIN_TEXT_CHARS", default_value_t = 100)]
    pub min_text_chars: usize,

    #[arg(long, env = "MAX_TEXT_CHARS", default_value_t = 3500)]
    pub max_text_chars: usize,

    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value_t = 30)]
    pub llm_timeout_secs: u64,

    #[arg(long, env = "ITEMS_PER_CATEGORY", default_value_t = 80)]
    pub items_per_category: usize,

    #[arg(long, env = "WORKERS", default_value_t = 2)]
    pub workers: usize,

    #[arg(long, env = "YOUTUBE_PAUSE_SECS", default_value_t = 15)]
    pub youtube_pause_secs: u64,

    /// Flat file of already posted links
    #[arg(long, env = "SEEN_FILE")]
    pub seen_file: Option<PathBuf>,

    #[arg(long, env = "SEEN_CAPACITY", default_value_t = 500)]
    pub seen_capacity: usize,

    /// Keep polling with this interval instead of a single pass
    #[arg(long, env = "POLL_INTERVAL_SECS")]
    pub poll_interval_secs: Option<u64>,

    /// Log messages instead of sending them; nothing is marked read
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,

    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

/// Split a comma separated list, dropping blank entries.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl RelayArgs {
    /// Digest categories first, then direct ones.
    pub fn categories(&self) -> Vec<CategorySpec> {
        split_list(&self.categories_ai)
            .into_iter()
            .map(CategorySpec::digest)
            .chain(split_list(&self.categories_direct).into_iter().map(CategorySpec::direct))
            .collect()
    }

    fn providers(&self) -> [(ProviderKind, Option<&str>, &str); 6] {
        [
            (ProviderKind::OpenRouter, self.openrouter_key.as_deref(), self.openrouter_models.as_str()),
            (ProviderKind::Groq, self.groq_key.as_deref(), self.groq_models.as_str()),
            (ProviderKind::Mistral, self.mistral_key.as_deref(), self.mistral_models.as_str()),
            (ProviderKind::Cohere, self.cohere_key.as_deref(), self.cohere_models.as_str()),
            (ProviderKind::Gemini, self.gemini_key.as_deref(), self.gemini_models.as_str()),
            (ProviderKind::HuggingFace, self.hf_token.as_deref(), self.hf_models.as_str()),
        ]
    }

    /// Providers that have a key and at least one model.
    pub fn enabled_providers(&self) -> Vec<ProviderKind> {
        self.providers()
            .into_iter()
            .filter(|(_, key, models)| {
                key.is_some_and(|k| !k.trim().is_empty()) && !split_list(models).is_empty()
            })
            .map(|(kind, _, _)| kind)
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let categories = self.categories();
        if categories.is_empty() {
            return Err(RelayError::Config(
                "no categories configured (CATEGORIES_AI / CATEGORIES_DIRECT)".to_string(),
            ));
        }
        if !split_list(&self.categories_ai).is_empty() && self.enabled_providers().is_empty() {
            return Err(RelayError::Config(
                "digest categories need at least one LLM provider key".to_string(),
            ));
        }
        if self.summary_window == 0 {
            return Err(RelayError::Config("SUMMARY_WINDOW must be at least 1".to_string()));
        }
        if self.workers == 0 {
            return Err(RelayError::Config("WORKERS must be at least 1".to_string()));
        }
        if !(self.dedup_threshold > 0.0 && self.dedup_threshold <= 1.0) {
            return Err(RelayError::Config("DEDUP_THRESHOLD must be in (0, 1]".to_string()));
        }
        Ok(())
    }

    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig::new(&self.reader_url, &self.reader_user, &self.reader_pass)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig::default()
    }

    pub fn summarizer_config(&self) -> SummarizerConfig {
        SummarizerConfig {
            strategy: self.summary_strategy,
            window_size: self.summary_window,
            dedup_threshold: self.dedup_threshold,
            language: self.summary_language.clone(),
            min_text_chars: self.min_text_chars,
        }
    }

    pub fn llm_registry(&self) -> Result<LlmAdapterRegistry> {
        let builder = self
            .providers()
            .into_iter()
            .fold(LlmAdapterBuilder::new(self.llm_timeout_secs)?, |builder, (kind, key, models)| {
                builder.add_provider(kind, key, &split_list(models))
            });
        Ok(builder.build())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            categories: self.categories(),
            items_per_category: self.items_per_category,
            workers: self.workers.clamp(1, MAX_WORKERS),
            youtube_pause: Duration::from_secs(self.youtube_pause_secs),
            poll_interval: self.poll_interval_secs.map(Duration::from_secs),
            dry_run: self.dry_run,
        }
    }
}
