pub mod types;
pub mod traits;
pub mod config;
pub mod sources;
pub mod fetcher;
pub mod parser;
pub mod rss_utils;
pub mod llm_adapter;
pub mod digest;
pub mod format;
pub mod telegram;
pub mod processing;
pub mod pipeline;
pub mod logging;

pub use types::*;
pub use traits::{FeedReader, Publisher};
pub use config::RelayArgs;
pub use sources::{build_reader, FeverClient, GReaderClient};
pub use fetcher::Fetcher;
pub use parser::ArticleExtractor;
pub use llm_adapter::{ChatCompletionAdapter, LlmAdapter, LlmAdapterBuilder, LlmAdapterRegistry, ProviderKind};
pub use digest::{Summarizer, SummarizerConfig, SummaryStrategy, SummaryWindow};
pub use telegram::TelegramClient;
pub use processing::{ItemProcessor, ProcessedItem};
pub use pipeline::{PipelineSettings, RelayPipeline};
