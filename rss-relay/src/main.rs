use anyhow::Context;
use clap::Parser;
use interfaces::state::SeenLinks;
use rss_relay::logging::init_logging;
use rss_relay::{
    build_reader, ArticleExtractor, Fetcher, ItemProcessor, RelayArgs, RelayPipeline, Summarizer,
    TelegramClient,
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = RelayArgs::parse();
    init_logging(args.log_json);

    info!("Starting rss-relay ({} reader at {})", args.reader_api, args.reader_url);

    args.validate()?;

    let reader = build_reader(&args.reader_api, args.reader_config())?;
    let publisher = Arc::new(TelegramClient::new(&args.telegram_api_url, &args.telegram_token, &args.chat_id)?);

    let fetcher = Arc::new(Fetcher::new(args.fetch_config())?);
    let extractor = ArticleExtractor::new(fetcher, args.max_text_chars);
    let summarizer = Summarizer::new(args.llm_registry()?, args.summarizer_config());
    let processor = Arc::new(ItemProcessor::new(extractor, summarizer));

    let mut pipeline = RelayPipeline::new(reader, publisher, processor, args.pipeline_settings());

    if let Some(path) = &args.seen_file {
        let seen = SeenLinks::load(path, args.seen_capacity)
            .await
            .with_context(|| format!("loading seen links from {}", path.display()))?;
        info!("Loaded {} seen links from {}", seen.len(), path.display());
        pipeline = pipeline.with_seen_links(seen);
    }

    if args.dry_run {
        info!("Dry run: nothing will be posted or marked read");
    }

    pipeline.run().await.map_err(|e| {
        error!("Relay stopped: {}", e);
        e
    })?;

    info!("rss-relay finished");
    Ok(())
}
