mod common;

use common::{article_text, init_tracing, input_item, FakeReader, ScriptedAdapter};
use interfaces::state::SeenLinks;
use rss_relay::format::{digest_entry, direct_post};
use rss_relay::types::*;
use rss_relay::{
    ArticleExtractor, Fetcher, ItemProcessor, LlmAdapterRegistry, PipelineSettings, RelayPipeline,
    Summarizer, SummarizerConfig, SummaryStrategy, TelegramClient,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOT_TOKEN: &str = "123456:TEST";
const SEND_PATH: &str = "/bot123456:TEST/sendMessage";

/// Answers depend on which article the prompt carries.
fn newsroom() -> ScriptedAdapter {
    ScriptedAdapter::with_fn("newsroom", |prompt| {
        let text = prompt.rsplit("News text: ").next().unwrap_or_default();
        let answer = if text.starts_with("ALPHA") {
            "Council approved the transit budget."
        } else if text.starts_with("BETA") {
            "Storm left ten thousand homes without power"
        } else if text.starts_with("GAMMA") {
            "SKIP"
        } else {
            "Something unrelated happened somewhere"
        };
        Ok(answer.to_string())
    })
}

fn processor() -> Result<Arc<ItemProcessor>> {
    processor_with(newsroom())
}

fn processor_with(adapter: ScriptedAdapter) -> Result<Arc<ItemProcessor>> {
    let fetcher = Arc::new(Fetcher::new(FetchConfig {
        min_host_interval_ms: 0,
        ..FetchConfig::default()
    })?);
    let extractor = ArticleExtractor::new(fetcher, 3500);

    let mut registry = LlmAdapterRegistry::new();
    registry.register_adapter(Arc::new(adapter));
    let summarizer = Summarizer::new(
        registry,
        SummarizerConfig {
            strategy: SummaryStrategy::Sequential,
            language: "English".to_string(),
            ..SummarizerConfig::default()
        },
    );
    Ok(Arc::new(ItemProcessor::new(extractor, summarizer)))
}

fn settings(categories: Vec<CategorySpec>) -> PipelineSettings {
    PipelineSettings {
        categories,
        workers: 2,
        youtube_pause: Duration::ZERO,
        ..PipelineSettings::default()
    }
}

async fn mount_articles(server: &MockServer) {
    for marker in ["ALPHA", "BETA", "GAMMA"] {
        let page = format!(
            "<html><body><nav>Menu</nav><article><p>{}</p></article></body></html>",
            article_text(marker)
        );
        Mock::given(method("GET"))
            .and(path(format!("/articles/{}", marker.to_lowercase())))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/videos/launch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><article>Short clip</article><video src='launch.mp4'></video></body></html>",
        ))
        .mount(server)
        .await;
}

async fn mount_telegram_ok(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn telegram(server: &MockServer) -> Result<Arc<TelegramClient>> {
    Ok(Arc::new(TelegramClient::new(&server.uri(), BOT_TOKEN, "-100500")?))
}

/// Form fields of every sendMessage call, in order.
async fn sent_messages(server: &MockServer) -> Vec<Vec<(String, String)>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == SEND_PATH)
        .map(|r| url::form_urlencoded::parse(&r.body).into_owned().collect())
        .collect()
}

fn field<'a>(form: &'a [(String, String)], name: &str) -> Option<&'a str> {
    form.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn digest_items(uri: &str) -> Vec<InputItem> {
    // Newest first, as the reader returns them
    let mut missing = input_item("id-delta", &format!("{}/articles/missing", uri), "Gone", "");
    missing.html = "<p>Too short</p>".to_string();
    vec![
        input_item("id-gamma", &format!("{}/articles/gamma", uri), "Gamma", "Gamma - Telegram Channel"),
        missing,
        input_item("id-beta", &format!("{}/articles/beta", uri), "Beta", "Beta - Telegram Channel"),
        input_item("id-alpha", &format!("{}/articles/alpha", uri), "Alpha", "Alpha - Telegram Channel"),
    ]
}

#[tokio::test]
async fn test_digest_category_end_to_end() -> Result<()> {
    init_tracing();
    info!("Testing digest delivery");

    let server = MockServer::start().await;
    mount_articles(&server).await;
    mount_telegram_ok(&server, 1).await;
    let uri = server.uri();

    let reader = Arc::new(FakeReader::new().with_items("World News", digest_items(&uri)));
    let pipeline = RelayPipeline::new(
        reader.clone(),
        telegram(&server)?,
        processor()?,
        settings(vec![CategorySpec::digest("World News")]),
    );

    let report = pipeline.run_once().await;
    let world = &report.categories[0];
    assert_eq!(world.fetched, 4);
    assert_eq!(world.summarized, 2);
    assert_eq!(world.skipped, 1);
    assert_eq!(world.unavailable, 1);
    assert_eq!(world.posted, 2);
    assert_eq!(world.marked_read, 3);

    let sent = sent_messages(&server).await;
    assert_eq!(sent.len(), 1);
    let expected = format!(
        "#WorldNews\n\n{}\n\n{}",
        digest_entry(&format!("{}/articles/alpha", uri), "Council approved the transit budget", "#Alpha"),
        digest_entry(&format!("{}/articles/beta", uri), "Storm left ten thousand homes without power", "#Beta"),
    );
    assert_eq!(field(&sent[0], "text"), Some(expected.as_str()), "oldest item comes first");
    assert_eq!(field(&sent[0], "chat_id"), Some("-100500"));
    assert_eq!(field(&sent[0], "parse_mode"), Some("HTML"));
    let preview: serde_json::Value = serde_json::from_str(field(&sent[0], "link_preview_options").unwrap_or("{}"))?;
    assert_eq!(preview, json!({ "is_disabled": true }));

    assert_eq!(
        reader.marked(),
        vec!["id-alpha".to_string(), "id-beta".to_string(), "id-gamma".to_string()],
        "summary-less item stays unread"
    );
    Ok(())
}

#[tokio::test]
async fn test_direct_category_posts_with_preview() -> Result<()> {
    init_tracing();

    let server = MockServer::start().await;
    mount_articles(&server).await;
    mount_telegram_ok(&server, 1).await;
    let link = format!("{}/videos/launch", server.uri());

    let reader = Arc::new(
        FakeReader::new().with_items("Video", vec![input_item("id-v", &link, "Launch recap", "Clips - Telegram Channel")]),
    );
    let pipeline = RelayPipeline::new(
        reader.clone(),
        telegram(&server)?,
        processor()?,
        settings(vec![CategorySpec::direct("Video")]),
    );

    let report = pipeline.run_once().await;
    assert_eq!(report.posted(), 1);
    assert_eq!(report.marked_read(), 1);

    let sent = sent_messages(&server).await;
    assert_eq!(
        field(&sent[0], "text"),
        Some(direct_post(&link, "Launch recap 🎬", "#Clips").as_str()),
        "video markup on the page adds the marker"
    );
    let preview: serde_json::Value = serde_json::from_str(field(&sent[0], "link_preview_options").unwrap_or("{}"))?;
    assert_eq!(preview["url"], link.as_str());
    assert_eq!(preview["is_disabled"], false);
    assert_eq!(reader.marked(), vec!["id-v".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_failed_send_leaves_items_unread() -> Result<()> {
    init_tracing();

    let server = MockServer::start().await;
    mount_articles(&server).await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "ok": false, "error_code": 400, "description": "Bad Request: chat not found" })),
        )
        .mount(&server)
        .await;
    let uri = server.uri();

    let reader = Arc::new(
        FakeReader::new()
            .with_items("World News", digest_items(&uri))
            .with_items("Video", vec![input_item("id-v", &format!("{}/videos/launch", uri), "Launch", "")]),
    );
    let pipeline = RelayPipeline::new(
        reader.clone(),
        telegram(&server)?,
        processor()?,
        settings(vec![CategorySpec::digest("World News"), CategorySpec::direct("Video")]),
    );

    let report = pipeline.run_once().await;
    assert_eq!(report.posted(), 0);
    assert_eq!(report.marked_read(), 0);
    assert!(reader.marked().is_empty(), "nothing is marked read when Telegram refuses");
    Ok(())
}

#[tokio::test]
async fn test_telegram_rate_limit_is_retried_once() -> Result<()> {
    init_tracing();

    let server = MockServer::start().await;
    mount_articles(&server).await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 0",
            "parameters": { "retry_after": 0 }
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_telegram_ok(&server, 1).await;

    let link = format!("{}/videos/launch", server.uri());
    let reader = Arc::new(FakeReader::new().with_items("Video", vec![input_item("id-v", &link, "Launch", "")]));
    let pipeline = RelayPipeline::new(
        reader.clone(),
        telegram(&server)?,
        processor()?,
        settings(vec![CategorySpec::direct("Video")]),
    );

    let report = pipeline.run_once().await;
    assert_eq!(report.posted(), 1);
    assert_eq!(sent_messages(&server).await.len(), 2, "one rejected attempt and one retry");
    assert_eq!(reader.marked(), vec!["id-v".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_seen_links_are_skipped_and_saved() -> Result<()> {
    init_tracing();

    let server = MockServer::start().await;
    mount_articles(&server).await;
    mount_telegram_ok(&server, 1).await;
    let uri = server.uri();
    let beta_link = format!("{}/articles/beta", uri);
    let alpha_link = format!("{}/articles/alpha", uri);

    let dir = tempfile::tempdir()?;
    let seen_path = dir.path().join("state").join("seen.txt");
    std::fs::create_dir_all(dir.path().join("state"))?;
    std::fs::write(&seen_path, format!("{}\n", beta_link))?;

    let seen = SeenLinks::load(&seen_path, 100)
        .await
        .map_err(|e| RelayError::General(e.to_string()))?;
    assert!(seen.contains(&beta_link));

    let reader = Arc::new(FakeReader::new().with_items("World News", digest_items(&uri)));
    let pipeline = RelayPipeline::new(
        reader.clone(),
        telegram(&server)?,
        processor()?,
        settings(vec![CategorySpec::digest("World News")]),
    )
    .with_seen_links(seen);

    let report = pipeline.run_once().await;
    let world = &report.categories[0];
    assert_eq!(world.already_seen, 1);
    assert_eq!(world.posted, 1);

    let sent = sent_messages(&server).await;
    let text = field(&sent[0], "text").unwrap_or_default();
    assert!(text.contains(&alpha_link));
    assert!(!text.contains(&beta_link), "already posted link is not repeated");
    assert_eq!(
        reader.marked(),
        vec!["id-alpha".to_string(), "id-beta".to_string(), "id-gamma".to_string()]
    );

    let saved = std::fs::read_to_string(&seen_path)?;
    let lines: Vec<&str> = saved.lines().collect();
    assert!(lines.contains(&beta_link.as_str()));
    assert!(lines.contains(&alpha_link.as_str()));
    Ok(())
}

#[tokio::test]
async fn test_dry_run_sends_and_marks_nothing() -> Result<()> {
    init_tracing();

    let server = MockServer::start().await;
    mount_articles(&server).await;
    mount_telegram_ok(&server, 0).await;
    let uri = server.uri();

    let dir = tempfile::tempdir()?;
    let seen_path = dir.path().join("seen.txt");
    let seen = SeenLinks::load(&seen_path, 100)
        .await
        .map_err(|e| RelayError::General(e.to_string()))?;

    let reader = Arc::new(
        FakeReader::new()
            .with_items("World News", digest_items(&uri))
            .with_items("Video", vec![input_item("id-v", &format!("{}/videos/launch", uri), "Launch", "")]),
    );
    let mut settings = settings(vec![CategorySpec::digest("World News"), CategorySpec::direct("Video")]);
    settings.dry_run = true;
    let pipeline = RelayPipeline::new(reader.clone(), telegram(&server)?, processor()?, settings).with_seen_links(seen);

    let report = pipeline.run_once().await;
    assert_eq!(report.posted(), 0);
    assert_eq!(report.categories[0].summarized, 2, "summaries are still produced");
    assert!(reader.marked().is_empty());
    assert!(!seen_path.exists(), "dry runs do not touch the seen file");
    Ok(())
}

#[tokio::test]
async fn test_reader_failure_only_affects_its_category() -> Result<()> {
    init_tracing();

    let server = MockServer::start().await;
    mount_articles(&server).await;
    mount_telegram_ok(&server, 1).await;
    let link = format!("{}/videos/launch", server.uri());

    let reader = Arc::new(
        FakeReader::new()
            .failing_on("Broken")
            .with_items("Video", vec![input_item("id-v", &link, "Launch", "")]),
    );
    let pipeline = RelayPipeline::new(
        reader.clone(),
        telegram(&server)?,
        processor()?,
        settings(vec![CategorySpec::digest("Broken"), CategorySpec::direct("Video")]),
    );

    let report = pipeline.run_once().await;
    assert_eq!(report.categories.len(), 2);
    assert_eq!(report.categories[0].fetched, 0);
    assert_eq!(report.categories[1].posted, 1);
    Ok(())
}

#[tokio::test]
async fn test_single_pass_run_logs_in_first() -> Result<()> {
    init_tracing();

    let server = MockServer::start().await;
    mount_telegram_ok(&server, 0).await;

    let reader = Arc::new(FakeReader::new());
    let pipeline = RelayPipeline::new(
        reader.clone(),
        telegram(&server)?,
        processor()?,
        settings(vec![CategorySpec::digest("Empty")]),
    );

    pipeline.run().await?;
    assert!(reader.marked().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_digest_of_only_skips_is_marked_read() -> Result<()> {
    init_tracing();

    let server = MockServer::start().await;
    mount_articles(&server).await;
    mount_telegram_ok(&server, 0).await;
    let uri = server.uri();

    let reader = Arc::new(FakeReader::new().with_items(
        "World News",
        vec![input_item("id-gamma", &format!("{}/articles/gamma", uri), "Gamma", "")],
    ));
    let pipeline = RelayPipeline::new(
        reader.clone(),
        telegram(&server)?,
        processor()?,
        settings(vec![CategorySpec::digest("World News")]),
    );

    let report = pipeline.run_once().await;
    let world = &report.categories[0];
    assert_eq!(world.skipped, 1);
    assert_eq!(world.posted, 0);
    assert_eq!(world.marked_read, 1);
    assert!(sent_messages(&server).await.is_empty(), "nothing to post");
    assert_eq!(reader.marked(), vec!["id-gamma".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_workers_accept_a_story_once() -> Result<()> {
    init_tracing();

    let server = MockServer::start().await;
    mount_articles(&server).await;
    mount_telegram_ok(&server, 1).await;
    let uri = server.uri();

    // Both answers are in flight together, so both prompts see an empty window.
    let adapter = ScriptedAdapter::answering_in_turn(
        "echo",
        &["Council approved the transit budget", "Council approved the transit budget."],
    )
    .with_delay(Duration::from_millis(100));

    let reader = Arc::new(FakeReader::new().with_items(
        "World News",
        vec![
            input_item("id-beta", &format!("{}/articles/beta", uri), "Beta", ""),
            input_item("id-alpha", &format!("{}/articles/alpha", uri), "Alpha", ""),
        ],
    ));
    let pipeline = RelayPipeline::new(
        reader.clone(),
        telegram(&server)?,
        processor_with(adapter)?,
        settings(vec![CategorySpec::digest("World News")]),
    );

    let report = pipeline.run_once().await;
    let world = &report.categories[0];
    assert_eq!(world.summarized, 1);
    assert_eq!(world.skipped, 1, "the second copy is a near duplicate");
    assert_eq!(world.posted, 1);

    let sent = sent_messages(&server).await;
    let text = field(&sent[0], "text").unwrap_or_default();
    assert_eq!(text.matches("📌").count(), 1);
    assert_eq!(reader.marked(), vec!["id-alpha".to_string(), "id-beta".to_string()]);
    Ok(())
}
