use std::sync::Arc;

use newsdesk::bot::Dispatcher;
use newsdesk::channel::TelegramChannel;
use newsdesk::config::Config;
use newsdesk::feed::{FeedClient, HttpExtractor};
use newsdesk::llm::OpenAiAnalyst;
use newsdesk::store::{DailyCache, Ledger, SeenStore};
use newsdesk::workflow::{LifecycleController, Workspace};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        channel = %config.channel_chat,
        model = %config.openai_model,
        data_dir = %config.data_dir.display(),
        interval_secs = config.check_interval.as_secs(),
        "newsdesk v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let channel = Arc::new(TelegramChannel::new(config.bot_token.clone()));
    let analyst = Arc::new(OpenAiAnalyst::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.openai_base_url.clone(),
    ));
    let source = Arc::new(FeedClient::new(config.feeds.clone()));
    let extractor = Arc::new(HttpExtractor::new());

    let seen = SeenStore::load(config.data_dir.join("seen.json"));
    let ledger = Ledger::load(config.data_dir.join("published_posts.json"));
    let daily = DailyCache::load(config.data_dir.join("daily_cache.json"));

    let controller = Arc::new(LifecycleController::new(
        channel.clone(),
        analyst,
        source,
        extractor,
        Arc::new(Workspace::new()),
        seen,
        ledger,
        daily,
        config.channel_chat.clone(),
        config.hype_threshold,
        config.resolver_failure_policy,
    ));

    let dispatcher = Arc::new(Dispatcher::new(channel, controller, config.check_interval));
    dispatcher.run().await;
    Ok(())
}
