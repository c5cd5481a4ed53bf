use anyhow::Result;
use clap::Parser;
use serenity::http::Http;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use clickpack_bot::config;
use clickpack_bot::decision::DecisionHandler;
use clickpack_bot::detector::SubmissionDetector;
use clickpack_bot::discord::{self, DiscordPlatform, Handler};
use clickpack_bot::dispatcher::ReviewDispatcher;
use clickpack_bot::pipeline::ArchivePipeline;
use clickpack_bot::platform::ChatPlatform;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let platform: Arc<dyn ChatPlatform> =
        Arc::new(DiscordPlatform::new(Arc::new(Http::new(&cfg.discord.bot_token))));

    let dispatcher = Arc::new(ReviewDispatcher::new(
        platform.clone(),
        cfg.discord.moderation_channel,
    ));
    let detector = Arc::new(SubmissionDetector::new(
        cfg.discord.watched_channels.clone(),
        dispatcher,
    ));
    let decisions = Arc::new(DecisionHandler::new(
        platform,
        Arc::new(ArchivePipeline::from_config(&cfg)),
        cfg.discord.announce_channel,
    ));

    info!(
        watched = ?cfg.discord.watched_channels,
        moderation_channel = cfg.discord.moderation_channel,
        "starting discord bot"
    );
    discord::run(&cfg.discord.bot_token, Handler::new(detector, decisions)).await
}
