use std::env;
use std::sync::Arc;

use poise::serenity_prelude::{self as serenity};
use serenity::GatewayIntents;
use tracing::info;

use spamwarden::detector::AbuseRateDetector;
use spamwarden::moderation::{ActionKind, BanExpiryHandler, MemoryCaseStore, ModerationService};
use spamwarden::platform::DiscordAdapter;
use spamwarden::scheduler::DelayScheduler;
use spamwarden::{BotConfig, Data, Error, commands, handlers, logging};

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    logging::init()?;

    let token = env::var("DISCORD_TOKEN").expect("DISCORD_TOKEN must be set");
    let config = BotConfig::load().await;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ban(),
                commands::softban(),
                commands::expunge(),
                commands::case(),
            ],
            pre_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_start(ctx);
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_end(ctx);
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    logging::log_command_error(&error);
                })
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::handle_event(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                let store = Arc::new(MemoryCaseStore::load(&config.case_file).await?);
                let platform = Arc::new(DiscordAdapter::new(ctx.http.clone()));

                let moderation = ModerationService::new(
                    store,
                    platform.clone(),
                    DelayScheduler::default(),
                );
                moderation.register_timed_handler(
                    ActionKind::Ban,
                    Arc::new(BanExpiryHandler::new(platform)),
                );

                let detector = Arc::new(AbuseRateDetector::new(config.detector.clone()));
                Ok(Data::new(config, detector, moderation))
            })
        })
        .build();

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Failed to create client");

    info!("Starting bot...");
    if let Err(err) = client.start().await {
        eprintln!("Error starting the bot: {err}");
    }

    Ok(())
}

fn main() {
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async_main());

    if let Err(err) = result {
        eprintln!("Error: {err}");
    }
}
