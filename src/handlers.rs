//! Event glue
//!
//! Feeds incoming messages to the flood detector and turns violations
//! into automatic bans; runs startup recovery when the gateway reports
//! ready.

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use chrono::Utc;
use poise::serenity_prelude as serenity;
use serenity::{ChannelId, FullEvent, Message};
use tracing::{error, info, warn};

use crate::moderation::BanRequest;
use crate::{Data, EVENT_TARGET, Error};

pub async fn handle_event(
    ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot } => {
            info!("Connected as {}, shard {}", data_about_bot.user.name, ctx.shard_id);
            // Ready fires again after reconnects; recover only once.
            if !data.recovery_started.swap(true, Ordering::SeqCst) {
                data.moderation.on_client_ready().await;
            }
        }
        FullEvent::Message { new_message } => {
            handle_message(ctx, data, new_message).await;
        }
        _ => {}
    }
    Ok(())
}

/// Number of links carried by a message
fn count_links(content: &str) -> usize {
    content.matches("http://").count() + content.matches("https://").count()
}

async fn handle_message(ctx: &serenity::Context, data: &Data, message: &Message) {
    if message.author.bot {
        return;
    }
    let Some(guild_id) = message.guild_id else {
        return;
    };

    let user_id = message.author.id.get();
    let links = count_links(&message.content);
    let Some(violation) = data
        .detector
        .record(guild_id.get(), user_id, links, Utc::now())
    else {
        return;
    };

    info!(
        target: EVENT_TARGET,
        guild_id = guild_id.get(),
        user_id,
        reason = %violation.reason,
        "flood threshold crossed"
    );

    let duration_ms = (data.config.autoban_duration_minutes * 60_000) as i64;
    let request = BanRequest {
        guild_id: guild_id.get(),
        user_id,
        moderator_id: None,
        reason: violation.reason,
        duration_ms: Some(duration_ms),
        metadata: HashMap::from([("trigger".to_string(), "flood-detector".to_string())]),
    };

    match data.moderation.ban(request).await {
        Ok(record) => {
            // The burst that earned this ban must not trip the detector
            // again.
            data.detector.clear(guild_id.get(), user_id);

            if let Some(channel_id) = data.config.enforcement_log_channel_id {
                let until = record.expires_at.map_or_else(
                    || "further notice".to_string(),
                    |t| t.format("%Y-%m-%d %H:%M UTC").to_string(),
                );
                let notice = format!(
                    "Case #{}: <@{}> banned for flooding, until {}",
                    record.case_number, record.user_id, until
                );
                if let Err(e) = ChannelId::new(channel_id).say(&ctx.http, notice).await {
                    warn!(channel_id, error = %e, "could not post enforcement notice");
                }
            }
        }
        Err(e) => {
            error!(
                target: EVENT_TARGET,
                guild_id = guild_id.get(),
                user_id,
                error = %e,
                "automatic ban failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_links() {
        assert_eq!(count_links("hello"), 0);
        assert_eq!(count_links("see https://example.com"), 1);
        assert_eq!(
            count_links("http://a.example http://b.example https://c.example"),
            3
        );
    }
}
