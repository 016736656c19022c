//! Moderation commands

use std::collections::HashMap;

use poise::command;
use poise::serenity_prelude as serenity;

use crate::moderation::{ActionRecord, BanRequest, ExpungeRequest, ModerationError};
use crate::platform::PlatformError;
use crate::{Context, Error};

/// One-line summary of a case for command replies
fn describe(record: &ActionRecord) -> String {
    let mut line = format!(
        "Case #{}: {} user {}",
        record.case_number, record.kind, record.user_id
    );
    if let Some(expires_at) = record.expires_at {
        line.push_str(&format!(", until {}", expires_at.format("%Y-%m-%d %H:%M UTC")));
    }
    if record.completed_at.is_some() {
        line.push_str(" (completed)");
    } else if record.expunged_at.is_some() {
        line.push_str(" (expunged)");
    }
    line
}

/// Report precondition failures to the moderator; everything else goes to
/// the framework error hook.
async fn reply_or_raise(ctx: Context<'_>, result: Result<String, ModerationError>) -> Result<(), Error> {
    match result {
        Ok(message) => {
            ctx.say(message).await?;
            Ok(())
        }
        Err(ModerationError::Platform(PlatformError::NotSanctionable(msg))) => {
            ctx.say(format!("Cannot sanction that user: {msg}")).await?;
            Ok(())
        }
        Err(ModerationError::CaseNotFound { case_number, .. }) => {
            ctx.say(format!("No case #{case_number} in this guild")).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Ban a user, optionally for a limited time
#[command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "BAN_MEMBERS"
)]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "User to ban"] user: serenity::User,
    #[description = "Ban length in minutes; omit for permanent"] duration_minutes: Option<u64>,
    #[description = "Reason for the ban"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("ban requires a guild")?.get();

    let request = BanRequest {
        guild_id,
        user_id: user.id.get(),
        moderator_id: Some(ctx.author().id.get()),
        reason: reason.unwrap_or_else(|| "no reason given".to_string()),
        duration_ms: duration_minutes.map(|minutes| (minutes * 60_000) as i64),
        metadata: HashMap::new(),
    };

    let result = ctx.data().moderation.ban(request).await.map(|record| describe(&record));
    reply_or_raise(ctx, result).await
}

/// Ban and immediately unban a user to purge their recent messages
#[command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "BAN_MEMBERS"
)]
pub async fn softban(
    ctx: Context<'_>,
    #[description = "User to softban"] user: serenity::User,
    #[description = "Hours of messages to delete"] delete_hours: Option<u32>,
    #[description = "Reason for the softban"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("softban requires a guild")?.get();

    let request = BanRequest {
        guild_id,
        user_id: user.id.get(),
        moderator_id: Some(ctx.author().id.get()),
        reason: reason.unwrap_or_else(|| "no reason given".to_string()),
        duration_ms: None,
        metadata: HashMap::new(),
    };
    let delete_seconds = delete_hours.unwrap_or(24).saturating_mul(3_600);

    let result = ctx
        .data()
        .moderation
        .softban(request, delete_seconds)
        .await
        .map(|record| describe(&record));
    reply_or_raise(ctx, result).await
}

/// Void a case before its natural expiry
#[command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "BAN_MEMBERS"
)]
pub async fn expunge(
    ctx: Context<'_>,
    #[description = "Case number to expunge"] case_number: u64,
    #[description = "Why the case is being voided"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("expunge requires a guild")?.get();

    let request = ExpungeRequest {
        guild_id,
        case_number,
        moderator_id: ctx.author().id.get(),
        reason: reason.unwrap_or_else(|| "no reason given".to_string()),
    };

    let result = ctx
        .data()
        .moderation
        .expunge_case(request)
        .await
        .map(|record| format!("Expunged case #{}", record.case_number));
    reply_or_raise(ctx, result).await
}

/// Show one moderation case
#[command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "BAN_MEMBERS"
)]
pub async fn case(
    ctx: Context<'_>,
    #[description = "Case number to show"] case_number: u64,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("case requires a guild")?.get();

    let result = ctx
        .data()
        .moderation
        .get_case(guild_id, case_number)
        .await
        .and_then(|record| {
            record.ok_or(ModerationError::CaseNotFound {
                guild_id,
                case_number,
            })
        })
        .map(|record| describe(&record));
    reply_or_raise(ctx, result).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::{ActionKind, NewAction};

    #[test]
    fn test_command_definitions() {
        let cmd = ban();
        assert_eq!(cmd.name, "ban");
        assert!(cmd.guild_only);

        let cmd = softban();
        assert_eq!(cmd.name, "softban");

        let cmd = expunge();
        assert_eq!(cmd.name, "expunge");

        let cmd = case();
        assert_eq!(cmd.name, "case");
        assert!(cmd.guild_only);
    }

    #[test]
    fn test_describe_states() {
        let mut record = ActionRecord::new(NewAction {
            guild_id: 1,
            user_id: 2,
            moderator_id: Some(3),
            kind: ActionKind::Ban,
            reason: "flooding".to_string(),
            duration_ms: Some(60_000),
            metadata: HashMap::new(),
        });
        record.case_number = 7;

        let line = describe(&record);
        assert!(line.starts_with("Case #7: ban user 2, until "));

        record.expunged_at = Some(chrono::Utc::now());
        assert!(describe(&record).ends_with("(expunged)"));
    }
}
