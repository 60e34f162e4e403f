use crate::config::{DISCORD_MESSAGE_LIMIT, MAX_ALLOWED_USERS, REPLY_LIST_CHUNK};
use crate::db::NewPhrase;
use crate::discord_text::{reply_list_line, split_by_separator};
use crate::error::StoreError;
use crate::messages::Msg;
use crate::services::phrases::{AddOutcome, ListOutcome, RemoveOutcome};
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use tracing::{error, info};

const MAX_SUGGESTIONS: usize = 10;

/// Autoreply commands
#[poise::command(slash_command, subcommands("add", "remove", "list"), guild_only)]
pub async fn reply(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Add an automatic reply to an exact message
#[poise::command(slash_command, guild_only)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Message that triggers the reply (case-insensitive)"] key: String,
    #[description = "Reply text"] reply: String,
    #[description = "File sent along with the reply"] attachment: Option<serenity::Attachment>,
    #[description = "Only reply to this user"] user1: Option<serenity::User>,
    #[description = "Only reply to this user"] user2: Option<serenity::User>,
    #[description = "Only reply to this user"] user3: Option<serenity::User>,
    #[description = "Only reply to this user"] user4: Option<serenity::User>,
    #[description = "Only reply to this user"] user5: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;

    let key = key.trim();
    if key.is_empty() {
        ctx.say(Msg::EmptyKey.text()).await?;
        return Ok(());
    }
    if reply.chars().count() > DISCORD_MESSAGE_LIMIT {
        ctx.say(Msg::ReplyTooLong.with(&[("limit", DISCORD_MESSAGE_LIMIT.to_string().as_str())]))
            .await?;
        return Ok(());
    }

    ctx.defer().await?;

    let users: Vec<String> = [user1, user2, user3, user4, user5]
        .into_iter()
        .flatten()
        .take(MAX_ALLOWED_USERS)
        .map(|user| user.id.to_string())
        .collect();
    let mut phrase = NewPhrase::new(guild_id.to_string(), key, reply).with_allowed_users(users);

    if let Some(attachment) = attachment {
        match attachment.download().await {
            Ok(data) => phrase = phrase.with_attachment(data, attachment.filename.clone()),
            Err(e) => {
                error!("Failed to download attachment {}: {}", attachment.filename, e);
                ctx.say(Msg::AttachmentFailed.with(&[("filename", attachment.filename.as_str())]))
                    .await?;
                return Ok(());
            }
        }
    }

    let outcome = match ctx.data().phrases.add(phrase).await {
        Ok(outcome) => outcome,
        Err(e) => return report_store_error(ctx, e).await,
    };

    match outcome {
        AddOutcome::Added(phrase) => {
            info!(
                "{} added reply '{}' in guild {}",
                ctx.author().name,
                phrase.key,
                guild_id
            );
            ctx.say(Msg::ReplyAdded.with(&[("key", phrase.key.as_str())])).await?;
        }
        AddOutcome::Duplicate => {
            ctx.say(Msg::ReplyExists.with(&[("key", key)])).await?;
        }
    }
    Ok(())
}

async fn autocomplete_key(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let Some(guild_id) = ctx.guild_id() else {
        return Vec::new();
    };
    ctx.data()
        .phrases
        .suggest_keys(&guild_id.to_string(), partial, MAX_SUGGESTIONS)
        .await
}

/// Remove an automatic reply
#[poise::command(slash_command, guild_only)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Trigger of the reply to remove"]
    #[autocomplete = "autocomplete_key"]
    key: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;

    let outcome = match ctx.data().phrases.remove(&guild_id.to_string(), &key).await {
        Ok(outcome) => outcome,
        Err(e) => return report_store_error(ctx, e).await,
    };

    match outcome {
        RemoveOutcome::Removed(phrase) => {
            info!(
                "{} removed reply '{}' in guild {}",
                ctx.author().name,
                phrase.key,
                guild_id
            );
            ctx.say(Msg::ReplyRemoved.with(&[("key", phrase.key.as_str())])).await?;
        }
        RemoveOutcome::NotFound => {
            ctx.say(Msg::ReplyNotFound.with(&[("key", key.as_str())])).await?;
        }
    }
    Ok(())
}

/// List automatic replies of this server
#[poise::command(slash_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;

    let outcome = match ctx.data().phrases.list(&guild_id.to_string()).await {
        Ok(outcome) => outcome,
        Err(e) => return report_store_error(ctx, e).await,
    };

    let ListOutcome::Replies(replies) = outcome else {
        ctx.say(Msg::NoReplies.text()).await?;
        return Ok(());
    };

    for (i, chunk) in render_listing(&replies).into_iter().enumerate() {
        if i == 0 {
            ctx.say(format!("{}{}", Msg::ReplyList.text(), chunk)).await?;
        } else {
            ctx.say(chunk).await?;
        }
    }
    Ok(())
}

/// ANSI code blocks of `key: value` lines, each below the listing chunk size.
fn render_listing(replies: &[(String, String)]) -> Vec<String> {
    let listing: String = replies
        .iter()
        .map(|(key, value)| reply_list_line(key, value))
        .collect();
    split_by_separator(&listing, REPLY_LIST_CHUNK, "\n")
        .into_iter()
        .map(|chunk| format!("```ansi\n{}```", chunk))
        .collect()
}

pub(crate) async fn report_store_error(ctx: Context<'_>, e: StoreError) -> Result<(), Error> {
    error!(
        "Store error in /{} (retryable: {}): {}",
        ctx.command().qualified_name,
        e.is_retryable(),
        e
    );
    ctx.say(Msg::StoreUnavailable.text()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_listing_chunks() {
        let replies: Vec<(String, String)> = (0..200)
            .map(|i| (format!("trigger {i}"), format!("reply number {i}")))
            .collect();
        let chunks = render_listing(&replies);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.starts_with("```ansi\n"));
            assert!(chunk.ends_with("```"));
            assert!(chunk.chars().count() <= REPLY_LIST_CHUNK + "```ansi\n```".len());
        }
        let all = chunks.concat();
        assert!(all.contains("trigger 0"));
        assert!(all.contains("reply number 199"));
    }
}
