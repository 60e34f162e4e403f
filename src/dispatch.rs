use crate::cache::ReplyCache;
use crate::db::{normalize_key, Attachment};
use crate::discord_text::mentions_bot;
use crate::messages::MORPHEUS_QUOTES;
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info};

/// Literal that is echoed back wherever it appears in a message.
const UH_OH: &str = "uh oh";

/// The parts of an inbound chat message the dispatcher looks at.
#[derive(Debug, Clone, Copy)]
pub struct IncomingMessage<'a> {
    pub guild_id: Option<&'a str>,
    pub author_id: &'a str,
    pub author_is_bot: bool,
    pub text: &'a str,
}

/// What the gateway layer should send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyIntent {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl ReplyIntent {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }
}

/// Decides whether a message deserves an automatic reply. Reads only the
/// reply cache, never the store.
pub struct AutoreplyDispatcher {
    cache: Arc<ReplyCache>,
    bot_id: u64,
}

impl AutoreplyDispatcher {
    pub fn new(cache: Arc<ReplyCache>, bot_id: u64) -> Self {
        Self { cache, bot_id }
    }

    pub fn decide(&self, message: &IncomingMessage<'_>) -> Option<ReplyIntent> {
        if message.author_is_bot {
            return None;
        }
        let guild_id = message.guild_id?;

        // Built-in replies win over anything configured by the guild.
        if message.text.contains(UH_OH) {
            return Some(ReplyIntent::text(UH_OH));
        }
        if mentions_bot(message.text, self.bot_id) {
            let quote = MORPHEUS_QUOTES
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(MORPHEUS_QUOTES[0]);
            return Some(ReplyIntent::text(quote));
        }

        let normalized = normalize_key(message.text);
        if normalized.is_empty() {
            return None;
        }
        let phrase = self.cache.lookup(guild_id, &normalized)?;

        if !phrase.permits(message.author_id) {
            debug!(
                "Reply '{}' in guild {} is restricted, ignoring author {}",
                phrase.key, guild_id, message.author_id
            );
            return None;
        }

        Some(ReplyIntent {
            text: phrase.value.clone(),
            attachment: phrase.attachment.clone(),
        })
    }
}

/// Gateway glue: run the dispatcher on a serenity message and send the reply.
pub async fn handle_message(
    ctx: &serenity::Context,
    new_message: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    let guild_id = new_message.guild_id.map(|id| id.to_string());
    let author_id = new_message.author.id.to_string();
    let incoming = IncomingMessage {
        guild_id: guild_id.as_deref(),
        author_id: &author_id,
        author_is_bot: new_message.author.bot,
        text: &new_message.content,
    };

    let Some(intent) = data.dispatcher.decide(&incoming) else {
        return Ok(());
    };

    let mut builder = serenity::CreateMessage::new().content(intent.text);
    if let Some(attachment) = intent.attachment {
        builder = builder.add_file(serenity::CreateAttachment::bytes(
            attachment.data,
            attachment.filename,
        ));
    }
    new_message
        .channel_id
        .send_message(&ctx.http, builder)
        .await?;

    info!(
        "Autoreply sent to {} in channel {}",
        new_message.author.name, new_message.channel_id
    );
    Ok(())
}
