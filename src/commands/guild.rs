use crate::commands::reply::report_store_error;
use crate::messages::Msg;
use crate::services::phrases::ListOutcome;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use tracing::info;

/// Edit the configuration of this server
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
pub async fn edit_config(
    ctx: Context<'_>,
    #[description = "Channel for bot announcements"]
    #[channel_types("Text")]
    info_channel: serenity::GuildChannel,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?.to_string();
    let channel_id = info_channel.id.to_string();

    let result = {
        let guild_id = guild_id.clone();
        ctx.data()
            .db
            .run_blocking(move |db| db.set_info_channel(&guild_id, &channel_id))
            .await
    };
    if let Err(e) = result {
        return report_store_error(ctx, e).await;
    }

    info!("Info channel of guild {} set to {}", guild_id, info_channel.id);
    ctx.say(Msg::InfoChannelSet.with(&[("channel", format!("<#{}>", info_channel.id).as_str())]))
        .await?;
    Ok(())
}

/// Show the configuration of this server
#[poise::command(slash_command, guild_only)]
pub async fn show_config(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?.to_string();

    let info_channel = {
        let guild_id = guild_id.clone();
        ctx.data()
            .db
            .run_blocking(move |db| db.get_info_channel(&guild_id))
            .await
    };
    let info_channel = match info_channel {
        Ok(channel) => channel,
        Err(e) => return report_store_error(ctx, e).await,
    };

    let count = match ctx.data().phrases.list(&guild_id).await {
        Ok(ListOutcome::Replies(replies)) => replies.len(),
        Ok(ListOutcome::Empty) => 0,
        Err(e) => return report_store_error(ctx, e).await,
    };

    let channel = info_channel
        .map(|id| format!("<#{}>", id))
        .unwrap_or_else(|| Msg::NoInfoChannel.text());
    ctx.say(Msg::ConfigSummary.with(&[("channel", channel.as_str()), ("count", count.to_string().as_str())]))
        .await?;
    Ok(())
}
