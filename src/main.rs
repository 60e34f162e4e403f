use morpheus::cache::ReplyCache;
use morpheus::commands::{guild, reply};
use morpheus::dispatch::{self, AutoreplyDispatcher};
use morpheus::messages::Msg;
use morpheus::services::phrases::PhraseService;
use morpheus::store::PhraseStore;
use morpheus::{config::Config, Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command /{}: {}", ctx.command().qualified_name, error);
            let _ = ctx.say(Msg::ErrorHappened.text()).await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = dispatch::handle_message(ctx, new_message, data).await {
                error!(
                    "Failed to send autoreply in channel {}: {}",
                    new_message.channel_id, e
                );
            }
        }
        serenity::FullEvent::GuildCreate { guild, .. } => {
            let guild_id = guild.id.to_string();
            match data.replies.hydrate(&guild_id).await {
                Ok(count) => info!("Loaded {} replies for guild {}", count, guild.name),
                Err(e) => warn!("Failed to load replies for guild {}: {}", guild.name, e),
            }
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            // An unavailable guild is an outage, not the bot leaving.
            if !incomplete.unavailable && data.replies.evict(&incomplete.id.to_string()) {
                info!("Dropped cached replies for guild {}", incomplete.id);
            }
        }
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);
    let discord_token = config.discord_token.clone();

    let db = morpheus::db::Database::new(&config)?;
    db.execute_init()?;

    let owners = config
        .owner_id
        .map(|id| std::collections::HashSet::from([serenity::UserId::new(id)]))
        .unwrap_or_default();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![reply::reply(), guild::edit_config(), guild::show_config()],
            owners,
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, _framework, data| Box::pin(handle_event(ctx, event, data)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot is ready as {}!", ready.user.name);

                if config.register_commands {
                    match config.dev_guild_id {
                        Some(guild_id) => {
                            poise::builtins::register_in_guild(
                                ctx,
                                &framework.options().commands,
                                serenity::GuildId::new(guild_id),
                            )
                            .await?
                        }
                        None => {
                            poise::builtins::register_globally(ctx, &framework.options().commands)
                                .await?
                        }
                    }
                }

                ctx.set_activity(Some(serenity::ActivityData::custom(&config.status_message)));

                let store: Arc<dyn PhraseStore> = Arc::new(db.clone());
                let replies = Arc::new(ReplyCache::new(store.clone()));
                let guild_ids: Vec<String> =
                    ready.guilds.iter().map(|guild| guild.id.to_string()).collect();
                let total = guild_ids.len();
                let loaded = replies.hydrate_all(guild_ids).await;
                info!("Hydrated replies for {}/{} guilds", loaded, total);

                Ok(Data {
                    db,
                    phrases: PhraseService::new(store, replies.clone()),
                    dispatcher: AutoreplyDispatcher::new(replies.clone(), ready.user.id.get()),
                    replies,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGES;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
