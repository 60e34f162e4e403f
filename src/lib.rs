pub mod cache;
pub mod commands;
pub mod config;
pub mod db;
pub mod discord_text;
pub mod dispatch;
pub mod error;
pub mod messages;
pub mod services;
pub mod store;

/// Custom data passed to all commands
pub struct Data {
    pub db: db::Database,
    pub replies: std::sync::Arc<cache::ReplyCache>,
    pub phrases: services::phrases::PhraseService,
    pub dispatcher: dispatch::AutoreplyDispatcher,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
