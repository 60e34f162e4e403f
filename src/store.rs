use crate::db::{Database, Guild, NewPhrase, Phrase};
use crate::error::StoreResult;
use async_trait::async_trait;
use std::collections::HashMap;

/// Normalized trigger -> phrase, for one guild.
pub type PhraseMap = HashMap<String, Phrase>;

/// Durable source of truth for guilds and their autoreply phrases.
///
/// `add_phrase` and `remove_phrase` return `None` for the expected
/// "duplicate" and "not found" outcomes; `Err` is reserved for the store
/// itself failing.
#[async_trait]
pub trait PhraseStore: Send + Sync {
    async fn get_guild(&self, guild_id: &str) -> StoreResult<Option<Guild>>;

    async fn create_guild(&self, guild_id: &str) -> StoreResult<Guild>;

    /// `None` if the guild has never been created, an empty map if it has
    /// no phrases.
    async fn get_phrases(&self, guild_id: &str) -> StoreResult<Option<PhraseMap>>;

    async fn add_phrase(&self, phrase: NewPhrase) -> StoreResult<Option<Phrase>>;

    async fn remove_phrase(&self, guild_id: &str, key: &str) -> StoreResult<Option<Phrase>>;
}

#[async_trait]
impl PhraseStore for Database {
    async fn get_guild(&self, guild_id: &str) -> StoreResult<Option<Guild>> {
        let guild_id = guild_id.to_string();
        self.run_blocking(move |db| db.get_guild(&guild_id)).await
    }

    async fn create_guild(&self, guild_id: &str) -> StoreResult<Guild> {
        let guild_id = guild_id.to_string();
        self.run_blocking(move |db| db.create_guild(&guild_id)).await
    }

    async fn get_phrases(&self, guild_id: &str) -> StoreResult<Option<PhraseMap>> {
        let guild_id = guild_id.to_string();
        self.run_blocking(move |db| db.get_phrases(&guild_id)).await
    }

    async fn add_phrase(&self, phrase: NewPhrase) -> StoreResult<Option<Phrase>> {
        self.run_blocking(move |db| db.insert_phrase(&phrase)).await
    }

    async fn remove_phrase(&self, guild_id: &str, key: &str) -> StoreResult<Option<Phrase>> {
        let guild_id = guild_id.to_string();
        let key = key.to_string();
        self.run_blocking(move |db| db.delete_phrase(&guild_id, &key))
            .await
    }
}
