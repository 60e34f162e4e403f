use crate::cache::ReplyCache;
use crate::db::{normalize_key, NewPhrase, Phrase};
use crate::error::StoreResult;
use crate::store::PhraseStore;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(Phrase),
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed(Phrase),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOutcome {
    Empty,
    /// `(key, value)` pairs sorted by normalized key.
    Replies(Vec<(String, String)>),
}

/// Admin operations on a guild's autoreplies. Every successful mutation
/// writes the store first and then reloads the guild's cache snapshot from
/// the store.
#[derive(Clone)]
pub struct PhraseService {
    store: Arc<dyn PhraseStore>,
    cache: Arc<ReplyCache>,
}

impl PhraseService {
    pub fn new(store: Arc<dyn PhraseStore>, cache: Arc<ReplyCache>) -> Self {
        Self { store, cache }
    }

    pub async fn add(&self, phrase: NewPhrase) -> StoreResult<AddOutcome> {
        let guild_id = phrase.guild_id.clone();
        let key = phrase.key.clone();

        let Some(added) = self.store.add_phrase(phrase).await? else {
            return Ok(AddOutcome::Duplicate);
        };
        info!("Added reply '{}' in guild {}", key, guild_id);
        self.refresh_after_write(&guild_id).await;
        Ok(AddOutcome::Added(added))
    }

    pub async fn remove(&self, guild_id: &str, key: &str) -> StoreResult<RemoveOutcome> {
        let Some(removed) = self.store.remove_phrase(guild_id, key).await? else {
            return Ok(RemoveOutcome::NotFound);
        };
        info!("Removed reply '{}' in guild {}", removed.key, guild_id);
        self.refresh_after_write(guild_id).await;
        Ok(RemoveOutcome::Removed(removed))
    }

    /// Served from the cache when the guild is hydrated, otherwise straight
    /// from the store.
    pub async fn list(&self, guild_id: &str) -> StoreResult<ListOutcome> {
        let mut replies: Vec<(String, String)> = match self.cache.snapshot(guild_id) {
            Some(snapshot) => snapshot
                .values()
                .map(|phrase| (phrase.key.clone(), phrase.value.clone()))
                .collect(),
            None => self
                .store
                .get_phrases(guild_id)
                .await?
                .unwrap_or_default()
                .into_values()
                .map(|phrase| (phrase.key, phrase.value))
                .collect(),
        };

        if replies.is_empty() {
            return Ok(ListOutcome::Empty);
        }
        replies.sort_by_key(|(key, _)| normalize_key(key));
        Ok(ListOutcome::Replies(replies))
    }

    /// Trigger keys containing `partial` (case-insensitive), for autocomplete.
    pub async fn suggest_keys(&self, guild_id: &str, partial: &str, limit: usize) -> Vec<String> {
        let partial = partial.to_lowercase();
        match self.list(guild_id).await {
            Ok(ListOutcome::Replies(replies)) => replies
                .into_iter()
                .map(|(key, _)| key)
                .filter(|key| key.to_lowercase().contains(&partial))
                .take(limit)
                .collect(),
            Ok(ListOutcome::Empty) => Vec::new(),
            Err(e) => {
                warn!("Reply autocomplete failed for guild {}: {}", guild_id, e);
                Vec::new()
            }
        }
    }

    /// The write is already committed, so a failed reload is logged rather
    /// than reported; the previous snapshot stays in place until the next
    /// successful refresh.
    async fn refresh_after_write(&self, guild_id: &str) {
        if let Err(e) = self.cache.refresh(guild_id).await {
            warn!("Failed to refresh replies for guild {}: {}", guild_id, e);
        }
    }
}
