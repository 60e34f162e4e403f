use crate::db::Phrase;
use crate::error::{StoreError, StoreResult};
use crate::store::PhraseStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Immutable snapshot of one guild's replies, keyed by normalized trigger.
pub type GuildReplies = HashMap<String, Arc<Phrase>>;

struct Entry {
    generation: u64,
    /// `None` once the guild is evicted, so older in-flight reads stay out.
    replies: Option<Arc<GuildReplies>>,
}

/// In-process projection of every guild's phrases.
///
/// Each guild's mapping is built off to the side and then swapped in as a
/// whole, so readers see either the previous snapshot or the new one. The
/// lock only guards the pointer swap and is never held across an await.
pub struct ReplyCache {
    store: Arc<dyn PhraseStore>,
    guilds: RwLock<HashMap<String, Entry>>,
    generation: AtomicU64,
}

impl ReplyCache {
    pub fn new(store: Arc<dyn PhraseStore>) -> Self {
        Self {
            store,
            guilds: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Load the guild's phrases from the store (creating the guild row if
    /// needed) and install them as the guild's snapshot. Returns the number
    /// of phrases installed.
    ///
    /// On failure the previous snapshot, if any, is left untouched.
    pub async fn hydrate(&self, guild_id: &str) -> StoreResult<usize> {
        // Taken before reading the store: a snapshot read earlier never
        // replaces one read later.
        let generation = self.next_generation();

        if self.store.get_guild(guild_id).await?.is_none() {
            match self.store.create_guild(guild_id).await {
                Ok(_) => info!("Created guild row for {}", guild_id),
                // Another hydration created it first.
                Err(e) if e.is_unique_violation() => {}
                Err(e) => return Err(e),
            }
        }

        let phrases = self.store.get_phrases(guild_id).await?.unwrap_or_default();
        let replies: GuildReplies = phrases
            .into_iter()
            .map(|(key, phrase)| (key, Arc::new(phrase)))
            .collect();
        let count = replies.len();

        self.install(guild_id, generation, replies)?;
        Ok(count)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Swap in `replies` unless a newer read or an eviction got there first.
    fn install(&self, guild_id: &str, generation: u64, replies: GuildReplies) -> StoreResult<bool> {
        let mut guilds = self.guilds.write().map_err(|_| StoreError::LockPoisoned)?;
        if let Some(current) = guilds.get(guild_id) {
            if current.generation > generation {
                debug!(
                    "Discarding stale snapshot for guild {} (generation {} < {})",
                    guild_id, generation, current.generation
                );
                return Ok(false);
            }
        }
        debug!("Hydrated guild {} with {} replies", guild_id, replies.len());
        guilds.insert(
            guild_id.to_string(),
            Entry {
                generation,
                replies: Some(Arc::new(replies)),
            },
        );
        Ok(true)
    }

    /// Re-hydrate after a mutation so the snapshot matches the store.
    pub async fn refresh(&self, guild_id: &str) -> StoreResult<usize> {
        self.hydrate(guild_id).await
    }

    /// Hydrate every guild, logging failures instead of aborting. Returns
    /// how many guilds were loaded.
    pub async fn hydrate_all<I, S>(&self, guild_ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut loaded = 0;
        for guild_id in guild_ids {
            let guild_id = guild_id.as_ref();
            match self.hydrate(guild_id).await {
                Ok(_) => loaded += 1,
                Err(e) => warn!("Failed to hydrate replies for guild {}: {}", guild_id, e),
            }
        }
        loaded
    }

    /// Reply for an already-normalized message text. `None` when the guild
    /// was never hydrated or nothing matches.
    pub fn lookup(&self, guild_id: &str, normalized_text: &str) -> Option<Arc<Phrase>> {
        self.snapshot(guild_id)?.get(normalized_text).cloned()
    }

    /// The guild's current snapshot, if hydrated.
    pub fn snapshot(&self, guild_id: &str) -> Option<Arc<GuildReplies>> {
        let guilds = self.guilds.read().ok()?;
        guilds.get(guild_id)?.replies.clone()
    }

    #[cfg(test)]
    pub(crate) fn is_hydrated(&self, guild_id: &str) -> bool {
        self.snapshot(guild_id).is_some()
    }

    /// Drop a guild's snapshot, e.g. when the bot leaves it. Hydrations that
    /// started before the eviction are discarded when they finish. Returns
    /// whether a snapshot was dropped.
    pub fn evict(&self, guild_id: &str) -> bool {
        let generation = self.next_generation();
        let Ok(mut guilds) = self.guilds.write() else {
            return false;
        };
        let previous = guilds.insert(
            guild_id.to_string(),
            Entry {
                generation,
                replies: None,
            },
        );
        previous.is_some_and(|entry| entry.replies.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewPhrase;
    use crate::store::testing::FlakyStore;

    fn setup() -> (Arc<FlakyStore>, ReplyCache) {
        let store = Arc::new(FlakyStore::new());
        let cache = ReplyCache::new(store.clone());
        (store, cache)
    }

    #[tokio::test]
    async fn test_lookup_before_hydration_is_none() {
        let (_store, cache) = setup();
        assert!(cache.lookup("g1", "hi").is_none());
        assert!(!cache.is_hydrated("g1"));
    }

    #[tokio::test]
    async fn test_hydrate_creates_guild_row() {
        let (store, cache) = setup();
        assert_eq!(cache.hydrate("g1").await.unwrap(), 0);
        assert!(cache.is_hydrated("g1"));
        assert!(store.db.get_guild("g1").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_hydrate_is_idempotent() {
        let (store, cache) = setup();
        store
            .db
            .insert_phrase(&NewPhrase::new("g1", "Hello There", "general kenobi"))
            .unwrap();

        cache.hydrate("g1").await.unwrap();
        let first = cache.snapshot("g1").unwrap();
        cache.hydrate("g1").await.unwrap();
        let second = cache.snapshot("g1").unwrap();

        assert_eq!(*first, *second);
        assert_eq!(
            cache.lookup("g1", "hello there").unwrap().value,
            "general kenobi"
        );
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot_wholesale() {
        let (store, cache) = setup();
        store.db.insert_phrase(&NewPhrase::new("g1", "a", "1")).unwrap();
        cache.hydrate("g1").await.unwrap();
        let before = cache.snapshot("g1").unwrap();

        store.db.delete_phrase("g1", "a").unwrap();
        store.db.insert_phrase(&NewPhrase::new("g1", "b", "2")).unwrap();
        cache.refresh("g1").await.unwrap();

        // Readers holding the old snapshot keep a complete, consistent view.
        assert!(before.contains_key("a"));
        assert!(!before.contains_key("b"));

        assert!(cache.lookup("g1", "a").is_none());
        assert_eq!(cache.lookup("g1", "b").unwrap().value, "2");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let (store, cache) = setup();
        store.db.insert_phrase(&NewPhrase::new("g1", "hi", "hello")).unwrap();
        cache.hydrate("g1").await.unwrap();

        store.set_down(true);
        let err = cache.refresh("g1").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(cache.lookup("g1", "hi").unwrap().value, "hello");

        store.set_down(false);
        cache.refresh("g1").await.unwrap();
        assert_eq!(cache.lookup("g1", "hi").unwrap().value, "hello");
    }

    #[tokio::test]
    async fn test_hydrate_all_skips_failures() {
        let (store, cache) = setup();
        store.set_down(true);
        assert_eq!(cache.hydrate_all(["g1", "g2"]).await, 0);
        assert!(!cache.is_hydrated("g1"));

        store.set_down(false);
        assert_eq!(cache.hydrate_all(["g1", "g2"]).await, 2);
    }

    #[tokio::test]
    async fn test_hydrate_all_runs_on_spawned_task() {
        let (store, cache) = setup();
        store.db.insert_phrase(&NewPhrase::new("g1", "hi", "hello")).unwrap();
        let cache = Arc::new(cache);

        let guild_ids: Vec<String> = ["g1", "g2"].iter().map(|id| id.to_string()).collect();
        let loaded = tokio::spawn({
            let cache = cache.clone();
            async move { cache.hydrate_all(guild_ids).await }
        })
        .await
        .unwrap();

        assert_eq!(loaded, 2);
        assert_eq!(cache.lookup("g1", "hi").unwrap().value, "hello");
    }

    #[tokio::test]
    async fn test_guilds_are_independent() {
        let (store, cache) = setup();
        store.db.insert_phrase(&NewPhrase::new("g1", "hi", "one")).unwrap();
        store.db.insert_phrase(&NewPhrase::new("g2", "hi", "two")).unwrap();
        cache.hydrate_all(["g1", "g2"]).await;

        assert_eq!(cache.lookup("g1", "hi").unwrap().value, "one");
        assert_eq!(cache.lookup("g2", "hi").unwrap().value, "two");

        assert!(cache.evict("g1"));
        assert!(cache.lookup("g1", "hi").is_none());
        assert_eq!(cache.lookup("g2", "hi").unwrap().value, "two");
    }

    #[tokio::test]
    async fn test_evict_discards_hydration_started_before_it() {
        let (store, cache) = setup();
        store.db.insert_phrase(&NewPhrase::new("g1", "hi", "hello")).unwrap();
        cache.hydrate("g1").await.unwrap();

        // A refresh reads the store, then the bot leaves before it installs.
        let in_flight = cache.next_generation();
        let phrases = store.db.get_phrases("g1").unwrap().unwrap();
        assert!(cache.evict("g1"));
        let replies = phrases
            .into_iter()
            .map(|(key, phrase)| (key, Arc::new(phrase)))
            .collect();
        assert!(!cache.install("g1", in_flight, replies).unwrap());
        assert!(!cache.is_hydrated("g1"));
        assert!(!cache.evict("g1"));

        // Rejoining hydrates again.
        cache.hydrate("g1").await.unwrap();
        assert_eq!(cache.lookup("g1", "hi").unwrap().value, "hello");
    }
}
