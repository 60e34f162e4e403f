use super::{Attachment, Database, NewPhrase, Phrase};
use crate::error::StoreResult;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

const PHRASE_COLUMNS: &str = "hash_key, key, guild_id, value, attachment_data, attachment_filename, specific_users_id";

/// Lower-cased trigger text used both for lookups and as the hash input.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Hex SHA-256 of the normalized trigger.
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(normalize_key(key).as_bytes()))
}

struct PhraseRow {
    hash_key: String,
    key: String,
    guild_id: String,
    value: String,
    attachment_data: Option<Vec<u8>>,
    attachment_filename: Option<String>,
    specific_users_id: Option<String>,
}

impl PhraseRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            hash_key: row.get(0)?,
            key: row.get(1)?,
            guild_id: row.get(2)?,
            value: row.get(3)?,
            attachment_data: row.get(4)?,
            attachment_filename: row.get(5)?,
            specific_users_id: row.get(6)?,
        })
    }

    fn into_phrase(self) -> StoreResult<Phrase> {
        let attachment = match (self.attachment_data, self.attachment_filename) {
            (Some(data), Some(filename)) => Some(Attachment { data, filename }),
            _ => None,
        };
        let specific_users_id = match self.specific_users_id {
            Some(json) => {
                let users: BTreeSet<String> = serde_json::from_str(&json)?;
                Some(users).filter(|users| !users.is_empty())
            }
            None => None,
        };
        Ok(Phrase {
            hash_key: self.hash_key,
            key: self.key,
            guild_id: self.guild_id,
            value: self.value,
            attachment,
            specific_users_id,
        })
    }
}

fn select_phrase(conn: &Connection, guild_id: &str, hash: &str) -> StoreResult<Option<Phrase>> {
    let row = conn
        .query_row(
            &format!("SELECT {PHRASE_COLUMNS} FROM phrase WHERE guild_id = ?1 AND hash_key = ?2"),
            (guild_id, hash),
            PhraseRow::from_row,
        )
        .optional()?;
    row.map(PhraseRow::into_phrase).transpose()
}

impl Database {
    #[cfg(test)]
    pub(crate) fn get_phrase(&self, guild_id: &str, key: &str) -> StoreResult<Option<Phrase>> {
        let hash = hash_key(key);
        self.with_conn(|conn| select_phrase(conn, guild_id, &hash))
    }

    /// All phrases of a guild keyed by normalized trigger, or `None` if the
    /// guild row does not exist.
    pub fn get_phrases(&self, guild_id: &str) -> StoreResult<Option<HashMap<String, Phrase>>> {
        self.with_conn(|conn| {
            let exists = conn
                .prepare("SELECT 1 FROM guild WHERE guild_id = ?1")?
                .exists([guild_id])?;
            if !exists {
                return Ok(None);
            }

            let mut stmt =
                conn.prepare(&format!("SELECT {PHRASE_COLUMNS} FROM phrase WHERE guild_id = ?1"))?;
            let rows = stmt.query_map([guild_id], PhraseRow::from_row)?;

            let mut phrases = HashMap::new();
            for row in rows {
                let phrase = row?.into_phrase()?;
                phrases.insert(phrase.normalized_key(), phrase);
            }
            Ok(Some(phrases))
        })
    }

    /// Insert a phrase unless the guild already has one for the same
    /// normalized trigger. Returns `None` for a duplicate, whether it was
    /// caught by the pre-check or by the primary key.
    ///
    /// The guild row is created on demand so the foreign key never rejects
    /// an insert for a guild the bot has not hydrated yet.
    pub fn insert_phrase(&self, new: &NewPhrase) -> StoreResult<Option<Phrase>> {
        let hash = hash_key(&new.key);
        let users = if new.allowed_users.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&new.allowed_users)?)
        };
        let (attachment_data, attachment_filename) = match &new.attachment {
            Some(a) => (Some(a.data.as_slice()), Some(a.filename.as_str())),
            None => (None, None),
        };

        let result = self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT OR IGNORE INTO guild (guild_id) VALUES (?1)",
                [&new.guild_id],
            )?;
            if select_phrase(&tx, &new.guild_id, &hash)?.is_some() {
                return Ok(None);
            }
            tx.execute(
                &format!("INSERT INTO phrase ({PHRASE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                rusqlite::params![
                    hash,
                    new.key,
                    new.guild_id,
                    new.value,
                    attachment_data,
                    attachment_filename,
                    users,
                ],
            )?;
            let inserted = select_phrase(&tx, &new.guild_id, &hash)?;
            tx.commit()?;
            Ok(inserted)
        });

        match result {
            Err(e) if e.is_unique_violation() => {
                debug!(
                    "Database: Phrase '{}' in guild {} lost an insert race",
                    new.key, new.guild_id
                );
                Ok(None)
            }
            other => other,
        }
    }

    /// Delete the phrase matching `key` case-insensitively and return what
    /// was stored, or `None` if nothing matched.
    pub fn delete_phrase(&self, guild_id: &str, key: &str) -> StoreResult<Option<Phrase>> {
        let hash = hash_key(key);
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(phrase) = select_phrase(&tx, guild_id, &hash)? else {
                return Ok(None);
            };
            tx.execute(
                "DELETE FROM phrase WHERE guild_id = ?1 AND hash_key = ?2",
                (guild_id, &hash),
            )?;
            tx.commit()?;
            Ok(Some(phrase))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.execute_init().unwrap();
        db
    }

    #[test]
    fn test_hash_key_is_case_insensitive() {
        assert_eq!(hash_key("Hello There"), hash_key("hello there"));
        assert_ne!(hash_key("hello"), hash_key("hello there"));
        // sha256("hello")
        assert_eq!(
            hash_key("HELLO"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_get_phrases_distinguishes_missing_guild() {
        let db = test_db();
        assert!(db.get_phrases("g1").unwrap().is_none());

        db.create_guild("g1").unwrap();
        let phrases = db.get_phrases("g1").unwrap().unwrap();
        assert!(phrases.is_empty());
    }

    #[test]
    fn test_insert_and_duplicate() {
        let db = test_db();
        db.create_guild("g1").unwrap();

        let phrase = db
            .insert_phrase(&NewPhrase::new("g1", "Hello There", "general kenobi"))
            .unwrap()
            .unwrap();
        assert_eq!(phrase.key, "Hello There");
        assert_eq!(phrase.hash_key, hash_key("hello there"));
        assert!(phrase.specific_users_id.is_none());

        let dup = db
            .insert_phrase(&NewPhrase::new("g1", "HELLO THERE", "other"))
            .unwrap();
        assert!(dup.is_none());

        let phrases = db.get_phrases("g1").unwrap().unwrap();
        assert_eq!(phrases.len(), 1);
        assert_eq!(phrases["hello there"].value, "general kenobi");
    }

    #[test]
    fn test_insert_losing_race_on_primary_key_is_duplicate() {
        let db = test_db();
        // Writes a competing row after the pre-check has found nothing, so the
        // insert itself hits the primary key.
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TEMP TRIGGER competing_insert BEFORE INSERT ON phrase
                 WHEN NEW.value <> 'winner'
                 BEGIN
                     INSERT INTO phrase (guild_id, hash_key, key, value)
                     VALUES (NEW.guild_id, NEW.hash_key, NEW.key, 'winner');
                 END;",
            )?;
            Ok(())
        })
        .unwrap();

        let result = db.insert_phrase(&NewPhrase::new("g1", "race", "loser")).unwrap();
        assert!(result.is_none());
        // The failed transaction left nothing behind.
        assert!(db.get_phrase("g1", "race").unwrap().is_none());
    }

    #[test]
    fn test_same_trigger_in_two_guilds() {
        let db = test_db();
        assert!(db.insert_phrase(&NewPhrase::new("g1", "hi", "one")).unwrap().is_some());
        assert!(db.insert_phrase(&NewPhrase::new("g2", "hi", "two")).unwrap().is_some());
        assert_eq!(db.get_phrase("g2", "HI").unwrap().unwrap().value, "two");
    }

    #[test]
    fn test_attachment_and_allow_list_round_trip() {
        let db = test_db();
        let new = NewPhrase::new("g1", "pic", "look")
            .with_attachment(vec![0x89, b'P', b'N', b'G', 0, 1, 2], "pic.png")
            .with_allowed_users(["u1", "u2"]);
        db.insert_phrase(&new).unwrap().unwrap();

        let stored = db.get_phrase("g1", "pic").unwrap().unwrap();
        let attachment = stored.attachment.unwrap();
        assert_eq!(attachment.data, vec![0x89, b'P', b'N', b'G', 0, 1, 2]);
        assert_eq!(attachment.filename, "pic.png");
        let users = stored.specific_users_id.unwrap();
        assert!(users.contains("u1") && users.contains("u2"));
    }

    #[test]
    fn test_half_attachment_is_rejected_by_schema() {
        let db = test_db();
        db.create_guild("g1").unwrap();
        let result = db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO phrase (guild_id, hash_key, key, value, attachment_filename)
                 VALUES ('g1', 'h', 'k', 'v', 'orphan.png')",
                [],
            )?;
            Ok(())
        });
        let err = result.unwrap_err();
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn test_delete_phrase() {
        let db = test_db();
        assert!(db.delete_phrase("g1", "hi").unwrap().is_none());

        db.insert_phrase(&NewPhrase::new("g1", "Hi", "hello")).unwrap();
        let removed = db.delete_phrase("g1", "hI").unwrap().unwrap();
        assert_eq!(removed.key, "Hi");
        assert_eq!(removed.value, "hello");
        assert!(db.get_phrase("g1", "hi").unwrap().is_none());

        // Key is reusable after deletion.
        assert!(db.insert_phrase(&NewPhrase::new("g1", "hi", "again")).unwrap().is_some());
    }
}
