use super::{Database, Guild};
use crate::error::StoreResult;
use rusqlite::OptionalExtension;
use tracing::debug;

impl Database {
    pub fn get_guild(&self, guild_id: &str) -> StoreResult<Option<Guild>> {
        self.with_conn(|conn| {
            let guild = conn
                .query_row(
                    "SELECT guild_id, info_channel_id FROM guild WHERE guild_id = ?1",
                    [guild_id],
                    |row| {
                        Ok(Guild {
                            guild_id: row.get(0)?,
                            info_channel_id: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(guild)
        })
    }

    /// Insert a fresh guild row. Fails with a primary key violation if the
    /// guild already exists; callers check `get_guild` first.
    pub fn create_guild(&self, guild_id: &str) -> StoreResult<Guild> {
        debug!("Database: Creating guild {}", guild_id);
        self.with_conn(|conn| {
            conn.execute("INSERT INTO guild (guild_id) VALUES (?1)", [guild_id])?;
            Ok(Guild {
                guild_id: guild_id.to_string(),
                info_channel_id: None,
            })
        })
    }

    pub fn set_info_channel(&self, guild_id: &str, channel_id: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO guild (guild_id, info_channel_id) VALUES (?1, ?2)
                 ON CONFLICT(guild_id) DO UPDATE SET info_channel_id = ?2",
                (guild_id, channel_id),
            )?;
            Ok(())
        })
    }

    pub fn get_info_channel(&self, guild_id: &str) -> StoreResult<Option<String>> {
        Ok(self
            .get_guild(guild_id)?
            .and_then(|guild| guild.info_channel_id))
    }

    /// Delete a guild. Its phrases go with it through `ON DELETE CASCADE`.
    pub fn delete_guild(&self, guild_id: &str) -> StoreResult<bool> {
        debug!("Database: Deleting guild {}", guild_id);
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM guild WHERE guild_id = ?1", [guild_id])?;
            Ok(deleted > 0)
        })
    }
}
