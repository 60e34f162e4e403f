/// Guild rows and their autoreply phrases.
///
/// `phrase.hash_key` is the hex SHA-256 of the normalized trigger, so
/// `(guild_id, hash_key)` being the primary key keeps one reply per trigger
/// per guild without indexing the trigger text itself.
pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS guild (
        guild_id TEXT PRIMARY KEY,
        info_channel_id TEXT
    );

    CREATE TABLE IF NOT EXISTS phrase (
        guild_id TEXT NOT NULL REFERENCES guild (guild_id) ON DELETE CASCADE,
        hash_key TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        attachment_data BLOB,
        attachment_filename TEXT,
        specific_users_id TEXT,
        PRIMARY KEY (guild_id, hash_key),
        CHECK ((attachment_data IS NULL) = (attachment_filename IS NULL))
    );
";
