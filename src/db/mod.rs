use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

mod guild;
mod phrase;
pub mod schema;

pub use phrase::{hash_key, normalize_key};

/// One chat community the bot serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub guild_id: String,
    pub info_channel_id: Option<String>,
}

/// A file sent along with an autoreply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub data: Vec<u8>,
    pub filename: String,
}

/// A stored trigger -> reply mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub hash_key: String,
    /// Trigger as the admin typed it; lookups use its lower-cased form.
    pub key: String,
    pub guild_id: String,
    pub value: String,
    pub attachment: Option<Attachment>,
    /// Allow-list of author ids. `None` means the reply is public.
    pub specific_users_id: Option<BTreeSet<String>>,
}

impl Phrase {
    pub fn normalized_key(&self) -> String {
        normalize_key(&self.key)
    }

    /// Whether `author_id` may trigger this reply.
    pub fn permits(&self, author_id: &str) -> bool {
        match &self.specific_users_id {
            Some(users) => users.contains(author_id),
            None => true,
        }
    }
}

/// Input for inserting a phrase.
#[derive(Debug, Clone)]
pub struct NewPhrase {
    pub guild_id: String,
    pub key: String,
    pub value: String,
    pub attachment: Option<Attachment>,
    pub allowed_users: BTreeSet<String>,
}

impl NewPhrase {
    pub fn new(guild_id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            key: key.into(),
            value: value.into(),
            attachment: None,
            allowed_users: BTreeSet::new(),
        }
    }

    pub fn with_attachment(mut self, data: Vec<u8>, filename: impl Into<String>) -> Self {
        self.attachment = Some(Attachment {
            data,
            filename: filename.into(),
        });
        self
    }

    pub fn with_allowed_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_users = users.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> StoreResult<Self> {
        if let Some(parent) = Path::new(&config.database_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&config.database_url)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "PRAGMA busy_timeout=5000;
             PRAGMA foreign_keys=ON;",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn execute_init(&self) -> StoreResult<()> {
        info!("Database: Initializing schema...");
        self.with_conn(|conn| {
            conn.execute_batch(schema::SCHEMA)?;
            Ok(())
        })?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Access the underlying connection with a closure.
    pub(crate) fn with_conn<F, R>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Connection) -> StoreResult<R>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut conn)
    }

    /// Run a synchronous query on the blocking pool so gateway tasks never
    /// stall on SQLite.
    pub async fn run_blocking<F, R>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&Database) -> StoreResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }
}
