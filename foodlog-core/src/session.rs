// External session state: an opaque bag per (chat, user), plus per-key locking
// The dialogue engine keeps nothing in memory between events

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use color_eyre::{
    eyre::{eyre, Context},
    Result,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};
use tracing::warn;

use crate::types::{DialogueState, SessionKey};

pub const DRAFT_KEY: &str = "draft";
pub const CONDITION_KEY: &str = "condition";

/// Serialized conversation state: where we are plus loose JSON values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionBag {
    #[serde(default)]
    pub state: DialogueState,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl SessionBag {
    /// Typed read of one value; a missing key is `None`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .with_context(|| format!("Malformed session value under '{}'", key)),
        }
    }

    pub fn put<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize session value '{}'", key))?;
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    pub fn is_idle(&self) -> bool {
        self.state == DialogueState::Idle
    }
}

/// Key-value persistence for session bags
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current bag for `key` (an empty, idle bag when nothing is stored)
    async fn get(&self, key: SessionKey) -> Result<SessionBag>;

    async fn set(&self, key: SessionKey, bag: &SessionBag) -> Result<()>;

    async fn clear(&self, key: SessionKey) -> Result<()>;
}

/// Process-local store, lost on restart
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    bags: RwLock<HashMap<SessionKey, SessionBag>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: SessionKey) -> Result<SessionBag> {
        Ok(self.bags.read().await.get(&key).cloned().unwrap_or_default())
    }

    async fn set(&self, key: SessionKey, bag: &SessionBag) -> Result<()> {
        self.bags.write().await.insert(key, bag.clone());
        Ok(())
    }

    async fn clear(&self, key: SessionKey) -> Result<()> {
        self.bags.write().await.remove(&key);
        Ok(())
    }
}

/// SQLite-backed store; survives restarts and can be shared between workers
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open session database {}", path.display()))?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                chat_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                bag TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (chat_id, user_id)
            )",
        )
        .context("Failed to create sessions table")?;
        Ok(SqliteSessionStore {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| eyre!("Session database lock poisoned"))?;
        f(&conn)
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, key: SessionKey) -> Result<SessionBag> {
        let raw: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT bag FROM sessions WHERE chat_id = ?1 AND user_id = ?2",
                params![key.chat_id, key.user_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to load session")
        })?;

        let Some(json) = raw else {
            return Ok(SessionBag::default());
        };
        match serde_json::from_str(&json) {
            Ok(bag) => Ok(bag),
            Err(e) => {
                // An unreadable row must not lock the user out; start over
                warn!(session = %key, error = %e, "discarding undecodable session bag");
                Ok(SessionBag::default())
            }
        }
    }

    async fn set(&self, key: SessionKey, bag: &SessionBag) -> Result<()> {
        let json = serde_json::to_string(bag)?;
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (chat_id, user_id, bag, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (chat_id, user_id)
                 DO UPDATE SET bag = excluded.bag, updated_at = excluded.updated_at",
                params![key.chat_id, key.user_id, json, updated_at],
            )
            .context("Failed to save session")?;
            Ok(())
        })
    }

    async fn clear(&self, key: SessionKey) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM sessions WHERE chat_id = ?1 AND user_id = ?2",
                params![key.chat_id, key.user_id],
            )
            .context("Failed to clear session")?;
            Ok(())
        })
    }
}

/// One async mutex per session key.
///
/// Holding the guard makes read-mutate-write on a session a critical
/// section even when the transport redelivers an event concurrently.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: AsyncMutex<HashMap<SessionKey, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: SessionKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop entries nobody is waiting on so the map stays small
            locks.retain(|k, l| *k == key || Arc::strong_count(l) > 1);
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConditionDraft;
    use tempfile::TempDir;

    fn sample_bag() -> SessionBag {
        let mut bag = SessionBag {
            state: DialogueState::AskConditionDiarrhea,
            ..Default::default()
        };
        bag.put(
            CONDITION_KEY,
            &ConditionDraft {
                bloating: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        bag
    }

    #[test]
    fn test_bag_typed_access() -> Result<()> {
        let bag = sample_bag();
        let condition: Option<ConditionDraft> = bag.get(CONDITION_KEY)?;
        assert_eq!(condition.unwrap().bloating, Some(true));
        assert!(bag.get::<ConditionDraft>(DRAFT_KEY)?.is_none());
        Ok(())
    }

    #[test]
    fn test_bag_rejects_malformed_value() {
        let mut bag = SessionBag::default();
        bag.data.insert(DRAFT_KEY.to_string(), Value::String("garbage".into()));
        assert!(bag.get::<ConditionDraft>(DRAFT_KEY).is_err());
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() -> Result<()> {
        let store = MemorySessionStore::new();
        let key = SessionKey::new(1, 2);

        assert!(store.get(key).await?.is_idle());
        store.set(key, &sample_bag()).await?;
        assert_eq!(store.get(key).await?, sample_bag());
        assert!(store.get(SessionKey::new(1, 3)).await?.is_idle());

        store.clear(key).await?;
        assert_eq!(store.get(key).await?, SessionBag::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_store_survives_reopen() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("state/sessions.db");
        let key = SessionKey::new(10, 20);

        {
            let store = SqliteSessionStore::open(&db_path)?;
            store.set(key, &SessionBag::default()).await?;
            store.set(key, &sample_bag()).await?;
        }

        let store = SqliteSessionStore::open(&db_path)?;
        assert_eq!(store.get(key).await?, sample_bag());

        store.clear(key).await?;
        assert!(store.get(key).await?.is_idle());
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_store_drops_undecodable_bag() -> Result<()> {
        let store = SqliteSessionStore::in_memory()?;
        let key = SessionKey::new(3, 4);
        store.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (chat_id, user_id, bag, updated_at)
                 VALUES (?1, ?2, '{not json', '')",
                params![key.chat_id, key.user_id],
            )?;
            Ok(())
        })?;

        assert_eq!(store.get(key).await?, SessionBag::default());

        store.set(key, &sample_bag()).await?;
        assert_eq!(store.get(key).await?, sample_bag());
        Ok(())
    }

    #[tokio::test]
    async fn test_session_locks_serialize_same_key() {
        let locks = Arc::new(SessionLocks::new());
        let key = SessionKey::new(1, 1);

        let guard = locks.acquire(key).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(key).await;
            })
        };

        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        // Other keys are not blocked
        drop(locks.acquire(SessionKey::new(2, 2)).await);

        drop(guard);
        contender.await.unwrap();
    }
}
