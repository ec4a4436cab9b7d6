// ABOUTME: Durable storage of the authenticated user's {id, token} pair.
// ABOUTME: SQLite-backed settings row in production, in-memory store for tests.
use anyhow::{Context, Result};
use quickchat_gateway::AuthResponse;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Settings key holding the serialized credentials
pub const CREDENTIALS_KEY: &str = "quickchat-user";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "id")]
    pub user_id: String,
    pub token: String,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

// Custom Debug impl to redact the token
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl From<AuthResponse> for Credentials {
    fn from(response: AuthResponse) -> Self {
        Self {
            user_id: response.user_id,
            token: response.stream_token,
        }
    }
}

/// Sole persistent holder of credentials. Every writer (auth success, logout,
/// failed connect) goes through `save`/`clear`.
pub trait CredentialStore: Send + Sync {
    /// Stored credentials, or None when absent, unreadable, or corrupt
    fn load(&self) -> Option<Credentials>;

    fn save(&self, credentials: &Credentials) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

fn decode(raw: &str) -> Option<Credentials> {
    match serde_json::from_str(raw) {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            tracing::warn!(error = %e, "Stored credentials are corrupt, ignoring");
            None
        }
    }
}

/// Credentials persisted as one row of a `settings` key/value table
#[derive(Clone)]
pub struct SqliteCredentialStore {
    db: Arc<Mutex<Connection>>,
    key: String,
}

impl SqliteCredentialStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open SQLite database {}", db_path.display()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        tracing::debug!(path = %db_path.display(), "Credential store opened");

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            key: CREDENTIALS_KEY.to_string(),
        })
    }

    fn read_raw(&self) -> Result<Option<String>> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        let mut stmt = db.prepare("SELECT value FROM settings WHERE key = ?1")?;
        let value = stmt.query_row(params![self.key], |row| row.get::<_, String>(0));

        match value {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a raw value under the credentials key (bypasses serialization)
    pub fn write_raw(&self, value: &str) -> Result<()> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        db.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![self.key, value],
        )?;
        Ok(())
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn load(&self) -> Option<Credentials> {
        match self.read_raw() {
            Ok(raw) => raw.as_deref().and_then(decode),
            Err(e) => {
                tracing::warn!(error = %e, "Credential store unavailable, treating as empty");
                None
            }
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        let json = serde_json::to_string(credentials)?;
        self.write_raw(&json)
            .context("Failed to persist credentials")?;
        tracing::info!(user_id = %credentials.user_id, "Credentials saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let db = self
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))?;
        db.execute("DELETE FROM settings WHERE key = ?1", params![self.key])
            .context("Failed to clear credentials")?;
        tracing::info!("Credentials cleared");
        Ok(())
    }
}

/// Process-local store; holds the serialized form so it behaves like the durable one
#[derive(Default)]
pub struct MemoryCredentialStore {
    raw: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: &Credentials) -> Self {
        let store = Self::new();
        if let Ok(mut raw) = store.raw.lock() {
            *raw = serde_json::to_string(credentials).ok();
        }
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<Credentials> {
        let raw = self.raw.lock().ok()?.clone()?;
        decode(&raw)
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        let json = serde_json::to_string(credentials)?;
        *self
            .raw
            .lock()
            .map_err(|e| anyhow::anyhow!("Credential mutex poisoned: {}", e))? = Some(json);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .raw
            .lock()
            .map_err(|e| anyhow::anyhow!("Credential mutex poisoned: {}", e))? = None;
        Ok(())
    }
}
