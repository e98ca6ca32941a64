use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

const KEY_DISPLAY_NAME: &str = "display_name";
const KEY_COMPOSE_FLAG: &str = "compose_on_open";

/// The viewer identity for this session. Always carries the leading `@`
/// used everywhere in the UI; constructed once at startup and passed into
/// the feed and renderer rather than looked up ambiently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    display: String,
}

impl Identity {
    pub fn from_stored(stored: Option<&str>, fallback: &str) -> Self {
        let name = stored
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(fallback)
            .trim();
        let display = if name.starts_with('@') {
            name.to_string()
        } else {
            format!("@{name}")
        };
        Self { display }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn owns(&self, author: &str) -> bool {
        author.trim() == self.display
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("session: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("session: create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("session: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", &"WAL")
            .context("session: set WAL")?;
        conn.pragma_update(None, "busy_timeout", &5000)
            .context("session: set busy timeout")?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| anyhow!("session: connection still in use"))?
            .into_inner();
        conn.close()
            .map_err(|(_, err)| err)
            .context("session: close connection")
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        if key.is_empty() {
            bail!("session: key required");
        }
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM session_values WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .context("session: query value")
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            bail!("session: key required");
        }
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO session_values (key, value, updated_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET
  value = excluded.value,
  updated_at = excluded.updated_at
"#,
            params![key, value, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Read and clear in one step. One-shot flags stay one-shot even if
    /// the caller forgets to delete afterwards.
    pub fn take(&self, key: &str) -> Result<Option<String>> {
        if key.is_empty() {
            bail!("session: key required");
        }
        let conn = self.conn.lock();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM session_values WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("session: query value")?;
        if value.is_some() {
            conn.execute("DELETE FROM session_values WHERE key = ?1", params![key])?;
        }
        Ok(value)
    }

    /// Drop values older than the session TTL. This is what keeps the
    /// store session-scoped rather than a durable settings file.
    pub fn purge_stale(&self, ttl: Duration) -> Result<usize> {
        let cutoff = Utc::now().timestamp() - ttl.as_secs() as i64;
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM session_values WHERE updated_at < ?1",
            params![cutoff],
        )?;
        Ok(removed)
    }

    pub fn display_name(&self) -> Result<Option<String>> {
        self.get(KEY_DISPLAY_NAME)
    }

    pub fn set_display_name(&self, name: &str) -> Result<()> {
        self.set(KEY_DISPLAY_NAME, name)
    }

    pub fn set_compose_flag(&self) -> Result<()> {
        self.set(KEY_COMPOSE_FLAG, "true")
    }

    pub fn take_compose_flag(&self) -> Result<bool> {
        Ok(self.take(KEY_COMPOSE_FLAG)?.as_deref() == Some("true"))
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at INTEGER NOT NULL
)
"#,
        [],
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let migrations = migrations();
    for (idx, sql) in migrations.iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, Utc::now().timestamp()],
        )?;
    }
    Ok(())
}

fn migrations() -> Vec<&'static str> {
    vec![
        r#"
CREATE TABLE IF NOT EXISTS session_values (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_session_values_updated_at ON session_values(updated_at);
"#,
    ]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("fitfeed").join("session.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &tempfile::TempDir) -> Store {
        Store::open(Options {
            path: Some(dir.path().join("session.db")),
        })
        .unwrap()
    }

    #[test]
    fn open_creates_database() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        assert!(dir.path().join("session.db").exists());
        store.close().unwrap();
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.set_display_name("CoachCarter").unwrap();
        assert_eq!(store.display_name().unwrap().as_deref(), Some("CoachCarter"));
    }

    #[test]
    fn compose_flag_is_one_shot() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.set_compose_flag().unwrap();
        assert!(store.take_compose_flag().unwrap());
        assert!(!store.take_compose_flag().unwrap());
    }

    #[test]
    fn purge_drops_stale_values_and_keeps_fresh_ones() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.db");
        let store = Store::open(Options {
            path: Some(path.clone()),
        })
        .unwrap();
        store.set("left_over", "1").unwrap();
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute(
                "UPDATE session_values SET updated_at = updated_at - 3600 WHERE key = 'left_over'",
                [],
            )
            .unwrap();
        }
        store.set("fresh", "1").unwrap();
        let removed = store.purge_stale(Duration::from_secs(60)).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.get("left_over").unwrap(), None);
        assert_eq!(store.get("fresh").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn identity_falls_back_when_absent_or_blank() {
        let identity = Identity::from_stored(None, "AdminUser");
        assert_eq!(identity.display(), "@AdminUser");
        let identity = Identity::from_stored(Some("   "), "AdminUser");
        assert_eq!(identity.display(), "@AdminUser");
    }

    #[test]
    fn identity_keeps_existing_at_prefix() {
        let identity = Identity::from_stored(Some("@coach"), "AdminUser");
        assert_eq!(identity.display(), "@coach");
        assert!(identity.owns("@coach"));
        assert!(!identity.owns("@someone_else"));
    }
}
