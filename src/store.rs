use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as JsonValue;

#[derive(Clone)]
pub struct SqliteStore {
    path: String,
}

impl SqliteStore {
    pub fn new(path: &str) -> Result<Self> {
        if path.trim().is_empty() {
            anyhow::bail!("SQLITE_PATH is empty");
        }
        if path != ":memory:" && !path.starts_with("file:") {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create sqlite parent dir for {path}"))?;
            }
        }

        // rusqlite::Connection is not Send/Sync, so keep only the path and
        // open a short-lived connection per operation.
        Ok(Self { path: path.to_string() })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn open_conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).with_context(|| format!("open sqlite {}", self.path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Ok(conn)
    }

    pub fn init_db(&self) -> Result<()> {
        let conn = self.open_conn()?;
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_ts REAL
);

CREATE TABLE IF NOT EXISTS runtime_status (
  component TEXT PRIMARY KEY,
  ts REAL,
  level TEXT,
  message TEXT,
  detail TEXT
);
"#,
        )?;
        Ok(())
    }

    pub fn put_kv(&self, key: &str, value: &str, ts: f64) -> Result<()> {
        let conn = self.open_conn()?;
        conn.execute(
            r#"
INSERT INTO kv(key, value, updated_ts) VALUES(?,?,?)
ON CONFLICT(key) DO UPDATE SET
  value=excluded.value,
  updated_ts=excluded.updated_ts
"#,
            params![key, value, ts],
        )?;
        Ok(())
    }

    pub fn get_kv(&self, key: &str) -> Result<Option<String>> {
        let conn = self.open_conn()?;
        let v = conn
            .query_row("SELECT value FROM kv WHERE key=?", params![key], |r| r.get::<_, String>(0))
            .optional()?;
        Ok(v)
    }

    pub fn upsert_runtime_status(
        &self,
        component: &str,
        level: &str,
        message: &str,
        detail: Option<&str>,
        ts: f64,
    ) -> Result<()> {
        let conn = self.open_conn()?;
        conn.execute(
            r#"
INSERT INTO runtime_status(component, ts, level, message, detail)
VALUES(?,?,?,?,?)
ON CONFLICT(component) DO UPDATE SET
  ts=excluded.ts,
  level=excluded.level,
  message=excluded.message,
  detail=excluded.detail
"#,
            params![component, ts, level, message, detail],
        )?;
        Ok(())
    }

    pub fn fetch_runtime_statuses(&self) -> Result<JsonValue> {
        let conn = self.open_conn()?;
        let mut stmt = conn.prepare(
            "SELECT component, ts, level, message, detail FROM runtime_status ORDER BY component",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, Option<f64>>(1)?,
                r.get::<_, Option<String>>(2)?,
                r.get::<_, Option<String>>(3)?,
                r.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut out = serde_json::Map::new();
        for row in rows {
            let (component, ts, level, message, detail) = row?;
            out.insert(
                component,
                serde_json::json!({
                    "ts": ts,
                    "level": level,
                    "message": message,
                    "detail": detail,
                }),
            );
        }
        Ok(JsonValue::Object(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.sqlite");
        let store = SqliteStore::new(path.to_str().unwrap()).unwrap();
        store.init_db().unwrap();
        (dir, store)
    }

    #[test]
    fn rejects_empty_path() {
        assert!(SqliteStore::new("  ").is_err());
    }

    #[test]
    fn kv_overwrites() {
        let (_dir, store) = temp_store();
        assert_eq!(store.get_kv("betData").unwrap(), None);
        store.put_kv("betData", "one", 1.0).unwrap();
        store.put_kv("betData", "two", 2.0).unwrap();
        assert_eq!(store.get_kv("betData").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn runtime_status_is_keyed_by_component() {
        let (_dir, store) = temp_store();
        store
            .upsert_runtime_status("status", "error", "fetch_failed", Some("timeout"), 1.0)
            .unwrap();
        store
            .upsert_runtime_status("status", "ok", "events=3", None, 2.0)
            .unwrap();
        let all = store.fetch_runtime_statuses().unwrap();
        assert_eq!(all["status"]["level"], "ok");
        assert!(all["status"]["detail"].is_null());
    }
}
