//! Local SQLite database layer for the desk.
//!
//! Uses rusqlite with WAL mode. Provides schema migrations and the
//! `local_settings` helpers that back the key-value store.

use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::DeskError;

/// Shared database handle.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Initialize the database at `db_path`.
///
/// Creates the parent directory if needed, opens the connection, sets
/// pragmas, and runs any pending migrations. On corruption or open failure,
/// deletes the file and retries once.
pub fn init(db_path: &Path) -> Result<DbState, DeskError> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| DeskError::Storage(format!("Failed to create data dir: {e}")))?;
    }

    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(db_path).and_then(|c| {
        run_migrations(&c)?;
        Ok(c)
    }) {
        Ok(c) => c,
        Err(first_err) => {
            warn!(
                "Database open failed ({}), deleting and retrying once",
                first_err
            );
            if db_path.exists() {
                let _ = fs::remove_file(db_path);
                // Also remove WAL/SHM files if present
                let _ = fs::remove_file(db_path.with_extension("db-wal"));
                let _ = fs::remove_file(db_path.with_extension("db-shm"));
            }
            let c = open_and_configure(db_path).map_err(|e| {
                DeskError::Storage(format!("Database open failed after retry: {e}"))
            })?;
            run_migrations(&c)?;
            c
        }
    };

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path: db_path.to_path_buf(),
    })
}

/// In-memory database with migrations applied.
#[cfg(test)]
pub(crate) fn open_in_memory() -> Result<DbState, DeskError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(
        "PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    run_migrations(&conn)?;
    Ok(DbState {
        conn: Mutex::new(conn),
        db_path: PathBuf::from(":memory:"),
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection, DeskError> {
    let conn = Connection::open(path)
        .map_err(|e| DeskError::Storage(format!("sqlite open: {e}")))?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| DeskError::Storage(format!("pragma setup: {e}")))?;

    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<(), DeskError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| DeskError::Storage(format!("create schema_version: {e}")))?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Migration v1: key-value settings table.
fn migrate_v1(conn: &Connection) -> Result<(), DeskError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS local_settings (
            id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
            setting_category TEXT NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now')),
            UNIQUE(setting_category, setting_key)
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| {
        error!("Migration v1 failed: {e}");
        DeskError::Storage(format!("migration v1: {e}"))
    })?;

    info!("Applied migration v1 (local_settings)");
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings helpers
// ---------------------------------------------------------------------------

/// Get a single setting value. A missing row is `Ok(None)`; any other
/// read failure is an error.
pub fn get_setting(
    conn: &Connection,
    category: &str,
    key: &str,
) -> Result<Option<String>, DeskError> {
    conn.query_row(
        "SELECT setting_value FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
        params![category, key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| DeskError::Storage(format!("get_setting {key}: {e}")))
}

/// Insert or update a setting.
pub fn set_setting(
    conn: &Connection,
    category: &str,
    key: &str,
    value: &str,
) -> Result<(), DeskError> {
    conn.execute(
        "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(setting_category, setting_key) DO UPDATE SET
            setting_value = excluded.setting_value,
            updated_at = excluded.updated_at",
        params![category, key, value],
    )
    .map_err(|e| DeskError::Storage(format!("set_setting: {e}")))?;
    Ok(())
}

/// Delete a single setting. Missing keys are not an error.
pub fn delete_setting(conn: &Connection, category: &str, key: &str) -> Result<(), DeskError> {
    conn.execute(
        "DELETE FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
        params![category, key],
    )
    .map_err(|e| DeskError::Storage(format!("delete_setting: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("prepare table list");
        stmt.query_map([], |row| row.get(0))
            .expect("query tables")
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_migrations_to_latest() {
        let db = open_in_memory().expect("open");
        let conn = db.conn.lock().unwrap();
        let tables = table_names(&conn);
        assert!(tables.contains(&"local_settings".to_string()));

        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = open_in_memory().expect("open");
        let conn = db.conn.lock().unwrap();
        run_migrations(&conn).expect("second run");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, CURRENT_SCHEMA_VERSION as i64);
    }

    #[test]
    fn test_wal_mode_on_file_db() {
        let dir = tempfile::tempdir().unwrap();
        let db = init(&dir.path().join("desk.db")).expect("init");
        let conn = db.conn.lock().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_corrupt_file_is_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("desk.db");
        fs::write(&path, vec![b'x'; 4096]).unwrap();
        let db = init(&path).expect("init after corruption");
        let conn = db.conn.lock().unwrap();
        assert!(table_names(&conn).contains(&"local_settings".to_string()));
    }

    #[test]
    fn test_settings_crud() {
        let db = open_in_memory().expect("open");
        let conn = db.conn.lock().unwrap();

        set_setting(&conn, "local", "orders.loaded", "true").expect("set");
        assert_eq!(
            get_setting(&conn, "local", "orders.loaded").unwrap(),
            Some("true".to_string())
        );

        set_setting(&conn, "local", "orders.loaded", "false").expect("update");
        assert_eq!(
            get_setting(&conn, "local", "orders.loaded").unwrap(),
            Some("false".to_string())
        );

        delete_setting(&conn, "local", "orders.loaded").expect("delete");
        assert!(get_setting(&conn, "local", "orders.loaded").unwrap().is_none());
        delete_setting(&conn, "local", "orders.loaded").expect("delete missing");
    }

    #[test]
    fn test_unreadable_setting_is_an_error() {
        let db = open_in_memory().expect("open");
        let conn = db.conn.lock().unwrap();
        set_setting(&conn, "local", "orders.overrides", "{}").expect("set");
        conn.execute(
            "UPDATE local_settings SET setting_value = x'00' WHERE setting_key = 'orders.overrides'",
            [],
        )
        .unwrap();

        let err = get_setting(&conn, "local", "orders.overrides").unwrap_err();
        assert_eq!(err.kind(), "storage");
        // Missing rows are still fine.
        assert_eq!(get_setting(&conn, "local", "absent").unwrap(), None);
    }
}
