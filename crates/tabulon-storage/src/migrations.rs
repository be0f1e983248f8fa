//! Idempotent schema migrations (spec.md §4.K): every migration is a plain
//! `CREATE TABLE IF NOT EXISTS`, so re-applying the full list on every open
//! is always safe. `schema_migrations` just records which ids have run, for
//! operator visibility, not as a gate.

use rusqlite::Connection;

use tabulon_error::TabulonError;

struct Migration {
    id: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        sql: "CREATE TABLE IF NOT EXISTS schema_migrations (
            id INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    },
    Migration {
        id: 2,
        sql: "CREATE TABLE IF NOT EXISTS schemas (
            schema_id TEXT PRIMARY KEY,
            json TEXT NOT NULL
        )",
    },
    Migration {
        id: 3,
        sql: "CREATE TABLE IF NOT EXISTS blocks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            json TEXT NOT NULL
        )",
    },
    Migration {
        id: 4,
        sql: "CREATE TABLE IF NOT EXISTS column_profiles (
            block_id INTEGER NOT NULL,
            column_index INTEGER NOT NULL,
            json TEXT NOT NULL,
            PRIMARY KEY (block_id, column_index)
        )",
    },
    Migration {
        id: 5,
        sql: "CREATE TABLE IF NOT EXISTS header_clusters (
            cluster_id TEXT PRIMARY KEY,
            artifact_version INTEGER NOT NULL,
            json TEXT NOT NULL
        )",
    },
    Migration {
        id: 6,
        sql: "CREATE TABLE IF NOT EXISTS synonyms (
            raw_name TEXT NOT NULL,
            canonical_name TEXT NOT NULL,
            PRIMARY KEY (raw_name, canonical_name)
        )",
    },
    Migration {
        id: 7,
        sql: "CREATE TABLE IF NOT EXISTS stats (
            job_id TEXT NOT NULL,
            schema_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value REAL NOT NULL,
            PRIMARY KEY (job_id, schema_id, key)
        )",
    },
    Migration {
        id: 8,
        sql: "CREATE TABLE IF NOT EXISTS artifact_metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
    },
    Migration {
        id: 9,
        sql: "CREATE TABLE IF NOT EXISTS job_status (
            job_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            detail TEXT,
            last_error TEXT,
            metadata_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    },
    Migration {
        id: 10,
        sql: "CREATE TABLE IF NOT EXISTS job_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL,
            state TEXT NOT NULL,
            detail TEXT,
            at TEXT NOT NULL
        )",
    },
    Migration {
        id: 11,
        sql: "CREATE TABLE IF NOT EXISTS job_metrics (
            job_id TEXT NOT NULL,
            schema_id TEXT NOT NULL,
            json TEXT NOT NULL,
            PRIMARY KEY (job_id, schema_id)
        )",
    },
    Migration {
        id: 12,
        sql: "CREATE TABLE IF NOT EXISTS job_progress_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL,
            schema_id TEXT NOT NULL,
            json TEXT NOT NULL,
            emitted_at TEXT NOT NULL
        )",
    },
    Migration {
        id: 13,
        sql: "CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT,
            event TEXT NOT NULL,
            at TEXT NOT NULL
        )",
    },
    Migration {
        id: 14,
        sql: "CREATE INDEX IF NOT EXISTS idx_job_progress_schema
              ON job_progress_events (schema_id, id)",
    },
];

pub fn apply_all(conn: &Connection) -> Result<(), TabulonError> {
    for migration in MIGRATIONS {
        conn.execute(migration.sql, []).map_err(|e| {
            TabulonError::Storage(format!("migration {} failed: {e}", migration.id))
        })?;
        if migration.id != 1 {
            conn.execute(
                "INSERT OR IGNORE INTO schema_migrations (id, applied_at) VALUES (?1, ?2)",
                rusqlite::params![migration.id, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(|e| TabulonError::Storage(format!("migration record failed: {e}")))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applying_migrations_twice_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        apply_all(&conn).unwrap();
        apply_all(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, (MIGRATIONS.len() - 1) as i64);
    }
}
