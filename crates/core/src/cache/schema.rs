//! Cache table layout.
//!
//! The cache holds nothing that cannot be fetched again, so there is no
//! upgrade path. SQLite's `user_version` records the layout a file was
//! written with; when it differs from [`SCHEMA_VERSION`] the slot table is
//! dropped and recreated, discarding any record in an older format.

use tokio_rusqlite::{Connection, rusqlite};

use crate::Error;

/// Bump whenever the table layout or the stored record format changes.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = include_str!("../../schema/local_cache.sql");

/// Make sure the slot table exists in the current layout.
pub async fn ensure(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let stored: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if stored == SCHEMA_VERSION {
            conn.execute_batch(SCHEMA)?;
            return Ok(());
        }

        recreate(conn).map_err(|e| Error::MigrationFailed(format!("version {stored} -> {SCHEMA_VERSION}: {e}")))?;
        if stored == 0 {
            tracing::debug!(version = SCHEMA_VERSION, "created cache schema");
        } else {
            tracing::info!(from = stored, to = SCHEMA_VERSION, "cache layout changed, discarded cached catalog");
        }
        Ok(())
    })
    .await
    .map_err(Error::from)
}

fn recreate(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch("DROP TABLE IF EXISTS local_cache;")?;
    tx.execute_batch(SCHEMA)?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()
}
