// src/db/mod.rs

//! Storage layer: connection handling, schema, interning and row models

pub mod intern;
pub mod models;
pub mod schema;

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

/// Open the database file and configure it for the single-writer usage
/// pattern: the whole file stays locked for the connection's lifetime and
/// the journal is truncated rather than deleted between transactions.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "locking_mode", "EXCLUSIVE")?;
    conn.pragma_update(None, "journal_mode", "TRUNCATE")?;
    schema::migrate(&conn)?;
    debug!("opened history database at {}", path.display());
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_creates_schema() {
        let file = NamedTempFile::new().unwrap();
        let conn = open(file.path()).unwrap();
        assert_eq!(
            schema::get_schema_version(&conn).unwrap(),
            schema::SCHEMA_VERSION
        );
    }

    #[test]
    fn test_open_twice_is_idempotent() {
        let file = NamedTempFile::new().unwrap();
        {
            let _conn = open(file.path()).unwrap();
        }
        let conn = open(file.path()).unwrap();
        assert_eq!(
            schema::get_schema_version(&conn).unwrap(),
            schema::SCHEMA_VERSION
        );
    }
}
