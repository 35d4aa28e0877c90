// src/db/intern.rs

//! Description interning for the small lookup tables
//!
//! STATE_TYPE, OUTPUT_TYPE and PACKAGE_TYPE map free-text descriptions to
//! stable integer ids with find-or-create semantics. Ids grow monotonically
//! and are never reclaimed, even when a description falls out of use.
//! Uniqueness relies on the single-connection usage pattern; two connections
//! interning the same new description concurrently could both insert.

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// A lookup table with `(id, description)` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternTable {
    StateType,
    OutputType,
    PackageType,
}

impl InternTable {
    fn table(&self) -> &'static str {
        match self {
            InternTable::StateType => "STATE_TYPE",
            InternTable::OutputType => "OUTPUT_TYPE",
            InternTable::PackageType => "PACKAGE_TYPE",
        }
    }

    fn id_column(&self) -> &'static str {
        match self {
            InternTable::StateType => "state",
            InternTable::OutputType => "type",
            InternTable::PackageType => "type",
        }
    }
}

/// Look up the id of a description without creating it.
pub fn lookup(conn: &Connection, table: InternTable, description: &str) -> Result<Option<i64>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE description = ?1",
        table.id_column(),
        table.table()
    );
    let id = conn
        .query_row(&sql, [description], |row| row.get(0))
        .optional()?;
    Ok(id)
}

/// Intern a description: return its id, inserting it on first use.
pub fn get_or_create(conn: &Connection, table: InternTable, description: &str) -> Result<i64> {
    if let Some(id) = lookup(conn, table, description)? {
        return Ok(id);
    }
    let sql = format!(
        "INSERT INTO {} ({}, description) VALUES (NULL, ?1)",
        table.table(),
        table.id_column()
    );
    conn.execute(&sql, [description])?;
    Ok(conn.last_insert_rowid())
}

/// Resolve an id back to its description.
pub fn description(conn: &Connection, table: InternTable, id: i64) -> Result<Option<String>> {
    let sql = format!(
        "SELECT description FROM {} WHERE {} = ?1",
        table.table(),
        table.id_column()
    );
    let desc = conn.query_row(&sql, [id], |row| row.get(0)).optional()?;
    Ok(desc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let conn = test_conn();
        let a = get_or_create(&conn, InternTable::StateType, "Install").unwrap();
        let b = get_or_create(&conn, InternTable::StateType, "Install").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_descriptions_get_distinct_ids() {
        let conn = test_conn();
        let a = get_or_create(&conn, InternTable::StateType, "Install").unwrap();
        let b = get_or_create(&conn, InternTable::StateType, "Erase").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tables_are_independent() {
        let conn = test_conn();
        let a = get_or_create(&conn, InternTable::StateType, "stdout").unwrap();
        let b = get_or_create(&conn, InternTable::OutputType, "stdout").unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 1);
        assert_eq!(
            description(&conn, InternTable::OutputType, b).unwrap(),
            Some("stdout".to_string())
        );
    }

    #[test]
    fn test_lookup_does_not_create() {
        let conn = test_conn();
        assert_eq!(lookup(&conn, InternTable::PackageType, "rpm").unwrap(), None);
        assert_eq!(lookup(&conn, InternTable::PackageType, "rpm").unwrap(), None);
    }
}
