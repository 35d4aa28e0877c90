// src/db/models/output.rs

//! Captured transaction output, typed stdout/stderr

use crate::db::intern::{self, InternTable};
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, params};

/// Output stream tag; the descriptions are interned in OUTPUT_TYPE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Stdout,
    Stderr,
}

impl OutputKind {
    pub fn as_str(&self) -> &str {
        match self {
            OutputKind::Stdout => "stdout",
            OutputKind::Stderr => "stderr",
        }
    }
}

/// Append one line of captured output to a transaction.
pub fn append(conn: &Connection, tid: i64, msg: &str, kind: OutputKind) -> Result<()> {
    let type_id = intern::get_or_create(conn, InternTable::OutputType, kind.as_str())?;
    conn.execute(
        "INSERT INTO OUTPUT (T_ID, msg, type) VALUES (?1, ?2, ?3)",
        params![tid, msg, type_id],
    )?;
    Ok(())
}

/// Load a transaction's captured output in insertion order.
pub fn load(conn: &Connection, tid: i64, kind: OutputKind) -> Result<Vec<String>> {
    let Some(type_id) = intern::lookup(conn, InternTable::OutputType, kind.as_str())? else {
        return Ok(Vec::new());
    };
    let mut stmt =
        conn.prepare("SELECT msg FROM OUTPUT WHERE T_ID = ?1 AND type = ?2 ORDER BY O_ID")?;
    let lines = stmt
        .query_map(params![tid, type_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(lines)
}

/// Whether any output of the given kind exists for a transaction.
pub fn exists(conn: &Connection, tid: i64, kind: OutputKind) -> Result<bool> {
    let Some(type_id) = intern::lookup(conn, InternTable::OutputType, kind.as_str())? else {
        return Ok(false);
    };
    let found = conn
        .query_row(
            "SELECT O_ID FROM OUTPUT WHERE T_ID = ?1 AND type = ?2 LIMIT 1",
            params![tid, type_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    #[test]
    fn test_append_and_load_in_order() {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();

        append(&conn, 1, "first", OutputKind::Stdout).unwrap();
        append(&conn, 1, "second", OutputKind::Stdout).unwrap();
        append(&conn, 1, "oops", OutputKind::Stderr).unwrap();
        append(&conn, 2, "other", OutputKind::Stdout).unwrap();

        assert_eq!(load(&conn, 1, OutputKind::Stdout).unwrap(), vec!["first", "second"]);
        assert_eq!(load(&conn, 1, OutputKind::Stderr).unwrap(), vec!["oops"]);
        assert!(exists(&conn, 1, OutputKind::Stderr).unwrap());
        assert!(!exists(&conn, 2, OutputKind::Stderr).unwrap());
    }

    #[test]
    fn test_load_before_any_append_is_empty() {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();
        assert!(load(&conn, 1, OutputKind::Stdout).unwrap().is_empty());
        assert!(!exists(&conn, 1, OutputKind::Stdout).unwrap());
    }
}
