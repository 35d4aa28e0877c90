// src/db/models/repo.rs

//! Repository names, interned on first reference

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row};

#[derive(Debug, Clone)]
pub struct Repo {
    pub id: Option<i64>,
    pub name: String,
}

impl Repo {
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare("SELECT R_ID, name FROM REPO WHERE name = ?1")?;
        let repo = stmt.query_row([name], Self::from_row).optional()?;
        Ok(repo)
    }

    /// Find-or-insert by name, returning the rid either way.
    pub fn bind_by_name(conn: &Connection, name: &str) -> Result<i64> {
        if let Some(repo) = Self::find_by_name(conn, name)? {
            return Ok(repo.id.unwrap_or_default());
        }
        conn.execute("INSERT INTO REPO (name) VALUES (?1)", [name])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn name_by_id(conn: &Connection, rid: i64) -> Result<Option<String>> {
        let name = conn
            .query_row("SELECT name FROM REPO WHERE R_ID = ?1", [rid], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(name)
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    #[test]
    fn test_bind_by_name_interns() {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();

        let a = Repo::bind_by_name(&conn, "fedora").unwrap();
        let b = Repo::bind_by_name(&conn, "fedora").unwrap();
        let c = Repo::bind_by_name(&conn, "updates").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(Repo::name_by_id(&conn, c).unwrap().as_deref(), Some("updates"));
    }
}
