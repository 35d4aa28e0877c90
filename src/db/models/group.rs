// src/db/models/group.rs

//! Comps groups and environments
//!
//! Groups and environments are keyed by a stable `name_id` slug. Storing an
//! already-known slug updates the mutable fields in place and keeps the
//! numeric id; membership lists grow additively and are only cleared by an
//! explicit full-list replacement.

use crate::db::models::trans_data::Reason;
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone)]
pub struct Group {
    pub id: Option<i64>,
    pub name_id: String,
    pub name: String,
    pub ui_name: String,
    pub is_installed: bool,
    pub pkg_types: i64,
}

impl Group {
    pub fn new(name_id: &str, name: &str, ui_name: &str, is_installed: bool, pkg_types: i64) -> Self {
        Self {
            id: None,
            name_id: name_id.to_string(),
            name: name.to_string(),
            ui_name: ui_name.to_string(),
            is_installed,
            pkg_types,
        }
    }

    /// Find-or-update by `name_id`; the numeric id survives updates.
    pub fn store(&mut self, conn: &Connection) -> Result<i64> {
        if let Some(existing) = Self::find_by_name_id(conn, &self.name_id)? {
            let gid = existing.id.unwrap_or_default();
            conn.execute(
                "UPDATE GROUPS SET name = ?1, ui_name = ?2, is_installed = ?3, pkg_types = ?4
                 WHERE G_ID = ?5",
                params![
                    &self.name,
                    &self.ui_name,
                    self.is_installed as i64,
                    self.pkg_types,
                    gid
                ],
            )?;
            self.id = Some(gid);
            return Ok(gid);
        }
        conn.execute(
            "INSERT INTO GROUPS (name_id, name, ui_name, is_installed, pkg_types)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &self.name_id,
                &self.name,
                &self.ui_name,
                self.is_installed as i64,
                self.pkg_types
            ],
        )?;
        let gid = conn.last_insert_rowid();
        self.id = Some(gid);
        Ok(gid)
    }

    pub fn find_by_name_id(conn: &Connection, name_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT G_ID, name_id, name, ui_name, is_installed, pkg_types
             FROM GROUPS WHERE name_id = ?1",
        )?;
        let group = stmt.query_row([name_id], Self::from_row).optional()?;
        Ok(group)
    }

    pub fn find_by_pattern(conn: &Connection, pattern: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT G_ID, name_id, name, ui_name, is_installed, pkg_types
             FROM GROUPS WHERE name_id LIKE ?1 OR name LIKE ?1 OR ui_name LIKE ?1",
        )?;
        let groups = stmt
            .query_map([pattern], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    /// Mark the group installed.
    pub fn commit(conn: &Connection, name_id: &str) -> Result<()> {
        conn.execute(
            "UPDATE GROUPS SET is_installed = 1 WHERE name_id = ?1",
            [name_id],
        )?;
        Ok(())
    }

    /// Add member packages by name, skipping names already present.
    pub fn add_packages(&self, conn: &Connection, names: &[String]) -> Result<()> {
        let current = self.packages(conn)?;
        for name in names {
            if !current.contains(name) {
                conn.execute(
                    "INSERT INTO GROUPS_PACKAGE (G_ID, name) VALUES (?1, ?2)",
                    params![self.id, name],
                )?;
            }
        }
        Ok(())
    }

    /// Replace the member list atomically: delete all, reinsert.
    pub fn set_packages(&self, conn: &Connection, names: &[String]) -> Result<()> {
        conn.execute("DELETE FROM GROUPS_PACKAGE WHERE G_ID = ?1", [self.id])?;
        for name in names {
            conn.execute(
                "INSERT INTO GROUPS_PACKAGE (G_ID, name) VALUES (?1, ?2)",
                params![self.id, name],
            )?;
        }
        Ok(())
    }

    pub fn add_excludes(&self, conn: &Connection, names: &[String]) -> Result<()> {
        let current = self.excludes(conn)?;
        for name in names {
            if !current.contains(name) {
                conn.execute(
                    "INSERT INTO GROUPS_EXCLUDE (G_ID, name) VALUES (?1, ?2)",
                    params![self.id, name],
                )?;
            }
        }
        Ok(())
    }

    pub fn packages(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut stmt =
            conn.prepare("SELECT name FROM GROUPS_PACKAGE WHERE G_ID = ?1 ORDER BY GP_ID")?;
        let names = stmt
            .query_map([self.id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn excludes(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut stmt =
            conn.prepare("SELECT name FROM GROUPS_EXCLUDE WHERE G_ID = ?1 ORDER BY GE_ID")?;
        let names = stmt
            .query_map([self.id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name_id: row.get(1)?,
            name: row.get(2)?,
            ui_name: row.get(3)?,
            is_installed: row.get::<_, i64>(4)? != 0,
            pkg_types: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Environment {
    pub id: Option<i64>,
    pub name_id: String,
    pub name: String,
    pub ui_name: String,
    pub pkg_types: i64,
    pub grp_types: i64,
}

impl Environment {
    pub fn new(name_id: &str, name: &str, ui_name: &str, pkg_types: i64, grp_types: i64) -> Self {
        Self {
            id: None,
            name_id: name_id.to_string(),
            name: name.to_string(),
            ui_name: ui_name.to_string(),
            pkg_types,
            grp_types,
        }
    }

    pub fn store(&mut self, conn: &Connection) -> Result<i64> {
        if let Some(existing) = Self::find_by_name_id(conn, &self.name_id)? {
            let eid = existing.id.unwrap_or_default();
            conn.execute(
                "UPDATE ENVIRONMENTS SET name = ?1, ui_name = ?2, pkg_types = ?3, grp_types = ?4
                 WHERE E_ID = ?5",
                params![&self.name, &self.ui_name, self.pkg_types, self.grp_types, eid],
            )?;
            self.id = Some(eid);
            return Ok(eid);
        }
        conn.execute(
            "INSERT INTO ENVIRONMENTS (name_id, name, ui_name, pkg_types, grp_types)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &self.name_id,
                &self.name,
                &self.ui_name,
                self.pkg_types,
                self.grp_types
            ],
        )?;
        let eid = conn.last_insert_rowid();
        self.id = Some(eid);
        Ok(eid)
    }

    pub fn find_by_name_id(conn: &Connection, name_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT E_ID, name_id, name, ui_name, pkg_types, grp_types
             FROM ENVIRONMENTS WHERE name_id = ?1",
        )?;
        let env = stmt.query_row([name_id], Self::from_row).optional()?;
        Ok(env)
    }

    pub fn find_by_pattern(conn: &Connection, pattern: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT E_ID, name_id, name, ui_name, pkg_types, grp_types
             FROM ENVIRONMENTS WHERE name_id LIKE ?1 OR name LIKE ?1 OR ui_name LIKE ?1",
        )?;
        let envs = stmt
            .query_map([pattern], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(envs)
    }

    /// Add member groups, skipping ones already present.
    pub fn add_groups(&self, conn: &Connection, gids: &[i64]) -> Result<()> {
        let current = self.group_ids(conn)?;
        for gid in gids {
            if !current.contains(gid) {
                conn.execute(
                    "INSERT INTO ENVIRONMENTS_GROUPS (E_ID, G_ID) VALUES (?1, ?2)",
                    params![self.id, gid],
                )?;
            }
        }
        Ok(())
    }

    pub fn add_excludes(&self, conn: &Connection, names: &[String]) -> Result<()> {
        let current = self.excludes(conn)?;
        for name in names {
            if !current.contains(name) {
                conn.execute(
                    "INSERT INTO ENVIRONMENTS_EXCLUDE (E_ID, name) VALUES (?1, ?2)",
                    params![self.id, name],
                )?;
            }
        }
        Ok(())
    }

    pub fn group_ids(&self, conn: &Connection) -> Result<Vec<i64>> {
        let mut stmt =
            conn.prepare("SELECT G_ID FROM ENVIRONMENTS_GROUPS WHERE E_ID = ?1 ORDER BY EG_ID")?;
        let gids = stmt
            .query_map([self.id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(gids)
    }

    pub fn group_name_ids(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT name_id FROM ENVIRONMENTS_GROUPS
             JOIN GROUPS USING (G_ID)
             WHERE E_ID = ?1 ORDER BY EG_ID",
        )?;
        let names = stmt
            .query_map([self.id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn excludes(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut stmt =
            conn.prepare("SELECT name FROM ENVIRONMENTS_EXCLUDE WHERE E_ID = ?1 ORDER BY EE_ID")?;
        let names = stmt
            .query_map([self.id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// An environment counts as installed once any of its member groups is.
    pub fn is_installed(&self, conn: &Connection) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT E_ID FROM ENVIRONMENTS_GROUPS
                 JOIN GROUPS USING (G_ID)
                 WHERE E_ID = ?1 AND is_installed = 1 LIMIT 1",
                [self.id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name_id: row.get(1)?,
            name: row.get(2)?,
            ui_name: row.get(3)?,
            pkg_types: row.get(4)?,
            grp_types: row.get(5)?,
        })
    }
}

/// Snapshot a group into a transaction's TRANS_GROUP_DATA ledger, with the
/// installed flag reflecting the direction of the operation.
pub fn log_group_trans(conn: &Connection, tid: i64, group: &Group, installed: bool) -> Result<i64> {
    conn.execute(
        "INSERT INTO TRANS_GROUP_DATA (T_ID, G_ID, name_id, name, ui_name, is_installed, pkg_types)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            tid,
            group.id,
            &group.name_id,
            &group.name,
            &group.ui_name,
            installed as i64,
            group.pkg_types
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Find the TRANS_GROUP_DATA row that explains why a package is part of a
/// transaction: its name belongs to a group touched by the same transaction.
pub fn resolve_group_origin(conn: &Connection, pid: i64, tid: i64) -> Result<Option<i64>> {
    let tgid = conn
        .query_row(
            "SELECT TG_ID FROM PACKAGE
             JOIN GROUPS_PACKAGE USING (name)
             JOIN TRANS_GROUP_DATA USING (G_ID)
             WHERE P_ID = ?1 AND T_ID = ?2",
            params![pid, tid],
            |row| row.get(0),
        )
        .optional()?;
    Ok(tgid)
}

/// A package may be removed together with its group when it was installed
/// for a group and no other installed group still contains it.
pub fn removable_with_group(conn: &Connection, pkg_name: &str) -> Result<bool> {
    let reason = conn
        .query_row(
            "SELECT reason FROM PACKAGE
             JOIN PACKAGE_DATA USING (P_ID)
             JOIN TRANS_DATA USING (PD_ID)
             WHERE name = ?1 ORDER BY TD_ID DESC LIMIT 1",
            [pkg_name],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if reason.map(Reason::from_i64) != Some(Reason::Group) {
        return Ok(false);
    }
    let installed_groups: i64 = conn.query_row(
        "SELECT COUNT(*) FROM GROUPS_PACKAGE
         JOIN GROUPS USING (G_ID)
         WHERE is_installed = 1 AND GROUPS_PACKAGE.name = ?1",
        [pkg_name],
        |row| row.get(0),
    )?;
    Ok(installed_groups < 2)
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
    fn test_store_updates_in_place() {
        let conn = test_conn();
        let mut group = Group::new("base", "Base", "Base System", false, 0);
        let gid = group.store(&conn).unwrap();

        let mut updated = Group::new("base", "Base", "Minimal Base", true, 1);
        assert_eq!(updated.store(&conn).unwrap(), gid);

        let reloaded = Group::find_by_name_id(&conn, "base").unwrap().unwrap();
        assert_eq!(reloaded.ui_name, "Minimal Base");
        assert!(reloaded.is_installed);
    }

    #[test]
    fn test_add_packages_is_additive() {
        let conn = test_conn();
        let mut group = Group::new("base", "Base", "Base", true, 0);
        group.store(&conn).unwrap();

        group
            .add_packages(&conn, &["bash".to_string(), "coreutils".to_string()])
            .unwrap();
        group
            .add_packages(&conn, &["bash".to_string(), "sed".to_string()])
            .unwrap();
        assert_eq!(group.packages(&conn).unwrap(), vec!["bash", "coreutils", "sed"]);
    }

    #[test]
    fn test_set_packages_replaces() {
        let conn = test_conn();
        let mut group = Group::new("base", "Base", "Base", true, 0);
        group.store(&conn).unwrap();
        group.add_packages(&conn, &["bash".to_string()]).unwrap();
        group.set_packages(&conn, &["sed".to_string()]).unwrap();
        assert_eq!(group.packages(&conn).unwrap(), vec!["sed"]);
    }

    #[test]
    fn test_environment_installed_via_groups() {
        let conn = test_conn();
        let mut group = Group::new("core", "Core", "Core", false, 0);
        let gid = group.store(&conn).unwrap();

        let mut env = Environment::new("minimal", "Minimal", "Minimal Install", 0, 0);
        env.store(&conn).unwrap();
        env.add_groups(&conn, &[gid]).unwrap();

        assert!(!env.is_installed(&conn).unwrap());
        Group::commit(&conn, "core").unwrap();
        assert!(env.is_installed(&conn).unwrap());
        assert_eq!(env.group_name_ids(&conn).unwrap(), vec!["core"]);
    }
}
