// src/db/models/package.rs

//! Package identity and per-installation provenance

use crate::error::Result;
use crate::nevra::Nevra;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// One PACKAGE row: the immutable identity of a package build.
///
/// Inserting never deduplicates; every insert is a distinct install event
/// with its own pid, and pids are never reused. Callers wanting dedup look
/// the NEVRA up first.
#[derive(Debug, Clone)]
pub struct Package {
    pub id: Option<i64>,
    pub name: String,
    pub epoch: i64,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub checksum_data: Option<String>,
    pub checksum_type: Option<String>,
    pub type_id: i64,
    /// Display repo string, resolved lazily and cached.
    pub ui_repo: Option<String>,
}

impl Package {
    pub fn new(nevra: &Nevra, checksum_data: &str, checksum_type: &str, type_id: i64) -> Self {
        Self {
            id: None,
            name: nevra.name.clone(),
            epoch: nevra.epoch,
            version: nevra.version.clone(),
            release: nevra.release.clone(),
            arch: nevra.arch.clone(),
            checksum_data: Some(checksum_data.to_string()),
            checksum_type: Some(checksum_type.to_string()),
            type_id,
            ui_repo: None,
        }
    }

    pub fn nevra(&self) -> Nevra {
        Nevra::new(&self.name, self.epoch, &self.version, &self.release, &self.arch)
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO PACKAGE (name, epoch, version, release, arch, checksum_data, checksum_type, type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &self.name,
                self.epoch,
                &self.version,
                &self.release,
                &self.arch,
                &self.checksum_data,
                &self.checksum_type,
                self.type_id,
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, pid: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT P_ID, name, epoch, version, release, arch, checksum_data, checksum_type, type
             FROM PACKAGE WHERE P_ID = ?1",
        )?;
        let package = stmt.query_row([pid], Self::from_row).optional()?;
        Ok(package)
    }

    /// Equality lookup by full NEVRA; the most recent matching pid wins.
    pub fn find_by_nevra(conn: &Connection, nevra: &Nevra) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT P_ID, name, epoch, version, release, arch, checksum_data, checksum_type, type
             FROM PACKAGE
             WHERE name = ?1 AND epoch = ?2 AND version = ?3 AND release = ?4 AND arch = ?5
             ORDER BY P_ID DESC LIMIT 1",
        )?;
        let package = stmt
            .query_row(
                params![nevra.name, nevra.epoch, nevra.version, nevra.release, nevra.arch],
                Self::from_row,
            )
            .optional()?;
        Ok(package)
    }

    pub fn name_by_id(conn: &Connection, pid: i64) -> Result<Option<String>> {
        let name = conn
            .query_row("SELECT name FROM PACKAGE WHERE P_ID = ?1", [pid], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(name)
    }

    /// Package-name substring search, the fast path.
    pub fn search_by_name(conn: &Connection, pattern: &str) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare("SELECT P_ID FROM PACKAGE WHERE name LIKE ?1")?;
        let pids = stmt
            .query_map([pattern], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(pids)
    }

    /// Composite-form search, the fallback when the name search misses.
    ///
    /// Matches the pattern against every spec form a user may type, built
    /// as SQL-computed columns so the pattern never needs client-side
    /// parsing.
    pub fn search_by_spec_forms(conn: &Connection, pattern: &str) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT P_ID,
                name || '.' || arch AS sql_na,
                name || '-' || version || '-' || release || '.' || arch AS sql_nvra,
                name || '-' || version AS sql_nv,
                name || '-' || version || '-' || release AS sql_nvr,
                epoch || ':' || name || '-' || version || '-' || release || '-' || arch AS sql_envra,
                name || '-' || epoch || '-' || version || '-' || release || '-' || arch AS sql_nevra
             FROM PACKAGE
             WHERE sql_na LIKE ?1 OR sql_nvra LIKE ?1 OR sql_nv LIKE ?1 OR sql_nvr LIKE ?1
                OR sql_envra LIKE ?1 OR sql_nevra LIKE ?1",
        )?;
        let pids = stmt
            .query_map([pattern], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(pids)
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            epoch: row.get(2)?,
            version: row.get(3)?,
            release: row.get(4)?,
            arch: row.get(5)?,
            checksum_data: row.get(6)?,
            checksum_type: row.get(7)?,
            type_id: row.get(8)?,
            ui_repo: None,
        })
    }
}

/// One PACKAGE_DATA row: where a particular installation of a pid came
/// from. A pid accumulates one row per install/update event; the highest
/// pdid is the authoritative "current" provenance.
#[derive(Debug, Clone, Default)]
pub struct PackageData {
    pub id: Option<i64>,
    pub pid: i64,
    pub rid: Option<i64>,
    pub from_repo_revision: Option<String>,
    pub from_repo_timestamp: Option<i64>,
    pub installed_by: Option<String>,
    pub changed_by: Option<String>,
    pub installonly: Option<String>,
    pub origin_url: Option<String>,
}

impl PackageData {
    /// Insert an empty placeholder row for a pid; provenance fields are
    /// populated later by the provenance update once the repo is known.
    pub fn insert_placeholder(conn: &Connection, pid: i64) -> Result<i64> {
        conn.execute("INSERT INTO PACKAGE_DATA (P_ID) VALUES (?1)", [pid])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(conn: &Connection, pdid: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT PD_ID, P_ID, R_ID, from_repo_revision, from_repo_timestamp, installed_by,
                    changed_by, installonly, origin_url
             FROM PACKAGE_DATA WHERE PD_ID = ?1",
        )?;
        let data = stmt.query_row([pdid], Self::from_row).optional()?;
        Ok(data)
    }

    /// Latest provenance row for a pid.
    pub fn find_latest_by_pid(conn: &Connection, pid: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT PD_ID, P_ID, R_ID, from_repo_revision, from_repo_timestamp, installed_by,
                    changed_by, installonly, origin_url
             FROM PACKAGE_DATA WHERE P_ID = ?1 ORDER BY PD_ID DESC LIMIT 1",
        )?;
        let data = stmt.query_row([pid], Self::from_row).optional()?;
        Ok(data)
    }

    /// The placeholder row opened for this pid in this transaction, if the
    /// record-begin step ran.
    pub fn find_pending(conn: &Connection, pid: i64, tid: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT PD_ID, P_ID, R_ID, from_repo_revision, from_repo_timestamp, installed_by,
                    changed_by, installonly, origin_url
             FROM PACKAGE_DATA
             JOIN TRANS_DATA USING (PD_ID)
             WHERE P_ID = ?1 AND T_ID = ?2
             ORDER BY PD_ID DESC LIMIT 1",
        )?;
        let data = stmt.query_row([pid, tid], Self::from_row).optional()?;
        Ok(data)
    }

    /// All provenance rows ever recorded for a pid.
    pub fn ids_for_pid(conn: &Connection, pid: i64) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare("SELECT PD_ID FROM PACKAGE_DATA WHERE P_ID = ?1")?;
        let pdids = stmt
            .query_map([pid], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(pdids)
    }

    /// Fill in the provenance fields of an existing row.
    pub fn update(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE PACKAGE_DATA
             SET R_ID = ?1, from_repo_revision = ?2, from_repo_timestamp = ?3,
                 installed_by = ?4, changed_by = ?5, installonly = ?6, origin_url = ?7
             WHERE PD_ID = ?8",
            params![
                self.rid,
                self.from_repo_revision,
                self.from_repo_timestamp,
                self.installed_by,
                self.changed_by,
                self.installonly,
                self.origin_url,
                self.id,
            ],
        )?;
        Ok(())
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            pid: row.get(1)?,
            rid: row.get(2)?,
            from_repo_revision: row.get(3)?,
            from_repo_timestamp: row.get(4)?,
            installed_by: row.get(5)?,
            changed_by: row.get(6)?,
            installonly: row.get(7)?,
            origin_url: row.get(8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::test_support::create_test_db;

    fn nevra(s: &str) -> Nevra {
        s.parse().unwrap()
    }

    #[test]
    fn test_insert_never_deduplicates() {
        let conn = create_test_db();
        let spec = nevra("tour-4-6.noarch");
        let a = Package::new(&spec, "abc", "sha256", 1).insert(&conn).unwrap();
        let b = Package::new(&spec, "abc", "sha256", 1).insert(&conn).unwrap();
        assert_ne!(a, b);

        // The lookup resolves to the most recent install event.
        let found = Package::find_by_nevra(&conn, &spec).unwrap().unwrap();
        assert_eq!(found.id, Some(b));
    }

    #[test]
    fn test_find_by_nevra_distinguishes_epoch() {
        let conn = create_test_db();
        Package::new(&nevra("tour-4-6.noarch"), "x", "sha256", 1)
            .insert(&conn)
            .unwrap();
        assert!(
            Package::find_by_nevra(&conn, &nevra("tour-1:4-6.noarch"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_search_paths() {
        let conn = create_test_db();
        Package::new(&nevra("tour-1:4-6.noarch"), "x", "sha256", 1)
            .insert(&conn)
            .unwrap();

        assert_eq!(Package::search_by_name(&conn, "tour").unwrap().len(), 1);
        assert!(Package::search_by_name(&conn, "tour.noarch").unwrap().is_empty());
        for pattern in ["tour.noarch", "tour-4-6.noarch", "tour-4", "tour-4-6"] {
            assert_eq!(
                Package::search_by_spec_forms(&conn, pattern).unwrap().len(),
                1,
                "pattern {pattern} should match"
            );
        }
        assert!(Package::search_by_spec_forms(&conn, "sl-3.03").unwrap().is_empty());
    }

    #[test]
    fn test_placeholder_rows_accumulate() {
        let conn = create_test_db();
        let pid = Package::new(&nevra("tour-4-6.noarch"), "x", "sha256", 1)
            .insert(&conn)
            .unwrap();
        let first = PackageData::insert_placeholder(&conn, pid).unwrap();
        let second = PackageData::insert_placeholder(&conn, pid).unwrap();
        assert_ne!(first, second);

        let latest = PackageData::find_latest_by_pid(&conn, pid).unwrap().unwrap();
        assert_eq!(latest.id, Some(second));
        assert_eq!(PackageData::ids_for_pid(&conn, pid).unwrap(), vec![first, second]);
    }
}
