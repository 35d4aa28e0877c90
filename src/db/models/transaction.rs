// src/db/models/transaction.rs

//! Transaction ledger rows

use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

/// One TRANS row plus the flags computed from its neighbours and outputs
/// when loaded through a history query.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: Option<i64>,
    pub beg_timestamp: i64,
    pub end_timestamp: Option<i64>,
    pub beg_rpmdb_version: String,
    pub end_rpmdb_version: Option<String>,
    pub cmdline: Option<String>,
    pub loginuid: Option<i64>,
    pub releasever: String,
    pub return_code: Option<i64>,

    /// The rpmdb changed between this transaction and the one before it.
    pub altered_lt_rpmdb: bool,
    /// The rpmdb changed between this transaction and the one after it.
    pub altered_gt_rpmdb: bool,
    /// Captured stdout exists for this transaction.
    pub is_output: bool,
    /// Captured stderr exists for this transaction.
    pub is_error: bool,
    /// When this object is the product of a merge, every source tid in
    /// ascending order; empty otherwise.
    pub merged_tids: Vec<i64>,
}

impl Transaction {
    pub fn new(
        beg_timestamp: i64,
        beg_rpmdb_version: &str,
        cmdline: &str,
        loginuid: i64,
        releasever: &str,
    ) -> Self {
        Self {
            id: None,
            beg_timestamp,
            end_timestamp: None,
            beg_rpmdb_version: beg_rpmdb_version.to_string(),
            end_rpmdb_version: None,
            cmdline: Some(cmdline.to_string()),
            loginuid: Some(loginuid),
            releasever: releasever.to_string(),
            return_code: None,
            altered_lt_rpmdb: false,
            altered_gt_rpmdb: false,
            is_output: false,
            is_error: false,
            merged_tids: Vec::new(),
        }
    }

    /// The transaction has been finalized.
    pub fn is_complete(&self) -> bool {
        self.end_timestamp.is_some()
    }

    pub fn beg_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.beg_timestamp, 0)
    }

    pub fn end_datetime(&self) -> Option<DateTime<Utc>> {
        self.end_timestamp.and_then(|t| DateTime::from_timestamp(t, 0))
    }

    /// Every tid this object covers: its own, or the merged set.
    pub fn tids(&self) -> Vec<i64> {
        if !self.merged_tids.is_empty() {
            return self.merged_tids.clone();
        }
        self.id.map(|tid| vec![tid]).unwrap_or_default()
    }

    /// Open the transaction in storage.
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO TRANS (beg_timestamp, beg_rpmdb_version, cmdline, loginuid, releasever)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.beg_timestamp,
                &self.beg_rpmdb_version,
                &self.cmdline,
                self.loginuid,
                &self.releasever,
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Finalize an open transaction.
    pub fn finish(
        conn: &Connection,
        tid: i64,
        end_timestamp: i64,
        end_rpmdb_version: &str,
        return_code: i64,
    ) -> Result<()> {
        conn.execute(
            "UPDATE TRANS SET end_timestamp = ?1, end_rpmdb_version = ?2, return_code = ?3
             WHERE T_ID = ?4",
            params![end_timestamp, end_rpmdb_version, return_code, tid],
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, tid: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT T_ID, beg_timestamp, end_timestamp, beg_rpmdb_version, end_rpmdb_version,
                    cmdline, loginuid, releasever, return_code
             FROM TRANS WHERE T_ID = ?1",
        )?;
        let trans = stmt.query_row([tid], Self::from_row).optional()?;
        Ok(trans)
    }

    /// Newest-first listing; `limit` 0 means unlimited, `complete_only`
    /// drops transactions still missing an end timestamp.
    pub fn list(conn: &Connection, limit: usize, complete_only: bool) -> Result<Vec<Self>> {
        let mut sql = String::from(
            "SELECT T_ID, beg_timestamp, end_timestamp, beg_rpmdb_version, end_rpmdb_version,
                    cmdline, loginuid, releasever, return_code
             FROM TRANS",
        );
        if complete_only {
            sql.push_str(" WHERE end_timestamp IS NOT NULL");
        }
        sql.push_str(" ORDER BY T_ID DESC");
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    pub fn cmdline_by_id(conn: &Connection, tid: i64) -> Result<Option<String>> {
        let cmdline = conn
            .query_row("SELECT cmdline FROM TRANS WHERE T_ID = ?1", [tid], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(cmdline)
    }

    /// Releasever of the transaction containing a package-data row.
    pub fn releasever_by_pdid(conn: &Connection, pdid: i64) -> Result<Option<String>> {
        let releasever = conn
            .query_row(
                "SELECT releasever FROM TRANS
                 JOIN TRANS_DATA USING (T_ID)
                 WHERE PD_ID = ?1 ORDER BY T_ID DESC LIMIT 1",
                [pdid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(releasever)
    }

    /// Fold another transaction into this one: the window keeps the
    /// earliest begin and the latest end, and remembers every source tid.
    pub fn absorb(&mut self, other: &Transaction) {
        if self.merged_tids.is_empty() {
            if let Some(tid) = self.id {
                self.merged_tids.push(tid);
            }
        }
        for tid in other.tids() {
            if !self.merged_tids.contains(&tid) {
                self.merged_tids.push(tid);
            }
        }
        self.merged_tids.sort_unstable();

        if other.beg_timestamp < self.beg_timestamp {
            self.beg_timestamp = other.beg_timestamp;
            self.beg_rpmdb_version = other.beg_rpmdb_version.clone();
        }
        if other.end_timestamp > self.end_timestamp {
            self.end_timestamp = other.end_timestamp;
            self.end_rpmdb_version = other.end_rpmdb_version.clone();
        }
        self.altered_lt_rpmdb |= other.altered_lt_rpmdb;
        self.altered_gt_rpmdb |= other.altered_gt_rpmdb;
        self.is_output |= other.is_output;
        self.is_error |= other.is_error;
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            beg_timestamp: row.get(1)?,
            end_timestamp: row.get(2)?,
            beg_rpmdb_version: row.get(3)?,
            end_rpmdb_version: row.get(4)?,
            cmdline: row.get(5)?,
            loginuid: row.get(6)?,
            releasever: row.get(7)?,
            return_code: row.get(8)?,
            altered_lt_rpmdb: false,
            altered_gt_rpmdb: false,
            is_output: false,
            is_error: false,
            merged_tids: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trans(tid: i64, beg: i64, end: i64) -> Transaction {
        let mut t = Transaction::new(beg, "rpmdb-a", "cmd", 1000, "26");
        t.id = Some(tid);
        t.end_timestamp = Some(end);
        t.end_rpmdb_version = Some(format!("rpmdb-end-{tid}"));
        t
    }

    #[test]
    fn test_absorb_keeps_window_bounds() {
        let mut a = trans(1, 100, 200);
        let b = trans(2, 300, 400);
        a.absorb(&b);
        assert_eq!(a.beg_timestamp, 100);
        assert_eq!(a.end_timestamp, Some(400));
        assert_eq!(a.end_rpmdb_version.as_deref(), Some("rpmdb-end-2"));
        assert_eq!(a.merged_tids, vec![1, 2]);
    }

    #[test]
    fn test_absorb_dedupes_and_sorts_tids() {
        let mut a = trans(3, 100, 200);
        let mut b = trans(1, 50, 90);
        b.merged_tids = vec![1, 2];
        a.absorb(&b);
        a.absorb(&trans(2, 95, 99));
        assert_eq!(a.merged_tids, vec![1, 2, 3]);
        assert_eq!(a.beg_timestamp, 50);
    }

    #[test]
    fn test_tids_for_unmerged_transaction() {
        let t = trans(7, 1, 2);
        assert_eq!(t.tids(), vec![7]);
    }
}
