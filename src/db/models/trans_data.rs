// src/db/models/trans_data.rs

//! Per-package-per-transaction records: what happened and why

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

/// Why a package is present on the system.
///
/// Stored as its integer value in TRANS_DATA. "User" must never be
/// downgraded implicitly; only `set_reason`/`mark_user_installed` may
/// change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Unknown = 0,
    Dependency = 1,
    User = 2,
    Clean = 3,
    WeakDependency = 4,
    Group = 5,
}

impl Reason {
    pub fn as_str(&self) -> &str {
        match self {
            Reason::Unknown => "unknown",
            Reason::Dependency => "dep",
            Reason::User => "user",
            Reason::Clean => "clean",
            Reason::WeakDependency => "weak",
            Reason::Group => "group",
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => Reason::Dependency,
            2 => Reason::User,
            3 => Reason::Clean,
            4 => Reason::WeakDependency,
            5 => Reason::Group,
            _ => Reason::Unknown,
        }
    }

    /// Dependency-class reasons do not count as user intent.
    pub fn is_dep(&self) -> bool {
        matches!(self, Reason::Dependency | Reason::WeakDependency)
    }
}

impl FromStr for Reason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Reason::Unknown),
            "dep" => Ok(Reason::Dependency),
            "user" => Ok(Reason::User),
            "clean" => Ok(Reason::Clean),
            "weak" => Ok(Reason::WeakDependency),
            "group" => Ok(Reason::Group),
            _ => Err(format!("Invalid reason: {s}")),
        }
    }
}

/// What happened to a package in a transaction.
///
/// The display strings are a compatibility contract: history renderers and
/// the merge engine compare them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    TrueInstall,
    DepInstall,
    Erase,
    Update,
    Updated,
    Upgrade,
    Upgraded,
    Downgrade,
    Downgraded,
    Reinstall,
    Obsoleted,
    Obsoleting,
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Install => "Install",
            Action::TrueInstall => "True-Install",
            Action::DepInstall => "Dep-Install",
            Action::Erase => "Erase",
            Action::Update => "Update",
            Action::Updated => "Updated",
            Action::Upgrade => "Upgrade",
            Action::Upgraded => "Upgraded",
            Action::Downgrade => "Downgrade",
            Action::Downgraded => "Downgraded",
            Action::Reinstall => "Reinstall",
            Action::Obsoleted => "Obsoleted",
            Action::Obsoleting => "Obsoleting",
        }
    }

    /// The package left the system.
    pub fn is_erase(&self) -> bool {
        matches!(self, Action::Erase | Action::Obsoleted)
    }

    /// The package newly arrived on the system.
    pub fn is_install(&self) -> bool {
        matches!(self, Action::Install | Action::TrueInstall | Action::DepInstall)
    }

    /// The package was replaced by or replaces another build.
    pub fn is_alteration(&self) -> bool {
        matches!(
            self,
            Action::Update
                | Action::Updated
                | Action::Downgrade
                | Action::Downgraded
                | Action::Obsoleting
        )
    }

    /// After this action the package is present on the system.
    pub fn leaves_installed(&self) -> bool {
        matches!(
            self,
            Action::Install | Action::Reinstall | Action::Update | Action::Downgrade
        )
    }

    /// Actions that begin a provenance chain rather than continue one; no
    /// predecessor link is recorded for them.
    pub fn starts_chain(&self) -> bool {
        matches!(
            self,
            Action::Install
                | Action::TrueInstall
                | Action::DepInstall
                | Action::Updated
                | Action::Reinstall
                | Action::Obsoleted
        )
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Install" => Ok(Action::Install),
            "True-Install" => Ok(Action::TrueInstall),
            "Dep-Install" => Ok(Action::DepInstall),
            "Erase" => Ok(Action::Erase),
            "Update" => Ok(Action::Update),
            "Updated" => Ok(Action::Updated),
            "Upgrade" => Ok(Action::Upgrade),
            "Upgraded" => Ok(Action::Upgraded),
            "Downgrade" => Ok(Action::Downgrade),
            "Downgraded" => Ok(Action::Downgraded),
            "Reinstall" => Ok(Action::Reinstall),
            "Obsoleted" => Ok(Action::Obsoleted),
            "Obsoleting" => Ok(Action::Obsoleting),
            _ => Err(format!("Invalid action: {s}")),
        }
    }
}

/// One TRANS_DATA row.
#[derive(Debug, Clone)]
pub struct TransData {
    pub id: Option<i64>,
    pub tid: i64,
    pub pdid: i64,
    pub tgid: Option<i64>,
    pub done: bool,
    pub original_td_id: Option<i64>,
    pub reason: Reason,
    pub state_id: i64,
    pub obsoleting: bool,
}

impl TransData {
    pub fn new(tid: i64, pdid: i64, reason: Reason, state_id: i64, obsoleting: bool) -> Self {
        Self {
            id: None,
            tid,
            pdid,
            tgid: None,
            done: false,
            original_td_id: None,
            reason,
            state_id,
            obsoleting,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO TRANS_DATA (T_ID, PD_ID, TG_ID, done, ORIGINAL_TD_ID, reason, state, obsoleting)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.tid,
                self.pdid,
                self.tgid,
                self.done as i64,
                self.original_td_id,
                self.reason as i64,
                self.state_id,
                self.obsoleting as i64,
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Latest record for a package-data row.
    pub fn find_latest_by_pdid(conn: &Connection, pdid: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT TD_ID, T_ID, PD_ID, TG_ID, done, ORIGINAL_TD_ID, reason, state, obsoleting
             FROM TRANS_DATA WHERE PD_ID = ?1 ORDER BY TD_ID DESC LIMIT 1",
        )?;
        let record = stmt.query_row([pdid], Self::from_row).optional()?;
        Ok(record)
    }

    /// All records for a package-data row, insertion order.
    pub fn find_by_pdid(conn: &Connection, pdid: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT TD_ID, T_ID, PD_ID, TG_ID, done, ORIGINAL_TD_ID, reason, state, obsoleting
             FROM TRANS_DATA WHERE PD_ID = ?1 ORDER BY TD_ID",
        )?;
        let records = stmt
            .query_map([pdid], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// All records in a transaction, insertion order.
    pub fn find_by_tid(conn: &Connection, tid: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT TD_ID, T_ID, PD_ID, TG_ID, done, ORIGINAL_TD_ID, reason, state, obsoleting
             FROM TRANS_DATA WHERE T_ID = ?1 ORDER BY TD_ID",
        )?;
        let records = stmt
            .query_map([tid], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Latest record for a package id, joined through PACKAGE_DATA.
    pub fn find_latest_by_pid(conn: &Connection, pid: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT TD_ID, T_ID, TRANS_DATA.PD_ID, TG_ID, done, ORIGINAL_TD_ID, reason, state, obsoleting
             FROM TRANS_DATA
             JOIN PACKAGE_DATA USING (PD_ID)
             WHERE P_ID = ?1 ORDER BY TD_ID DESC LIMIT 1",
        )?;
        let record = stmt.query_row([pid], Self::from_row).optional()?;
        Ok(record)
    }

    /// Latest record for a package id within one transaction.
    pub fn find_latest_by_pid_tid(conn: &Connection, pid: i64, tid: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT TD_ID, T_ID, TRANS_DATA.PD_ID, TG_ID, done, ORIGINAL_TD_ID, reason, state, obsoleting
             FROM TRANS_DATA
             JOIN PACKAGE_DATA USING (PD_ID)
             WHERE P_ID = ?1 AND T_ID = ?2 ORDER BY TD_ID DESC LIMIT 1",
        )?;
        let record = stmt.query_row([pid, tid], Self::from_row).optional()?;
        Ok(record)
    }

    /// Mark this record finished with its final state.
    pub fn finish(&mut self, conn: &Connection, state_id: i64) -> Result<()> {
        conn.execute(
            "UPDATE TRANS_DATA SET done = 1, state = ?1 WHERE TD_ID = ?2",
            params![state_id, self.id],
        )?;
        self.done = true;
        self.state_id = state_id;
        Ok(())
    }

    pub fn set_reason(conn: &Connection, tdid: i64, reason: Reason) -> Result<()> {
        conn.execute(
            "UPDATE TRANS_DATA SET reason = ?1 WHERE TD_ID = ?2",
            params![reason as i64, tdid],
        )?;
        Ok(())
    }

    pub fn set_original(conn: &Connection, tdid: i64, original_td_id: i64) -> Result<()> {
        conn.execute(
            "UPDATE TRANS_DATA SET ORIGINAL_TD_ID = ?1 WHERE TD_ID = ?2",
            params![original_td_id, tdid],
        )?;
        Ok(())
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let reason: i64 = row.get(6)?;
        Ok(Self {
            id: Some(row.get(0)?),
            tid: row.get(1)?,
            pdid: row.get(2)?,
            tgid: row.get(3)?,
            done: row.get::<_, i64>(4)? != 0,
            original_td_id: row.get(5)?,
            reason: Reason::from_i64(reason),
            state_id: row.get(7)?,
            obsoleting: row.get::<_, i64>(8)? != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_round_trip() {
        for reason in [
            Reason::Unknown,
            Reason::Dependency,
            Reason::User,
            Reason::Clean,
            Reason::WeakDependency,
            Reason::Group,
        ] {
            assert_eq!(Reason::from_i64(reason as i64), reason);
            assert_eq!(reason.as_str().parse::<Reason>().unwrap(), reason);
        }
    }

    #[test]
    fn test_unknown_reason_value_maps_to_unknown() {
        assert_eq!(Reason::from_i64(99), Reason::Unknown);
        assert_eq!(Reason::from_i64(-1), Reason::Unknown);
    }

    #[test]
    fn test_action_labels() {
        assert_eq!(Action::TrueInstall.as_str(), "True-Install");
        assert_eq!(Action::DepInstall.as_str(), "Dep-Install");
        assert_eq!("Obsoleting".parse::<Action>().unwrap(), Action::Obsoleting);
        assert!("obsoleting".parse::<Action>().is_err());
    }

    #[test]
    fn test_action_classes() {
        assert!(Action::Obsoleted.is_erase());
        assert!(Action::DepInstall.is_install());
        assert!(Action::Updated.is_alteration());
        assert!(!Action::Reinstall.is_alteration());
        assert!(Action::Downgrade.leaves_installed());
        assert!(!Action::Erase.leaves_installed());
        assert!(Action::Updated.starts_chain());
        assert!(!Action::Update.starts_chain());
    }
}
