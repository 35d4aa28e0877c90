// src/swdb.rs

//! The history database session and its public operations
//!
//! A [`Swdb`] owns the path to the database file and the connection,
//! opened lazily on first use and held for the session lifetime. Every
//! operation is a self-contained blocking call; callers recording a
//! package transaction should treat failures here as "history unavailable"
//! and never abort the package operation itself.

use crate::db::models::{
    Action, Environment, Group, OutputKind, Package, PackageData, Reason, Repo, TransData,
    Transaction, log_group_trans, removable_with_group, resolve_group_origin,
};
use crate::db::{self, intern};
use crate::error::{Error, Result};
use crate::merge::{MergeRecord, MergedView, merge_actions};
use crate::nevra::Nevra;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Repo name the OS installer records; packages laid down by it do not
/// count as user-installed.
const INSTALLER_REPO: &str = "anakonda";

/// Display string when no provenance is recorded for a package.
const UNKNOWN_REPO: &str = "unknown";

/// One package of a transaction with its resolved action and flags.
#[derive(Debug, Clone)]
pub struct TransactionPackage {
    pub package: Package,
    pub state: Action,
    pub reason: Reason,
    pub done: bool,
    pub obsoleting: bool,
}

/// Provenance attached to a package once its repo is known.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    pub from_repo: String,
    pub from_repo_revision: Option<String>,
    pub from_repo_timestamp: Option<i64>,
    pub installed_by: Option<String>,
    pub changed_by: Option<String>,
    pub installonly: Option<String>,
    pub origin_url: Option<String>,
}

/// A session against one history database file.
pub struct Swdb {
    path: PathBuf,
    releasever: String,
    conn: Option<Connection>,
}

impl Swdb {
    pub fn new(path: impl Into<PathBuf>, releasever: &str) -> Self {
        Self {
            path: path.into(),
            releasever: releasever.to_string(),
            conn: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn releasever(&self) -> &str {
        &self.releasever
    }

    /// Whether the database file exists at all.
    pub fn exist(&self) -> bool {
        self.path.exists()
    }

    /// Open the database, creating the schema on first use. A no-op when
    /// the connection is already open.
    pub fn open(&mut self) -> Result<()> {
        self.conn()?;
        Ok(())
    }

    /// Close the connection. Fails soft: a close error is logged, never
    /// surfaced, and the session can be reopened afterwards.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((conn, e)) = conn.close() {
                warn!("failed to close history database: {e}");
                drop(conn);
            }
        }
    }

    /// Create all tables, returning the number of statements that failed.
    /// Zero means the schema is usable; anything else is fatal and the
    /// file should be discarded.
    pub fn create_db(&mut self) -> Result<usize> {
        match self.open() {
            Ok(()) => Ok(0),
            Err(Error::SchemaCreation(failed)) => Ok(failed),
            Err(e) => Err(e),
        }
    }

    /// Delete the database file and create a fresh one. Bootstrap and
    /// test use only; history is otherwise append-only.
    pub fn reset_db(&mut self) -> Result<()> {
        self.close();
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        self.open()
    }

    fn conn(&mut self) -> Result<&Connection> {
        if self.conn.is_none() {
            self.conn = Some(db::open(&self.path)?);
        }
        self.conn
            .as_ref()
            .ok_or_else(|| Error::Io(std::io::Error::other("connection unavailable")))
    }

    // ------------------------------------------------------------------
    // Package identity & provenance

    /// Resolve a NEVRA to its package id. `None` means the package was
    /// never recorded, which callers treat as a plain no-op.
    pub fn pid_by_nevra(&mut self, nevra: &Nevra) -> Result<Option<i64>> {
        let conn = self.conn()?;
        Ok(Package::find_by_nevra(conn, nevra)?.and_then(|p| p.id))
    }

    /// Record a package build. Always inserts: every call is a distinct
    /// install event with its own pid, even for a NEVRA seen before.
    pub fn add_package(
        &mut self,
        nevra: &Nevra,
        checksum_data: &str,
        checksum_type: &str,
        kind: &str,
    ) -> Result<i64> {
        let conn = self.conn()?;
        let type_id = intern::get_or_create(conn, intern::InternTable::PackageType, kind)?;
        let pid = Package::new(nevra, checksum_data, checksum_type, type_id).insert(conn)?;
        debug!("recorded package {nevra} as pid {pid}");
        Ok(pid)
    }

    /// Batch checksum lookup, one entry per input NEVRA.
    pub fn checksums(&mut self, nevras: &[Nevra]) -> Result<Vec<Option<(String, String)>>> {
        let conn = self.conn()?;
        let mut pairs = Vec::with_capacity(nevras.len());
        for nevra in nevras {
            let pair = Package::find_by_nevra(conn, nevra)?.and_then(|p| {
                match (p.checksum_data, p.checksum_type) {
                    (Some(data), Some(kind)) => Some((data, kind)),
                    _ => None,
                }
            });
            pairs.push(pair);
        }
        Ok(pairs)
    }

    /// Latest provenance recorded for a NEVRA.
    pub fn package_data(&mut self, nevra: &Nevra) -> Result<Option<PackageData>> {
        let Some(pid) = self.pid_by_nevra(nevra)? else {
            return Ok(None);
        };
        PackageData::find_latest_by_pid(self.conn()?, pid)
    }

    /// Fill in the provenance of the package-data row opened by
    /// [`Swdb::trans_data_beg`] for this `(pid, tid)`. Erroring when no
    /// such row exists is what enforces the record-begin-first ordering.
    pub fn update_package_data(
        &mut self,
        pid: i64,
        tid: i64,
        provenance: &Provenance,
    ) -> Result<()> {
        let conn = self.conn()?;
        let Some(mut data) = PackageData::find_pending(conn, pid, tid)? else {
            warn!("no pending package data for pid {pid} in transaction {tid}");
            return Err(Error::MissingTransRecord { pid, tid });
        };
        data.rid = Some(Repo::bind_by_name(conn, &provenance.from_repo)?);
        data.from_repo_revision = provenance.from_repo_revision.clone();
        data.from_repo_timestamp = provenance.from_repo_timestamp;
        data.installed_by = provenance.installed_by.clone();
        data.changed_by = provenance.changed_by.clone();
        data.installonly = provenance.installonly.clone();
        data.origin_url = provenance.origin_url.clone();
        data.update(conn)
    }

    /// Display repo string for a package: `"@repo"`, or `"@repo/relver"`
    /// when the package was installed under a different release than the
    /// session's. Cached on the package object after the first call.
    pub fn ui_from_repo(&mut self, pkg: &mut Package) -> Result<String> {
        if let Some(cached) = &pkg.ui_repo {
            return Ok(cached.clone());
        }
        let Some(pid) = pkg.id else {
            return Ok(UNKNOWN_REPO.to_string());
        };
        let releasever = self.releasever.clone();
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT REPO.name, PD_ID FROM PACKAGE_DATA
                 JOIN REPO USING (R_ID)
                 WHERE P_ID = ?1 ORDER BY PD_ID DESC LIMIT 1",
                [pid],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        let Some((repo, pdid)) = found else {
            return Ok(UNKNOWN_REPO.to_string());
        };
        let installed_under = Transaction::releasever_by_pdid(conn, pdid)?;
        let display = match installed_under {
            Some(rv) if rv != releasever => format!("@{repo}/{rv}"),
            _ => format!("@{repo}"),
        };
        pkg.ui_repo = Some(display.clone());
        Ok(display)
    }

    // ------------------------------------------------------------------
    // Reason queries

    /// Latest recorded reason for a package; Unknown when nothing is
    /// recorded.
    pub fn reason(&mut self, nevra: &Nevra) -> Result<Reason> {
        let Some(pid) = self.pid_by_nevra(nevra)? else {
            return Ok(Reason::Unknown);
        };
        let record = TransData::find_latest_by_pid(self.conn()?, pid)?;
        Ok(record.map(|r| r.reason).unwrap_or(Reason::Unknown))
    }

    /// Overwrite the latest recorded reason for a package. Returns false
    /// when the package cannot be resolved.
    pub fn set_reason(&mut self, nevra: &Nevra, reason: Reason) -> Result<bool> {
        let Some(pid) = self.pid_by_nevra(nevra)? else {
            return Ok(false);
        };
        let conn = self.conn()?;
        let Some(record) = TransData::find_latest_by_pid(conn, pid)? else {
            return Ok(false);
        };
        if let Some(tdid) = record.id {
            TransData::set_reason(conn, tdid, reason)?;
        }
        Ok(true)
    }

    /// Explicitly flip a package between user-installed and dependency.
    pub fn mark_user_installed(&mut self, nevra: &Nevra, user: bool) -> Result<bool> {
        let reason = if user { Reason::User } else { Reason::Dependency };
        self.set_reason(nevra, reason)
    }

    /// A package counts as user-installed when it resolves, its latest
    /// reason is User and it was not laid down by the installer.
    pub fn user_installed(&mut self, nevra: &Nevra) -> Result<bool> {
        let Some(pid) = self.pid_by_nevra(nevra)? else {
            return Ok(false);
        };
        let conn = self.conn()?;
        let Some(record) = TransData::find_latest_by_pid(conn, pid)? else {
            return Ok(false);
        };
        if record.reason != Reason::User {
            return Ok(false);
        }
        let repo = self.latest_repo_name(pid)?;
        Ok(repo.as_deref() != Some(INSTALLER_REPO))
    }

    /// Batch classification: indices of the inputs considered
    /// user-installed. A dependency-class reason anywhere in a package's
    /// history does not override a non-dependency one; the first
    /// non-dependency reason wins. Unresolvable entries classify as
    /// user-installed, the safe direction for uninstall protection.
    pub fn select_user_installed(&mut self, nevras: &[Nevra]) -> Result<Vec<usize>> {
        let mut selected = Vec::new();
        for (index, nevra) in nevras.iter().enumerate() {
            let Some(pid) = self.pid_by_nevra(nevra)? else {
                selected.push(index);
                continue;
            };
            let conn = self.conn()?;
            let Some(data) = PackageData::find_latest_by_pid(conn, pid)? else {
                selected.push(index);
                continue;
            };
            let Some(pdid) = data.id else {
                selected.push(index);
                continue;
            };
            let mut user = true;
            for record in TransData::find_by_pdid(conn, pdid)? {
                if record.reason.is_dep() {
                    user = false;
                    continue;
                }
                user = true;
                break;
            }
            if user {
                selected.push(index);
            }
        }
        Ok(selected)
    }

    /// What reason a package re-created by undoing transactions
    /// `first_trans_id..` should carry.
    ///
    /// If the package was altered again after the undo window and is
    /// currently installed, its current reason takes precedence (skipped
    /// for a full rollback). Otherwise the reason recorded just before
    /// the window applies, defaulting to User.
    pub fn get_erased_reason(
        &mut self,
        nevra: &Nevra,
        first_trans_id: i64,
        rollback: bool,
    ) -> Result<Reason> {
        let Some(pid) = self.pid_by_nevra(nevra)? else {
            return Ok(Reason::User);
        };
        // Search by name, not exact NEVRA; the version may have changed
        // across the window.
        let tids = self.search(&[&nevra.name])?;
        if tids.is_empty() {
            return Ok(Reason::User);
        }

        if !rollback {
            let last_tid = tids.iter().copied().max().unwrap_or(0);
            let conn = self.conn()?;
            if let Some(record) = TransData::find_latest_by_pid_tid(conn, pid, last_tid)? {
                if let Some(action) = self.action_for_state(record.state_id)? {
                    if action.leaves_installed() {
                        return self.reason(nevra);
                    }
                }
            }
        }

        let before_window = tids.iter().copied().filter(|t| *t < first_trans_id).max();
        let Some(tid) = before_window else {
            return Ok(Reason::User);
        };
        let conn = self.conn()?;
        let reason = conn
            .query_row(
                "SELECT reason FROM TRANS_DATA
                 JOIN PACKAGE_DATA USING (PD_ID)
                 WHERE T_ID = ?1 AND P_ID = ?2
                 ORDER BY TD_ID DESC LIMIT 1",
                params![tid, pid],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(reason.map(Reason::from_i64).unwrap_or(Reason::User))
    }

    // ------------------------------------------------------------------
    // Transaction ledger

    /// Open a transaction record; the end fields stay null until
    /// [`Swdb::trans_end`].
    pub fn trans_beg(
        &mut self,
        timestamp: i64,
        rpmdb_version: &str,
        cmdline: &str,
        loginuid: i64,
        releasever: &str,
    ) -> Result<i64> {
        let conn = self.conn()?;
        let tid =
            Transaction::new(timestamp, rpmdb_version, cmdline, loginuid, releasever).insert(conn)?;
        debug!("began transaction {tid}");
        Ok(tid)
    }

    /// Finalize an open transaction.
    pub fn trans_end(
        &mut self,
        tid: i64,
        end_timestamp: i64,
        end_rpmdb_version: &str,
        return_code: i64,
    ) -> Result<()> {
        let conn = self.conn()?;
        Transaction::finish(conn, tid, end_timestamp, end_rpmdb_version, return_code)?;
        debug!("ended transaction {tid} with return code {return_code}");
        Ok(())
    }

    /// Command line a transaction was started with.
    pub fn trans_cmdline(&mut self, tid: i64) -> Result<Option<String>> {
        Transaction::cmdline_by_id(self.conn()?, tid)
    }

    /// Record that a tooling package performed a transaction.
    pub fn trans_with(&mut self, tid: i64, pid: i64) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO TRANS_WITH (T_ID, P_ID) VALUES (?1, ?2)",
            params![tid, pid],
        )?;
        Ok(())
    }

    /// The tooling packages recorded for a transaction.
    pub fn trans_performed_with(&mut self, tid: i64) -> Result<Vec<Package>> {
        let mut stmt = self.conn()?.prepare(
            "SELECT P_ID, name, epoch, version, release, arch, checksum_data, checksum_type, type
             FROM TRANS_WITH JOIN PACKAGE USING (P_ID) WHERE T_ID = ?1 ORDER BY TW_ID",
        )?;
        let packages = stmt
            .query_map([tid], Package::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(packages)
    }

    pub fn log_output(&mut self, tid: i64, msg: &str) -> Result<()> {
        crate::db::models::append_output(self.conn()?, tid, msg, OutputKind::Stdout)
    }

    pub fn log_error(&mut self, tid: i64, msg: &str) -> Result<()> {
        crate::db::models::append_output(self.conn()?, tid, msg, OutputKind::Stderr)
    }

    pub fn load_output(&mut self, tid: i64) -> Result<Vec<String>> {
        crate::db::models::load_output(self.conn()?, tid, OutputKind::Stdout)
    }

    pub fn load_error(&mut self, tid: i64) -> Result<Vec<String>> {
        crate::db::models::load_output(self.conn()?, tid, OutputKind::Stderr)
    }

    /// Captured stdout of a transaction, spanning every source tid when
    /// the object is merged.
    pub fn transaction_output(&mut self, trans: &Transaction) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        for tid in trans.tids() {
            lines.extend(self.load_output(tid)?);
        }
        Ok(lines)
    }

    /// Captured stderr of a transaction, spanning every source tid when
    /// the object is merged.
    pub fn transaction_error(&mut self, trans: &Transaction) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        for tid in trans.tids() {
            lines.extend(self.load_error(tid)?);
        }
        Ok(lines)
    }

    /// History query, newest first. `tids` filters the result when
    /// non-empty (and then overrides `limit`), `limit` 0 means unlimited,
    /// `complete_only` drops open transactions. Also resolves the
    /// altered-rpmdb flags between neighbours and the output presence
    /// flags.
    pub fn trans_old(
        &mut self,
        tids: &[i64],
        limit: usize,
        complete_only: bool,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        // A tid filter spans the whole history; a row limit would cut off
        // requested transactions older than the newest rows.
        let limit = if tids.is_empty() { limit } else { 0 };
        let mut transactions = Transaction::list(conn, limit, complete_only)?;
        if !tids.is_empty() {
            transactions.retain(|t| t.id.is_some_and(|tid| tids.contains(&tid)));
        }

        // Neighbouring fingerprints must chain: the older transaction's
        // end version is the newer one's begin version, otherwise the
        // rpmdb was altered outside tracked transactions.
        for i in 1..transactions.len() {
            let newer_beg = transactions[i - 1].beg_rpmdb_version.clone();
            let older_end = transactions[i].end_rpmdb_version.clone();
            if older_end.as_deref() != Some(newer_beg.as_str()) {
                transactions[i - 1].altered_lt_rpmdb = true;
                transactions[i].altered_gt_rpmdb = true;
            }
        }

        for trans in &mut transactions {
            if let Some(tid) = trans.id {
                trans.is_output =
                    crate::db::models::output_exists(conn, tid, OutputKind::Stdout)?;
                trans.is_error = crate::db::models::output_exists(conn, tid, OutputKind::Stderr)?;
            }
        }
        Ok(transactions)
    }

    /// The most recent transaction, if any.
    pub fn last(&mut self, complete_only: bool) -> Result<Option<Transaction>> {
        Ok(self.trans_old(&[], 1, complete_only)?.into_iter().next())
    }

    /// Which transactions mention packages matching any of the patterns.
    ///
    /// Each pattern first tries the name match; only when that yields
    /// nothing does the composite-form fallback run.
    pub fn search(&mut self, patterns: &[&str]) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut tids = Vec::new();
        for pattern in patterns {
            let mut pids = Package::search_by_name(conn, pattern)?;
            if pids.is_empty() {
                pids = Package::search_by_spec_forms(conn, pattern)?;
            }
            for pid in pids {
                for pdid in PackageData::ids_for_pid(conn, pid)? {
                    let mut stmt =
                        conn.prepare("SELECT T_ID FROM TRANS_DATA WHERE PD_ID = ?1")?;
                    let found = stmt
                        .query_map([pdid], |row| row.get(0))?
                        .collect::<std::result::Result<Vec<i64>, _>>()?;
                    tids.extend(found);
                }
            }
        }
        tids.sort_unstable();
        tids.dedup();
        Ok(tids)
    }

    // ------------------------------------------------------------------
    // Per-package transaction recording

    /// Record that a transaction started acting on a package. Always
    /// opens a fresh package-data row: each event carries its own
    /// provenance even for a pid seen before. Group-motivated packages
    /// get linked to the group snapshot of the same transaction.
    pub fn trans_data_beg(
        &mut self,
        tid: i64,
        pid: i64,
        reason: Reason,
        state: Action,
        obsoleting: bool,
    ) -> Result<()> {
        let conn = self.conn()?;
        let tgid = if reason == Reason::Group {
            resolve_group_origin(conn, pid, tid)?
        } else {
            None
        };
        let pdid = PackageData::insert_placeholder(conn, pid)?;
        let state_id =
            intern::get_or_create(conn, intern::InternTable::StateType, state.as_str())?;
        let mut record = TransData::new(tid, pdid, reason, state_id, obsoleting);
        record.tgid = tgid;
        record.insert(conn)?;
        Ok(())
    }

    /// Mark the package's record in this transaction done with its final
    /// state, and link it to the record it supersedes. Actions that begin
    /// a provenance chain get no predecessor link.
    pub fn trans_data_pid_end(&mut self, pid: i64, tid: i64, state: Action) -> Result<()> {
        let conn = self.conn()?;
        let Some(mut record) = TransData::find_latest_by_pid_tid(conn, pid, tid)? else {
            warn!("no transaction record for pid {pid} in transaction {tid}");
            return Err(Error::MissingTransRecord { pid, tid });
        };
        let state_id =
            intern::get_or_create(conn, intern::InternTable::StateType, state.as_str())?;
        record.finish(conn, state_id)?;

        if state.starts_chain() {
            return Ok(());
        }
        let Some(name) = Package::name_by_id(conn, pid)? else {
            return Ok(());
        };
        // The superseded record is the latest one for a same-named
        // package in an earlier transaction. For an Update the
        // predecessor is the replaced build, so the package's own pid is
        // excluded.
        let original: Option<i64> = if state == Action::Update {
            conn.query_row(
                "SELECT TD_ID FROM TRANS_DATA
                 JOIN PACKAGE_DATA USING (PD_ID)
                 JOIN PACKAGE USING (P_ID)
                 WHERE name = ?1 AND T_ID < ?2 AND P_ID != ?3
                 ORDER BY TD_ID DESC LIMIT 1",
                params![name, tid, pid],
                |row| row.get(0),
            )
            .optional()?
        } else {
            conn.query_row(
                "SELECT TD_ID FROM TRANS_DATA
                 JOIN PACKAGE_DATA USING (PD_ID)
                 JOIN PACKAGE USING (P_ID)
                 WHERE name = ?1 AND T_ID < ?2
                 ORDER BY TD_ID DESC LIMIT 1",
                params![name, tid],
                |row| row.get(0),
            )
            .optional()?
        };
        if let (Some(tdid), Some(original)) = (record.id, original) {
            TransData::set_original(conn, tdid, original)?;
        }
        Ok(())
    }

    /// Raw per-package records of a transaction, insertion order.
    pub fn trans_data(&mut self, tid: i64) -> Result<Vec<TransData>> {
        TransData::find_by_tid(self.conn()?, tid)
    }

    /// Every package touched by a transaction, with its resolved action.
    pub fn get_packages_by_tid(&mut self, tid: i64) -> Result<Vec<TransactionPackage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT P_ID, name, epoch, version, release, arch, checksum_data, checksum_type,
                    PACKAGE.type, STATE_TYPE.description, TRANS_DATA.done, TRANS_DATA.obsoleting,
                    TRANS_DATA.reason
             FROM TRANS_DATA
             JOIN PACKAGE_DATA USING (PD_ID)
             JOIN PACKAGE USING (P_ID)
             JOIN STATE_TYPE ON TRANS_DATA.state = STATE_TYPE.state
             WHERE T_ID = ?1 ORDER BY TD_ID",
        )?;
        let rows = stmt.query_map([tid], |row| {
            let package = Package::from_row(row)?;
            let state: String = row.get(9)?;
            let done: i64 = row.get(10)?;
            let obsoleting: i64 = row.get(11)?;
            let reason: i64 = row.get(12)?;
            Ok((package, state, done != 0, obsoleting != 0, reason))
        })?;

        let mut packages = Vec::new();
        for row in rows {
            let (package, state, done, obsoleting, reason) = row?;
            let state = state
                .parse::<Action>()
                .map_err(Error::ParseError)?;
            packages.push(TransactionPackage {
                package,
                state,
                reason: Reason::from_i64(reason),
                done,
                obsoleting,
            });
        }
        Ok(packages)
    }

    // ------------------------------------------------------------------
    // Merge

    /// Consolidate a set of transactions into one logical transaction and
    /// the net per-package view. The returned transaction spans the whole
    /// window and lists every merged tid.
    pub fn merge(&mut self, tids: &[i64]) -> Result<Option<(Transaction, MergedView)>> {
        let mut transactions = self.trans_old(tids, 0, false)?;
        transactions.sort_by_key(|t| t.id);
        let Some(mut window) = transactions.first().cloned() else {
            return Ok(None);
        };
        for trans in &transactions[1..] {
            window.absorb(trans);
        }

        let mut records = Vec::new();
        for trans in &transactions {
            if let Some(tid) = trans.id {
                for tp in self.get_packages_by_tid(tid)? {
                    let mut record =
                        MergeRecord::new(tp.package.nevra(), tp.state, tp.reason);
                    record.obsoleting = tp.obsoleting;
                    records.push(record);
                }
            }
        }
        let merged = merge_actions(records);
        Ok(Some((window, MergedView::classify(merged))))
    }

    // ------------------------------------------------------------------
    // Groups & environments

    /// Store a group, updating in place when its name_id is known.
    pub fn add_group(&mut self, group: &mut Group) -> Result<i64> {
        group.store(self.conn()?)
    }

    pub fn get_group(&mut self, name_id: &str) -> Result<Option<Group>> {
        Group::find_by_name_id(self.conn()?, name_id)
    }

    pub fn groups_by_pattern(&mut self, pattern: &str) -> Result<Vec<Group>> {
        Group::find_by_pattern(self.conn()?, pattern)
    }

    /// Mark a set of groups installed.
    pub fn groups_commit(&mut self, name_ids: &[String]) -> Result<()> {
        let conn = self.conn()?;
        for name_id in name_ids {
            Group::commit(conn, name_id)?;
        }
        Ok(())
    }

    pub fn add_env(&mut self, env: &mut Environment) -> Result<i64> {
        env.store(self.conn()?)
    }

    pub fn get_env(&mut self, name_id: &str) -> Result<Option<Environment>> {
        Environment::find_by_name_id(self.conn()?, name_id)
    }

    pub fn envs_by_pattern(&mut self, pattern: &str) -> Result<Vec<Environment>> {
        Environment::find_by_pattern(self.conn()?, pattern)
    }

    /// Snapshot the groups touched by a transaction into its ledger,
    /// installs and removals separately.
    pub fn log_group_trans(
        &mut self,
        tid: i64,
        installing: &[Group],
        removing: &[Group],
    ) -> Result<()> {
        let conn = self.conn()?;
        for group in installing {
            log_group_trans(conn, tid, group, true)?;
        }
        for group in removing {
            log_group_trans(conn, tid, group, false)?;
        }
        Ok(())
    }

    /// Whether a package may be removed together with its group.
    pub fn removable_with_group(&mut self, pkg_name: &str) -> Result<bool> {
        removable_with_group(self.conn()?, pkg_name)
    }

    // ------------------------------------------------------------------

    fn latest_repo_name(&mut self, pid: i64) -> Result<Option<String>> {
        let conn = self.conn()?;
        let name = conn
            .query_row(
                "SELECT REPO.name FROM PACKAGE_DATA
                 JOIN REPO USING (R_ID)
                 WHERE P_ID = ?1 ORDER BY PD_ID DESC LIMIT 1",
                [pid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    fn action_for_state(&mut self, state_id: i64) -> Result<Option<Action>> {
        let conn = self.conn()?;
        let Some(description) =
            intern::description(conn, intern::InternTable::StateType, state_id)?
        else {
            return Ok(None);
        };
        Ok(description.parse::<Action>().ok())
    }
}
