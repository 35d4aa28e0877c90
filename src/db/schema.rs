// src/db/schema.rs

//! Database schema for the transaction history store
//!
//! The schema is a fixed set of CREATE statements applied in one pass, with
//! a schema_version stamp so a future revision can evolve it in place.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info, warn};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Every table and index of the store, one statement each so creation
/// failures can be counted individually.
const CREATE_STATEMENTS: &[&str] = &[
    "CREATE TABLE PACKAGE (
        P_ID INTEGER PRIMARY KEY,
        name TEXT,
        epoch INTEGER,
        version TEXT,
        release TEXT,
        arch TEXT,
        checksum_data TEXT,
        checksum_type TEXT,
        type INTEGER
    )",
    "CREATE TABLE PACKAGE_DATA (
        PD_ID INTEGER PRIMARY KEY,
        P_ID INTEGER,
        R_ID INTEGER,
        from_repo_revision TEXT,
        from_repo_timestamp TEXT,
        installed_by TEXT,
        changed_by TEXT,
        installonly TEXT,
        origin_url TEXT
    )",
    "CREATE TABLE REPO (
        R_ID INTEGER PRIMARY KEY,
        name TEXT,
        last_synced TEXT,
        is_expired TEXT
    )",
    "CREATE TABLE TRANS (
        T_ID INTEGER PRIMARY KEY,
        beg_timestamp INTEGER,
        end_timestamp INTEGER,
        beg_rpmdb_version TEXT,
        end_rpmdb_version TEXT,
        cmdline TEXT,
        loginuid INTEGER,
        releasever TEXT,
        return_code INTEGER
    )",
    "CREATE TABLE TRANS_DATA (
        TD_ID INTEGER PRIMARY KEY,
        T_ID INTEGER,
        PD_ID INTEGER,
        TG_ID INTEGER,
        done INTEGER,
        ORIGINAL_TD_ID INTEGER,
        reason INTEGER,
        state INTEGER,
        obsoleting INTEGER
    )",
    "CREATE TABLE TRANS_WITH (
        TW_ID INTEGER PRIMARY KEY,
        T_ID INTEGER,
        P_ID INTEGER
    )",
    "CREATE TABLE OUTPUT (
        O_ID INTEGER PRIMARY KEY,
        T_ID INTEGER,
        msg TEXT,
        type INTEGER
    )",
    "CREATE TABLE STATE_TYPE (state INTEGER PRIMARY KEY, description TEXT)",
    "CREATE TABLE OUTPUT_TYPE (type INTEGER PRIMARY KEY, description TEXT)",
    "CREATE TABLE PACKAGE_TYPE (type INTEGER PRIMARY KEY, description TEXT)",
    "CREATE TABLE GROUPS (
        G_ID INTEGER PRIMARY KEY,
        name_id TEXT,
        name TEXT,
        ui_name TEXT,
        is_installed INTEGER,
        pkg_types INTEGER
    )",
    "CREATE TABLE TRANS_GROUP_DATA (
        TG_ID INTEGER PRIMARY KEY,
        T_ID INTEGER,
        G_ID INTEGER,
        name_id TEXT,
        name TEXT,
        ui_name TEXT,
        is_installed INTEGER,
        pkg_types INTEGER
    )",
    "CREATE TABLE GROUPS_PACKAGE (
        GP_ID INTEGER PRIMARY KEY,
        G_ID INTEGER,
        name TEXT
    )",
    "CREATE TABLE GROUPS_EXCLUDE (
        GE_ID INTEGER PRIMARY KEY,
        G_ID INTEGER,
        name TEXT
    )",
    "CREATE TABLE ENVIRONMENTS (
        E_ID INTEGER PRIMARY KEY,
        name_id TEXT,
        name TEXT,
        ui_name TEXT,
        pkg_types INTEGER,
        grp_types INTEGER
    )",
    "CREATE TABLE ENVIRONMENTS_GROUPS (
        EG_ID INTEGER PRIMARY KEY,
        E_ID INTEGER,
        G_ID INTEGER
    )",
    "CREATE TABLE ENVIRONMENTS_EXCLUDE (
        EE_ID INTEGER PRIMARY KEY,
        E_ID INTEGER,
        name TEXT
    )",
    "CREATE INDEX nevra ON PACKAGE (
        name || '-' || epoch || ':' || version || '-' || release || '.' || arch
    )",
    "CREATE INDEX nvra ON PACKAGE (
        name || '-' || version || '-' || release || '.' || arch
    )",
];

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply every CREATE statement, returning how many of them failed.
///
/// Partial creation is not rolled back; a nonzero count means the file must
/// be discarded rather than used.
pub fn create_tables(conn: &Connection) -> usize {
    let mut failed = 0;
    for statement in CREATE_STATEMENTS {
        if let Err(e) = conn.execute(statement, []) {
            warn!("schema statement failed: {e}");
            failed += 1;
        }
    }
    failed
}

/// Bring the database up to date, creating all tables on first use.
/// Safe to call repeatedly.
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version >= SCHEMA_VERSION {
        debug!("schema is up to date (version {current_version})");
        return Ok(());
    }

    info!("initializing schema at version {SCHEMA_VERSION}");
    let failed = create_tables(conn);
    if failed > 0 {
        return Err(Error::SchemaCreation(failed));
    }
    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}
