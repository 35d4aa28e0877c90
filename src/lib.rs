// src/lib.rs

//! Package transaction history database
//!
//! An embedded SQLite-backed ledger of package install/update/erase
//! transactions, with reason provenance, altered-rpmdb detection, a
//! transaction merge engine for consolidated history views, and a
//! groups/environments ledger.
//!
//! # Architecture
//!
//! - One database file per system, opened lazily and held for the
//!   session ([`Swdb`])
//! - Append-only package identity; per-event provenance rows
//! - Closed reason and action enums; state labels interned for display
//! - History is best-effort: a storage fault never blocks the package
//!   operation being recorded

pub mod db;
mod error;
pub mod merge;
pub mod nevra;
mod swdb;

pub use db::models::{
    Action, Environment, Group, Package, PackageData, Reason, Repo, TransData, Transaction,
};
pub use error::{Error, Result};
pub use merge::{MergeRecord, MergedView, merge_actions};
pub use nevra::Nevra;
pub use swdb::{Provenance, Swdb, TransactionPackage};
