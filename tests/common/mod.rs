// tests/common/mod.rs

//! Shared helpers for the integration suites

use swdb::{Action, Nevra, Provenance, Reason, Swdb};
use tempfile::NamedTempFile;

/// Session over a throwaway database file; the file lives as long as the
/// returned handle.
pub fn open_db() -> (Swdb, NamedTempFile) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let file = NamedTempFile::new().expect("temp database file");
    let mut db = Swdb::new(file.path(), "26");
    db.open().expect("open history database");
    (db, file)
}

pub fn nevra(spec: &str) -> Nevra {
    spec.parse().expect("valid nevra")
}

/// Run one single-package transaction end to end and return `(pid, tid)`.
/// The package is created on first use and reused afterwards, like a
/// package manager would.
pub fn run_action(
    db: &mut Swdb,
    spec: &str,
    reason: Reason,
    action: Action,
    timestamp: i64,
    beg_fingerprint: &str,
    end_fingerprint: &str,
) -> (i64, i64) {
    let nevra = nevra(spec);
    let pid = db
        .pid_by_nevra(&nevra)
        .expect("pid lookup")
        .unwrap_or_else(|| {
            db.add_package(&nevra, "0123456789abcdef", "sha256", "rpm")
                .expect("add package")
        });
    let tid = db
        .trans_beg(
            timestamp,
            beg_fingerprint,
            &format!("{} {}", action.as_str().to_lowercase(), nevra.name),
            1000,
            "26",
        )
        .expect("begin transaction");
    db.trans_data_beg(tid, pid, reason, action, false)
        .expect("record begin");
    db.update_package_data(
        pid,
        tid,
        &Provenance {
            from_repo: "fedora".to_string(),
            installed_by: Some("1000".to_string()),
            ..Default::default()
        },
    )
    .expect("provenance");
    db.trans_data_pid_end(pid, tid, action).expect("record end");
    db.trans_end(tid, timestamp + 1, end_fingerprint, 0)
        .expect("end transaction");
    (pid, tid)
}

/// Chained-fingerprint convenience: transaction N ends where N+1 begins.
pub fn run_chained(
    db: &mut Swdb,
    spec: &str,
    reason: Reason,
    action: Action,
    step: i64,
) -> (i64, i64) {
    run_action(
        db,
        spec,
        reason,
        action,
        step * 100,
        &format!("fp-{step}"),
        &format!("fp-{}", step + 1),
    )
}
