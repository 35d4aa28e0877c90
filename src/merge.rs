// src/merge.rs

//! Transaction merge engine
//!
//! Consolidates the package actions of a chronological run of transactions
//! into one logical transaction, so "undo last N" and consolidated history
//! views see the net effect: an Install followed by an Erase disappears, an
//! Install followed by an Update becomes an Install of the newer build.
//!
//! The engine keeps one bucket per package name holding a `(first, second)`
//! pair of action records. Records are fed in chronological order; which
//! operand arrived first matters, the rules are deliberately asymmetric.
//! The resulting labels are a display contract and must not be reworded.

use crate::db::models::{Action, Reason};
use crate::nevra::Nevra;
use std::cmp::Ordering;
use std::collections::HashMap;

/// One package action inside a merge window.
#[derive(Debug, Clone)]
pub struct MergeRecord {
    pub nevra: Nevra,
    pub state: Action,
    pub reason: Reason,
    pub obsoleting: bool,
}

impl MergeRecord {
    pub fn new(nevra: Nevra, state: Action, reason: Reason) -> Self {
        Self {
            nevra,
            state,
            reason,
            obsoleting: false,
        }
    }
}

/// The merged window classified for display: what ends up installed by
/// user intent, what as a dependency, and what leaves the system.
#[derive(Debug, Default)]
pub struct MergedView {
    pub installs: Vec<MergeRecord>,
    pub depend_installs: Vec<MergeRecord>,
    pub removes: Vec<MergeRecord>,
}

impl MergedView {
    pub fn classify(records: Vec<MergeRecord>) -> Self {
        let mut view = MergedView::default();
        for record in records {
            if record.state.is_erase() {
                view.removes.push(record);
            } else if record.state == Action::DepInstall || record.reason.is_dep() {
                view.depend_installs.push(record);
            } else {
                view.installs.push(record);
            }
        }
        view
    }
}

/// Per-name bucket: `first` is the consolidated older side, `second` the
/// newer side of an update/downgrade pair when one is in flight.
struct Bucket {
    first: MergeRecord,
    second: Option<MergeRecord>,
}

/// Merge a chronological stream of action records into their net effect.
pub fn merge_actions<I>(records: I) -> Vec<MergeRecord>
where
    I: IntoIterator<Item = MergeRecord>,
{
    let mut buckets: HashMap<String, Bucket> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for record in records {
        let name = record.nevra.name.clone();
        match buckets.get_mut(&name) {
            None => {
                order.push(name.clone());
                buckets.insert(
                    name,
                    Bucket {
                        first: record,
                        second: None,
                    },
                );
            }
            Some(bucket) => {
                if merge_into(bucket, record) == BucketFate::Dropped {
                    buckets.remove(&name);
                }
            }
        }
    }

    let mut merged = Vec::new();
    for name in order {
        if let Some(bucket) = buckets.remove(&name) {
            merged.push(bucket.first);
            if let Some(second) = bucket.second {
                merged.push(second);
            }
        }
    }
    merged
}

#[derive(PartialEq)]
enum BucketFate {
    Kept,
    Dropped,
}

fn merge_into(bucket: &mut Bucket, incoming: MergeRecord) -> BucketFate {
    match bucket.first.state {
        // The package left the system earlier in the window.
        Action::Erase | Action::Obsoleted => {
            handle_erased(bucket, incoming);
            BucketFate::Kept
        }

        // A reinstall carries no net information; the incoming record
        // speaks for the window from here on.
        Action::Reinstall => {
            bucket.first = incoming;
            bucket.second = None;
            BucketFate::Kept
        }

        Action::Install | Action::TrueInstall | Action::DepInstall => {
            handle_installed(bucket, incoming)
        }

        Action::Update
        | Action::Updated
        | Action::Downgrade
        | Action::Downgraded
        | Action::Obsoleting => {
            handle_altered(bucket, incoming);
            BucketFate::Kept
        }

        // Upgrade/Upgraded only appear as merge output, never as input;
        // an incoming record cannot refine them.
        Action::Upgrade | Action::Upgraded => BucketFate::Kept,
    }
}

/// The bucket holds an Erase/Obsoleted record.
fn handle_erased(bucket: &mut Bucket, incoming: MergeRecord) {
    match incoming.state {
        // Erase then install again nets to an upgrade, downgrade or
        // reinstall depending on the versions.
        Action::Install | Action::TrueInstall | Action::DepInstall => {
            reconcile_versions(bucket, incoming);
        }
        // The replacement build arrived by obsoleting another package;
        // reinstall-equivalent, the incoming record takes over.
        Action::Obsoleting => {
            bucket.first = incoming;
            bucket.second = None;
        }
        // Anything else after an erase means the earlier transaction was
        // compromised; recover by keeping only the incoming record.
        _ => {
            bucket.first = incoming;
            bucket.second = None;
        }
    }
}

/// The bucket holds an Install/True-Install/Dep-Install record.
fn handle_installed(bucket: &mut Bucket, incoming: MergeRecord) -> BucketFate {
    match incoming.state {
        // Installed and erased within the window: no net effect at all.
        Action::Erase | Action::Obsoleted => BucketFate::Dropped,
        // The freshly installed package was replaced; the install label
        // moves onto the newer build.
        Action::Update | Action::Downgrade => {
            let label = bucket.first.state;
            bucket.first = incoming;
            bucket.first.state = label;
            bucket.second = None;
            BucketFate::Kept
        }
        _ => BucketFate::Kept,
    }
}

/// The bucket holds an Update/Updated/Downgrade/Downgraded/Obsoleting
/// record, possibly as a half-built pair.
fn handle_altered(bucket: &mut Bucket, incoming: MergeRecord) {
    match incoming.state {
        // The altered package was erased; the erase becomes the bucket's
        // verdict for the older side.
        Action::Erase | Action::Obsoleted => {
            bucket.first.state = incoming.state;
        }

        // Old-side record of an update/downgrade pair.
        Action::Updated | Action::Downgraded => {
            if bucket.second.is_none() {
                // Still inside the same transaction; restore the
                // (older, newer) pair order if it arrived reversed.
                if matches!(bucket.first.state, Action::Update | Action::Downgrade) {
                    let newer = std::mem::replace(&mut bucket.first, incoming);
                    bucket.second = Some(newer);
                }
            } else if bucket.first.state == Action::Obsoleting {
                // An obsoleting package was itself updated; the label
                // follows the new build.
                let mut next = incoming;
                next.state = Action::Obsoleting;
                bucket.first = next;
                bucket.second = None;
            }
            // Otherwise this is the old-side echo of a later transaction,
            // already represented by the pair.
        }

        // New-side record: complete the pair, or reconcile against a pair
        // that is already complete.
        Action::Update | Action::Downgrade => {
            if bucket.second.is_none() {
                bucket.second = Some(incoming);
            } else {
                reconcile_versions(bucket, incoming);
            }
        }

        _ => {}
    }
}

/// Two concrete builds must be reconciled into one net action. The newer
/// build survives, labeled by direction; identical versions collapse to a
/// reinstall.
fn reconcile_versions(bucket: &mut Bucket, incoming: MergeRecord) {
    match bucket.first.nevra.cmp_evr(&incoming.nevra) {
        Ordering::Less => {
            let mut newer = incoming;
            newer.state = Action::Upgrade;
            bucket.first = newer;
            bucket.second = None;
        }
        Ordering::Greater => {
            let mut newer = incoming;
            newer.state = Action::Downgrade;
            bucket.first = newer;
            bucket.second = None;
        }
        Ordering::Equal => {
            let mut same = incoming;
            same.state = Action::Reinstall;
            bucket.first = same;
            bucket.second = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(nevra: &str, state: Action) -> MergeRecord {
        MergeRecord::new(nevra.parse().unwrap(), state, Reason::User)
    }

    #[test]
    fn test_single_record_passes_through() {
        let merged = merge_actions([record("tour-4-6.noarch", Action::Install)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].state, Action::Install);
    }

    #[test]
    fn test_install_then_erase_nets_to_nothing() {
        let merged = merge_actions([
            record("tour-4-6.noarch", Action::Install),
            record("tour-4-6.noarch", Action::Erase),
        ]);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_install_then_update_keeps_install_label() {
        let merged = merge_actions([
            record("tour-1.0-1.noarch", Action::Install),
            record("tour-2.0-1.noarch", Action::Update),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].state, Action::Install);
        assert_eq!(merged[0].nevra.version, "2.0");
    }

    #[test]
    fn test_dep_install_label_is_preserved() {
        let merged = merge_actions([
            record("tour-1.0-1.noarch", Action::DepInstall),
            record("tour-2.0-1.noarch", Action::Update),
        ]);
        assert_eq!(merged[0].state, Action::DepInstall);
    }

    #[test]
    fn test_erase_then_newer_install_is_upgrade() {
        let merged = merge_actions([
            record("tour-1.0-1.noarch", Action::Erase),
            record("tour-2.0-1.noarch", Action::Install),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].state, Action::Upgrade);
        assert_eq!(merged[0].nevra.version, "2.0");
    }

    #[test]
    fn test_erase_then_older_install_is_downgrade() {
        let merged = merge_actions([
            record("tour-2.0-1.noarch", Action::Erase),
            record("tour-1.0-1.noarch", Action::Install),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].state, Action::Downgrade);
        assert_eq!(merged[0].nevra.version, "1.0");
    }

    #[test]
    fn test_erase_then_same_install_is_reinstall() {
        let merged = merge_actions([
            record("tour-1.0-1.noarch", Action::Erase),
            record("tour-1.0-1.noarch", Action::Install),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].state, Action::Reinstall);
    }

    #[test]
    fn test_release_bump_alone_is_still_reinstall() {
        // Only epoch and version participate in the ordering.
        let merged = merge_actions([
            record("tour-1.0-1.noarch", Action::Erase),
            record("tour-1.0-2.noarch", Action::Install),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].state, Action::Reinstall);
        assert_eq!(merged[0].nevra.release, "2");
    }

    #[test]
    fn test_epoch_outranks_version() {
        let merged = merge_actions([
            record("tour-9.0-1.noarch", Action::Erase),
            record("tour-1:1.0-1.noarch", Action::Install),
        ]);
        assert_eq!(merged[0].state, Action::Upgrade);
    }

    #[test]
    fn test_update_pair_stays_paired() {
        // One transaction recording both sides of an update.
        let merged = merge_actions([
            record("tour-2.0-1.noarch", Action::Update),
            record("tour-1.0-1.noarch", Action::Updated),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].state, Action::Updated);
        assert_eq!(merged[0].nevra.version, "1.0");
        assert_eq!(merged[1].state, Action::Update);
        assert_eq!(merged[1].nevra.version, "2.0");
    }

    #[test]
    fn test_chained_updates_reconcile_versions() {
        // 1.0 -> 2.0 -> 3.0 across two transactions.
        let merged = merge_actions([
            record("tour-1.0-1.noarch", Action::Updated),
            record("tour-2.0-1.noarch", Action::Update),
            record("tour-2.0-1.noarch", Action::Updated),
            record("tour-3.0-1.noarch", Action::Update),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].state, Action::Upgrade);
        assert_eq!(merged[0].nevra.version, "3.0");
    }

    #[test]
    fn test_updated_then_erase_transfers_state() {
        let mut records = vec![
            record("tour-1.0-1.noarch", Action::Updated),
            record("tour-1.0-1.noarch", Action::Erase),
        ];
        let merged = merge_actions(records.drain(..));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].state, Action::Erase);
    }

    #[test]
    fn test_reinstall_is_overridden_by_incoming() {
        let merged = merge_actions([
            record("tour-1.0-1.noarch", Action::Reinstall),
            record("tour-1.0-1.noarch", Action::Erase),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].state, Action::Erase);
    }

    #[test]
    fn test_obsoleting_label_follows_new_build() {
        let merged = merge_actions([
            record("tour-1.0-1.noarch", Action::Obsoleting),
            record("tour-2.0-1.noarch", Action::Update),
            record("tour-1.0-1.noarch", Action::Updated),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].state, Action::Obsoleting);
        assert_eq!(merged[0].nevra.version, "1.0");
    }

    #[test]
    fn test_independent_packages_keep_insertion_order() {
        let merged = merge_actions([
            record("alpha-1-1.noarch", Action::Install),
            record("beta-1-1.noarch", Action::Install),
            record("alpha-1-1.noarch", Action::Erase),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].nevra.name, "beta");
    }

    #[test]
    fn test_classify_merged_view() {
        let view = MergedView::classify(vec![
            record("alpha-1-1.noarch", Action::Install),
            MergeRecord::new("beta-1-1.noarch".parse().unwrap(), Action::Install, Reason::Dependency),
            record("gamma-1-1.noarch", Action::DepInstall),
            record("delta-1-1.noarch", Action::Erase),
        ]);
        assert_eq!(view.installs.len(), 1);
        assert_eq!(view.depend_installs.len(), 2);
        assert_eq!(view.removes.len(), 1);
    }
}
