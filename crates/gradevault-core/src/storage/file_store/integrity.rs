use std::collections::BTreeSet;

use super::layout::Layout;
use crate::error::Result;
use crate::storage::types::{IntegrityReport, VersionIndexEntry};

/// Compare an already-decrypted index against the snapshot files on disk.
pub(super) fn inspect(layout: &Layout, index: &[VersionIndexEntry]) -> Result<IntegrityReport> {
    let indexed: BTreeSet<i64> = index.iter().map(|entry| entry.timestamp).collect();
    let on_disk: BTreeSet<i64> = layout.snapshot_timestamps()?.into_iter().collect();

    Ok(IntegrityReport {
        missing_snapshots: indexed.difference(&on_disk).copied().collect(),
        orphaned_snapshots: on_disk.difference(&indexed).copied().collect(),
        indexed: index.len(),
    })
}
