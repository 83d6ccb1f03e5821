//! Re-keying a namespace from one derived key to another.
//!
//! Everything is decrypted under the old key into zeroizing buffers, written
//! re-encrypted into a sibling staging directory, and then swapped in with
//! [`publish_directory`]. Until the swap completes the live namespace is
//! untouched; after a crash [`Layout::recover`] puts it back.

use std::collections::BTreeSet;
use std::fs;
use std::io;

use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::layout::Layout;
use super::{mismatch_on_decrypt, write_hash_record};
use crate::crypto::{CredentialHash, DerivedKey};
use crate::error::Result;
use crate::fs::{create_private_dir, publish_directory, remove_dir_if_exists, unique_stamp, write_atomic};
use crate::storage::encryption::{decrypt, encrypt, open_json, seal_json};
use crate::storage::types::VersionIndexEntry;

/// A snapshot file as it will be written into the staged namespace.
enum Carried {
    /// Decrypted under the old key; re-encrypted under the new one.
    Plain(Zeroizing<Vec<u8>>),
    /// An orphan the old key cannot open; copied byte for byte so integrity
    /// checks still report it afterwards.
    Raw(Vec<u8>),
}

struct PlainHistory {
    index: Vec<VersionIndexEntry>,
    snapshots: Vec<(i64, Carried)>,
}

fn read_plaintext(layout: &Layout, key: &DerivedKey) -> Result<PlainHistory> {
    let index: Vec<VersionIndexEntry> = match fs::read(layout.index()) {
        Ok(bytes) => open_json(key, &bytes).map_err(mismatch_on_decrypt)?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(err) => return Err(err.into()),
    };

    let indexed: BTreeSet<i64> = index.iter().map(|entry| entry.timestamp).collect();
    let mut snapshots = Vec::with_capacity(index.len());
    let mut dangling = 0usize;
    for entry in &index {
        match fs::read(layout.snapshot(entry.timestamp)) {
            Ok(bytes) => snapshots.push((
                entry.timestamp,
                Carried::Plain(decrypt(key, &bytes).map_err(mismatch_on_decrypt)?),
            )),
            Err(err) if err.kind() == io::ErrorKind::NotFound => dangling += 1,
            Err(err) => return Err(err.into()),
        }
    }

    let mut orphans = 0usize;
    for timestamp in layout.snapshot_timestamps()? {
        if indexed.contains(&timestamp) {
            continue;
        }
        orphans += 1;
        let bytes = fs::read(layout.snapshot(timestamp))?;
        let carried = match decrypt(key, &bytes) {
            Ok(plaintext) => Carried::Plain(plaintext),
            Err(_) => Carried::Raw(bytes),
        };
        snapshots.push((timestamp, carried));
    }

    if dangling > 0 || orphans > 0 {
        warn!(
            namespace = %layout.namespace(),
            dangling,
            orphans,
            "Carrying index inconsistencies over to the re-encrypted history"
        );
    }

    Ok(PlainHistory { index, snapshots })
}

fn stage(target: &Layout, hash: &CredentialHash, key: &DerivedKey, history: &PlainHistory) -> Result<()> {
    create_private_dir(target.dir())?;
    create_private_dir(&target.snapshots_dir())?;
    for (timestamp, carried) in &history.snapshots {
        let bytes = match carried {
            Carried::Plain(plaintext) => encrypt(key, plaintext)?,
            Carried::Raw(bytes) => bytes.clone(),
        };
        write_atomic(&target.snapshot(*timestamp), &bytes)?;
    }
    write_atomic(&target.index(), &seal_json(key, &history.index)?)?;
    // Hash record last: a staging directory without one was never complete.
    write_hash_record(target, hash)
}

/// Re-encrypt the namespace at `layout` and publish it. Returns the number
/// of index entries carried over. Dangling entries and orphaned files are
/// carried as they are; repairing them is left to the integrity check.
pub(super) fn rekey(
    layout: &Layout,
    old_key: &DerivedKey,
    new_hash: &CredentialHash,
    new_key: &DerivedKey,
) -> Result<usize> {
    let history = read_plaintext(layout, old_key)?;

    let staging = layout.staging(unique_stamp()?);
    let staged = layout.relocated(staging.clone());
    if let Err(err) = stage(&staged, new_hash, new_key, &history) {
        remove_dir_if_exists(&staging)?;
        return Err(err);
    }
    debug!(namespace = %layout.namespace(), versions = history.index.len(), "Staged re-encrypted history");

    publish_directory(&staging, layout.dir(), &layout.retired())?;
    Ok(history.index.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{credential_hash, derive_key, KdfParams};
    use crate::error::VaultError;
    use tempfile::tempdir;

    fn key(password: &str) -> DerivedKey {
        derive_key(password, "alice", "secret", &KdfParams::new(1_000).unwrap()).unwrap()
    }

    fn seed(layout: &Layout, key: &DerivedKey, timestamps: &[i64]) {
        create_private_dir(layout.dir()).unwrap();
        create_private_dir(&layout.snapshots_dir()).unwrap();
        let index: Vec<VersionIndexEntry> = timestamps
            .iter()
            .map(|ts| VersionIndexEntry {
                timestamp: *ts,
                course_overview: Vec::new(),
            })
            .collect();
        for ts in timestamps {
            write_atomic(&layout.snapshot(*ts), &encrypt(key, ts.to_string().as_bytes()).unwrap()).unwrap();
        }
        write_atomic(&layout.index(), &seal_json(key, &index).unwrap()).unwrap();
        write_hash_record(layout, &credential_hash("alice", "old", "secret")).unwrap();
    }

    #[test]
    fn test_rekey_moves_everything_to_new_key() {
        let dir = tempdir().unwrap();
        let layout = Layout::for_user(dir.path(), "alice");
        let (old_key, new_key) = (key("old"), key("new"));
        seed(&layout, &old_key, &[100, 200]);
        let new_hash = credential_hash("alice", "new", "secret");

        assert_eq!(rekey(&layout, &old_key, &new_hash, &new_key).unwrap(), 2);

        let snapshot = fs::read(layout.snapshot(200)).unwrap();
        assert_eq!(decrypt(&new_key, &snapshot).unwrap().as_slice(), b"200");
        assert!(matches!(decrypt(&old_key, &snapshot), Err(VaultError::DecryptionFailed)));
        let record = fs::read_to_string(layout.hash_record()).unwrap();
        assert_eq!(CredentialHash::from_hex(&record).unwrap(), new_hash);
        assert!(!layout.retired().exists());
    }

    #[test]
    fn test_rekey_with_wrong_key_leaves_history_untouched() {
        let dir = tempdir().unwrap();
        let layout = Layout::for_user(dir.path(), "alice");
        let old_key = key("old");
        seed(&layout, &old_key, &[100]);
        let before = fs::read(layout.index()).unwrap();

        let result = rekey(&layout, &key("wrong"), &credential_hash("alice", "new", "secret"), &key("new"));

        assert!(matches!(result, Err(VaultError::CredentialMismatch)));
        assert_eq!(fs::read(layout.index()).unwrap(), before);
    }

    #[test]
    fn test_rekey_keeps_dangling_entries() {
        let dir = tempdir().unwrap();
        let layout = Layout::for_user(dir.path(), "alice");
        let (old_key, new_key) = (key("old"), key("new"));
        seed(&layout, &old_key, &[100, 200]);
        fs::remove_file(layout.snapshot(100)).unwrap();

        let migrated = rekey(&layout, &old_key, &credential_hash("alice", "new", "secret"), &new_key).unwrap();

        assert_eq!(migrated, 2);
        let index: Vec<VersionIndexEntry> = open_json(&new_key, &fs::read(layout.index()).unwrap()).unwrap();
        let timestamps: Vec<i64> = index.iter().map(|entry| entry.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200]);
        assert!(!layout.snapshot(100).exists());
    }

    #[test]
    fn test_rekey_carries_orphaned_files() {
        let dir = tempdir().unwrap();
        let layout = Layout::for_user(dir.path(), "alice");
        let (old_key, new_key) = (key("old"), key("new"));
        seed(&layout, &old_key, &[100]);
        write_atomic(&layout.snapshot(300), &encrypt(&old_key, b"300").unwrap()).unwrap();
        fs::write(layout.snapshot(999), b"junk").unwrap();

        let migrated = rekey(&layout, &old_key, &credential_hash("alice", "new", "secret"), &new_key).unwrap();

        assert_eq!(migrated, 1);
        let orphan = fs::read(layout.snapshot(300)).unwrap();
        assert_eq!(decrypt(&new_key, &orphan).unwrap().as_slice(), b"300");
        assert_eq!(fs::read(layout.snapshot(999)).unwrap(), b"junk");
        let index: Vec<VersionIndexEntry> = open_json(&new_key, &fs::read(layout.index()).unwrap()).unwrap();
        assert_eq!(index.len(), 1);
    }
}
