//! On-disk layout of one user's history namespace.
//!
//! ```text
//! <root>/<namespace_id>/
//!     credential.hash          plaintext mismatch oracle
//!     index.enc                encrypted version index
//!     snapshots/<ts>.enc       one encrypted snapshot per index entry
//! <root>/<namespace_id>.staging-<nanos>/   in-flight migration
//! <root>/<namespace_id>.retired/           pre-migration copy awaiting removal
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::crypto::namespace_id;
use crate::error::Result;
use crate::fs::{is_temp_file, remove_dir_if_exists, sibling_with_suffix};

const HASH_RECORD: &str = "credential.hash";
const INDEX_FILE: &str = "index.enc";
const SNAPSHOT_DIR: &str = "snapshots";
const SNAPSHOT_EXT: &str = "enc";
const RETIRED_SUFFIX: &str = ".retired";
const STAGING_MARKER: &str = ".staging-";

#[derive(Debug, Clone)]
pub(crate) struct Layout {
    root: PathBuf,
    namespace: String,
    dir: PathBuf,
}

impl Layout {
    pub(crate) fn for_user(root: &Path, username: &str) -> Self {
        let namespace = namespace_id(username);
        Self {
            root: root.to_path_buf(),
            dir: root.join(&namespace),
            namespace,
        }
    }

    /// Same file structure rooted at another directory (used for staging).
    pub(crate) fn relocated(&self, dir: PathBuf) -> Self {
        Self {
            root: self.root.clone(),
            namespace: self.namespace.clone(),
            dir,
        }
    }

    pub(crate) fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn hash_record(&self) -> PathBuf {
        self.dir.join(HASH_RECORD)
    }

    pub(crate) fn index(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub(crate) fn snapshots_dir(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_DIR)
    }

    pub(crate) fn snapshot(&self, timestamp: i64) -> PathBuf {
        self.snapshots_dir()
            .join(format!("{}.{}", timestamp, SNAPSHOT_EXT))
    }

    pub(crate) fn retired(&self) -> PathBuf {
        sibling_with_suffix(&self.dir, RETIRED_SUFFIX)
    }

    pub(crate) fn staging(&self, stamp: u128) -> PathBuf {
        sibling_with_suffix(&self.dir, &format!("{}{}", STAGING_MARKER, stamp))
    }

    /// Timestamps of every snapshot file on disk, sorted ascending.
    pub(crate) fn snapshot_timestamps(&self) -> Result<Vec<i64>> {
        let dir = self.snapshots_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut timestamps = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXT) {
                continue;
            }
            match path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<i64>().ok())
            {
                Some(ts) => timestamps.push(ts),
                None => warn!(path = %path.display(), "Ignoring unrecognized file in snapshot directory"),
            }
        }
        timestamps.sort_unstable();
        Ok(timestamps)
    }

    /// Leftover temp files from interrupted atomic writes.
    pub(crate) fn stale_temp_files(&self) -> Result<Vec<PathBuf>> {
        let mut stale = Vec::new();
        for dir in [self.dir.clone(), self.snapshots_dir()] {
            if !dir.exists() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_file() && is_temp_file(&path) {
                    stale.push(path);
                }
            }
        }
        Ok(stale)
    }

    /// Bring the namespace back to a consistent state after an interrupted migration.
    ///
    /// - staging directories are discarded (the migration never published)
    /// - a retired directory with no live one is restored
    /// - a retired directory next to a live one is removed
    pub(crate) fn recover(&self) -> Result<()> {
        if !self.root.exists() {
            return Ok(());
        }

        let staging_prefix = format!("{}{}", self.namespace, STAGING_MARKER);
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&staging_prefix) {
                warn!(namespace = %self.namespace, "Discarding unpublished migration staging directory");
                remove_dir_if_exists(&entry.path())?;
            }
        }

        let retired = self.retired();
        if retired.exists() {
            if self.dir.exists() {
                remove_dir_if_exists(&retired)?;
            } else {
                warn!(namespace = %self.namespace, "Restoring history from interrupted migration");
                fs::rename(&retired, &self.dir)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_hide_username() {
        let layout = Layout::for_user(Path::new("/vault"), "alice");
        assert!(!layout.dir().to_string_lossy().contains("alice"));
        assert_eq!(layout.snapshot(100).file_name().unwrap(), "100.enc");
        assert!(layout.retired().to_string_lossy().ends_with(".retired"));
    }

    #[test]
    fn test_snapshot_timestamps_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        let layout = Layout::for_user(dir.path(), "alice");
        fs::create_dir_all(layout.snapshots_dir()).unwrap();
        for name in ["200.enc", "100.enc", "-5.enc", "notes.txt", "300.enc.123.tmp"] {
            fs::write(layout.snapshots_dir().join(name), b"x").unwrap();
        }

        assert_eq!(layout.snapshot_timestamps().unwrap(), vec![-5, 100, 200]);
        assert_eq!(layout.stale_temp_files().unwrap().len(), 1);
    }

    #[test]
    fn test_recover_restores_retired_when_live_missing() {
        let dir = tempdir().unwrap();
        let layout = Layout::for_user(dir.path(), "alice");
        fs::create_dir_all(layout.retired()).unwrap();
        fs::write(layout.retired().join(HASH_RECORD), b"old").unwrap();
        let staging = layout.staging(42);
        fs::create_dir_all(&staging).unwrap();

        layout.recover().unwrap();

        assert_eq!(fs::read(layout.hash_record()).unwrap(), b"old");
        assert!(!layout.retired().exists());
        assert!(!staging.exists());
    }

    #[test]
    fn test_recover_drops_retired_when_live_present() {
        let dir = tempdir().unwrap();
        let layout = Layout::for_user(dir.path(), "alice");
        fs::create_dir_all(layout.dir()).unwrap();
        fs::write(layout.hash_record(), b"new").unwrap();
        fs::create_dir_all(layout.retired()).unwrap();

        layout.recover().unwrap();

        assert_eq!(fs::read(layout.hash_record()).unwrap(), b"new");
        assert!(!layout.retired().exists());
    }

    #[test]
    fn test_recover_leaves_other_users_alone() {
        let dir = tempdir().unwrap();
        let alice = Layout::for_user(dir.path(), "alice");
        let bob = Layout::for_user(dir.path(), "bob");
        let bob_staging = bob.staging(7);
        fs::create_dir_all(&bob_staging).unwrap();

        alice.recover().unwrap();

        assert!(bob_staging.exists());
    }
}
