//! Filesystem utilities for staged, crash-safe writes.
//!
//! Every file the store persists goes through [`write_atomic`]: the bytes land
//! in a uniquely named temp file, are synced, and only then renamed over the
//! destination. Readers therefore see either the old or the new contents.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, VaultError};

/// Suffix used for in-flight temp files.
pub const TEMP_SUFFIX: &str = "tmp";

/// Nanosecond stamp used to make temp and staging names unique.
pub fn unique_stamp() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| VaultError::Storage(format!("System time error: {}", e)))?
        .as_nanos())
}

/// Rename a file into place, with fallback for platforms where rename fails if target exists.
///
/// On some platforms (notably Windows), `fs::rename` fails if the destination already exists.
/// The fallback removes the destination and retries; if that also fails the temp
/// file is cleaned up.
pub fn rename_with_fallback(temp_path: &Path, destination: &Path) -> io::Result<()> {
    if let Err(initial_err) = fs::rename(temp_path, destination) {
        let _ = fs::remove_file(destination);
        fs::rename(temp_path, destination).map_err(|retry_err| {
            let _ = fs::remove_file(temp_path);
            io::Error::new(
                retry_err.kind(),
                format!(
                    "Atomic rename failed (initial: {}, retry: {})",
                    initial_err, retry_err
                ),
            )
        })?;
    }
    Ok(())
}

/// Write `data` to `path` atomically (temp file, fsync, rename).
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| VaultError::Storage(format!("Invalid path: {}", path.display())))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| VaultError::Storage(format!("Invalid filename: {}", path.display())))?;
    let temp_path = parent.join(format!("{}.{}.{}", filename, unique_stamp()?, TEMP_SUFFIX));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|e| VaultError::Storage(format!("Temp file create failed: {}", e)))?;
    file.write_all(data)
        .map_err(|e| VaultError::Storage(format!("Temp file write failed: {}", e)))?;
    file.sync_all()
        .map_err(|e| VaultError::Storage(format!("Temp file sync failed: {}", e)))?;
    drop(file);
    set_restrictive_permissions(&temp_path)?;

    rename_with_fallback(&temp_path, path)
        .map_err(|e| VaultError::Storage(format!("Atomic rename failed: {}", e)))?;
    Ok(())
}

/// Create a directory (and parents) readable only by the owner.
pub fn create_private_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        VaultError::Storage(format!(
            "Failed to create directory {}: {}",
            path.display(),
            e
        ))
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Remove a directory tree, treating "already gone" as success.
pub fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Replace the directory at `live` with `staged`.
///
/// The live directory is first moved aside to `retired`, the staged one is
/// renamed into place, and only then is `retired` deleted. If the second rename
/// fails the retired directory is moved back.
pub fn publish_directory(staged: &Path, live: &Path, retired: &Path) -> Result<()> {
    remove_dir_if_exists(retired)?;
    if live.exists() {
        fs::rename(live, retired).map_err(|e| {
            VaultError::Storage(format!("Failed to retire {}: {}", live.display(), e))
        })?;
    }
    if let Err(err) = fs::rename(staged, live) {
        if retired.exists() {
            let _ = fs::rename(retired, live);
        }
        return Err(VaultError::Storage(format!(
            "Failed to publish {}: {}",
            staged.display(),
            err
        )));
    }
    remove_dir_if_exists(retired)?;
    Ok(())
}

/// True if `path` names an in-flight temp file written by [`write_atomic`].
pub fn is_temp_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(TEMP_SUFFIX)
}

/// Sibling path of `path` with `suffix` appended to its final component.
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn set_restrictive_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_rename_overwrites_existing() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join("temp.txt");
        let dest = dir.path().join("dest.txt");

        File::create(&dest).unwrap().write_all(b"old").unwrap();
        File::create(&temp).unwrap().write_all(b"new").unwrap();

        rename_with_fallback(&temp, &dest).unwrap();

        assert!(!temp.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("index.enc");

        write_atomic(&dest, b"first").unwrap();
        write_atomic(&dest, b"second").unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"second");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| is_temp_file(&e.path()))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_sets_owner_only_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let dest = dir.path().join("credential.hash");
        write_atomic(&dest, b"abc").unwrap();

        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_publish_directory_replaces_live() {
        let dir = tempdir().unwrap();
        let live = dir.path().join("ns");
        let staged = dir.path().join("ns.staging");
        let retired = dir.path().join("ns.retired");

        fs::create_dir(&live).unwrap();
        fs::write(live.join("marker"), b"old").unwrap();
        fs::create_dir(&staged).unwrap();
        fs::write(staged.join("marker"), b"new").unwrap();

        publish_directory(&staged, &live, &retired).unwrap();

        assert_eq!(fs::read(live.join("marker")).unwrap(), b"new");
        assert!(!staged.exists());
        assert!(!retired.exists());
    }

    #[test]
    fn test_remove_helpers_tolerate_missing() {
        let dir = tempdir().unwrap();
        assert!(!remove_file_if_exists(&dir.path().join("nope")).unwrap());
        assert!(!remove_dir_if_exists(&dir.path().join("nope")).unwrap());
    }

    #[test]
    fn test_sibling_with_suffix() {
        let path = Path::new("/var/lib/vault/abc123");
        assert_eq!(
            sibling_with_suffix(path, ".retired"),
            PathBuf::from("/var/lib/vault/abc123.retired")
        );
    }
}
