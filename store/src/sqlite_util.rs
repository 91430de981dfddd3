//! Secure-filesystem helpers for the SQLite store.

use std::fs::OpenOptions;
use std::path::Path;

use rusqlite::Connection;

use crate::StoreError;

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io {
        action,
        path,
        source,
    }
}

/// Open a SQLite database at `path` with secure directory and file permissions.
///
/// 1. Creates the parent directory if it doesn't exist
/// 2. Tightens directory permissions (Unix: 0o700, owner-only)
/// 3. Creates the DB file with secure permissions (Unix: 0o600)
/// 4. Opens the SQLite connection
pub(crate) fn open_secure_db(path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_secure_dir(parent)?;
    }
    ensure_secure_db_files(path)?;

    Ok(Connection::open(path)?)
}

/// Create `path` if missing and, when we own it, restrict it to the owner.
pub(crate) fn ensure_secure_dir(path: &Path) -> Result<(), StoreError> {
    std::fs::create_dir_all(path).map_err(io_error("Failed to create directory", path))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};
        let metadata = std::fs::metadata(path)
            .map_err(io_error("Failed to read directory metadata", path))?;

        let our_uid = unsafe { libc::getuid() };
        if metadata.uid() != our_uid {
            return Ok(());
        }

        let current_mode = metadata.permissions().mode() & 0o777;
        if current_mode & 0o077 != 0 {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
                .map_err(io_error("Failed to set directory permissions", path))?;
        }
    }
    Ok(())
}

/// Ensure the database file and its WAL/SHM sidecars are owner-only.
pub(crate) fn ensure_secure_db_files(path: &Path) -> Result<(), StoreError> {
    if !path.exists() {
        let mut options = OpenOptions::new();
        options.create(true).truncate(false).read(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options
            .open(path)
            .map_err(io_error("Failed to create database file", path))?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(io_error("Failed to set database permissions", path))?;
        for suffix in ["-wal", "-shm"] {
            let sidecar = sqlite_sidecar_path(path, suffix);
            if sidecar.exists() {
                let _ = std::fs::set_permissions(&sidecar, std::fs::Permissions::from_mode(0o600));
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn sqlite_sidecar_path(path: &Path, suffix: &str) -> std::path::PathBuf {
    let file_name = path.file_name().map(|name| name.to_string_lossy());
    match file_name {
        Some(name) => path.with_file_name(format!("{name}{suffix}")),
        None => std::path::PathBuf::from(format!("{}{suffix}", path.display())),
    }
}
