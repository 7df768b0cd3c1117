//! File-level maintenance for `SQLite` databases: online backup, restore
//! from a backup, and removal of a database together with its journal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::error::SqlConnectError;

use super::connection::SqliteConnect;

/// Pause between backup steps, so writers on the source get a turn.
const BACKUP_STEP_PAUSE: Duration = Duration::from_millis(10);

/// Copy `src` to `dst` through the online backup API.
///
/// `pages_per_step` pages are copied per step; `-1` copies everything in a
/// single step.
///
/// # Errors
///
/// `BackupError` when `src` is not a readable database or `dst` cannot be
/// written.
pub fn online_backup(src: &Path, dst: &Path, pages_per_step: i32) -> Result<(), SqlConnectError> {
    let source = open_valid(src).map_err(|e| {
        SqlConnectError::BackupError(format!("invalid source {}: {e}", src.display()))
    })?;
    backup_connection(&source, dst, pages_per_step)
}

pub(super) fn backup_connection(
    source: &Connection,
    dst: &Path,
    pages_per_step: i32,
) -> Result<(), SqlConnectError> {
    let run = || -> Result<(), rusqlite::Error> {
        let mut target = Connection::open(dst)?;
        let backup = Backup::new(source, &mut target)?;
        backup.run_to_completion(pages_per_step, BACKUP_STEP_PAUSE, None)
    };
    run().map_err(|e| {
        SqlConnectError::BackupError(format!("backup to {} failed: {e}", dst.display()))
    })?;
    info!(dst = %dst.display(), "sqlite online backup finished");
    Ok(())
}

/// Replace the database at `target` with the contents of `backup`.
///
/// With `keep_damaged`, an existing `target` is renamed to `<target>.bad`
/// (replacing an older one) instead of being deleted.
///
/// # Errors
///
/// `BackupError` when `backup` is missing or not a valid database, when
/// `target` or its journal cannot be cleared, or when the copy fails.
pub fn recover_from_backup(
    backup: &Path,
    target: &Path,
    keep_damaged: bool,
) -> Result<(), SqlConnectError> {
    if !backup.is_file() {
        return Err(SqlConnectError::BackupError(format!(
            "backup {} does not exist",
            backup.display()
        )));
    }
    let source = open_valid(backup).map_err(|e| {
        SqlConnectError::BackupError(format!("invalid backup {}: {e}", backup.display()))
    })?;

    let cleared = if keep_damaged && target.is_file() {
        let damaged = with_suffix(target, ".bad");
        if damaged.exists() {
            fs::remove_file(&damaged).ok();
        }
        fs::rename(target, &damaged).is_ok() && remove_db_file(target)
    } else {
        remove_db_file(target)
    };
    if !cleared {
        return Err(SqlConnectError::BackupError(format!(
            "cannot replace {}",
            target.display()
        )));
    }

    backup_connection(&source, target, -1)?;
    info!(backup = %backup.display(), target = %target.display(), "sqlite database recovered");
    Ok(())
}

/// Delete a database file and its rollback journal / WAL files.
///
/// Returns `true` when none of them is left behind; missing files count as
/// removed.
pub fn remove_db_file(path: &Path) -> bool {
    ["", "-journal", "-wal", "-shm"]
        .iter()
        .map(|suffix| with_suffix(path, suffix))
        .fold(true, |ok, file| remove_if_present(&file) && ok)
}

fn remove_if_present(file: &Path) -> bool {
    match fs::remove_file(file) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(file = %file.display(), error = %e, "cannot remove database file");
            false
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Open `path` read-only and make sure it really is a database.
fn open_valid(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let status: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
    if status != "ok" {
        return Err(rusqlite::Error::InvalidQuery);
    }
    Ok(conn)
}

impl SqliteConnect {
    /// Copy this live database to `dst` through the online backup API.
    ///
    /// # Errors
    ///
    /// See [`online_backup`].
    pub fn online_backup(&self, dst: &Path, pages_per_step: i32) -> Result<(), SqlConnectError> {
        backup_connection(self.raw(), dst, pages_per_step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes_append_to_the_file_name() {
        assert_eq!(
            with_suffix(Path::new("/tmp/a.db"), "-journal"),
            PathBuf::from("/tmp/a.db-journal")
        );
    }

    #[test]
    fn removing_missing_files_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_db_file(&dir.path().join("absent.db")));
    }
}
