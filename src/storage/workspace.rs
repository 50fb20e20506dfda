//! Scratch workspace for a single import run.
//!
//! The workspace path is fixed per installation, so two runs must never use
//! it at the same time, whether they live in one process or in two CLI
//! invocations. Acquiring a workspace takes an exclusive `flock(2)` on the
//! sibling `<workspace>.lock` file before anything is deleted or created.
//! Dropping the guard deletes the directory and then releases the lock, on
//! every exit path of the run.
//!
//! `flock` locks belong to the open file description, so a second `acquire`
//! from the same process is rejected just like one from another process.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{ImportError, Result};

/// Lock file guarding `workspace`: `data` -> `data.lock` in the same parent
pub fn lock_path(workspace: &Path) -> PathBuf {
    let mut name = workspace
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "workspace".into());
    name.push(".lock");
    workspace.with_file_name(name)
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the fd is owned by `file`, which outlives this call.
    let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if ret == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the fd is owned by `file`. Closing it would release the lock
    // anyway; unlocking here makes the release point explicit.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

// No advisory locking off unix: overlapping runs are not detected there.
#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<bool> {
    Ok(true)
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}

/// Exclusive guard over a scratch directory
#[derive(Debug)]
pub struct ScratchWorkspace {
    path: PathBuf,
    lock: File,
}

impl ScratchWorkspace {
    /// Claim `path` for this run and create it empty.
    ///
    /// Fails with [`ImportError::WorkspaceBusy`] while another run holds it.
    /// Leftovers from an earlier run that did not finish are removed first.
    pub fn acquire(path: &Path) -> Result<Self> {
        let lock_file = lock_path(path);
        if let Some(parent) = lock_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_file)?;

        if !try_lock_exclusive(&lock)? {
            log::warn!("Workspace {:?} is locked by another run", path);
            return Err(ImportError::WorkspaceBusy(path.to_path_buf()));
        }

        // Holder pid, for whoever finds the lock file
        lock.set_len(0)?;
        writeln!(lock, "{}", std::process::id())?;

        // From here on the guard owns the lock and releases it on drop.
        let workspace = Self {
            path: path.to_path_buf(),
            lock,
        };

        if workspace.path.exists() {
            log::info!("Removing stale workspace {:?}", workspace.path);
            fs::remove_dir_all(&workspace.path)?;
        }
        fs::create_dir_all(&workspace.path)?;

        log::info!("Created workspace {:?}", workspace.path);
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => log::info!("Cleaned up workspace {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to clean up workspace {:?}: {}", self.path, e),
        }
        unlock(&self.lock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/home/me/.memoport/cache/data")),
            PathBuf::from("/home/me/.memoport/cache/data.lock")
        );
    }

    #[test]
    fn test_acquire_creates_and_drop_removes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data");

        {
            let ws = ScratchWorkspace::acquire(&path).unwrap();
            assert!(ws.path().is_dir());
            assert!(lock_path(&path).is_file());
            fs::write(ws.path().join("leftover.txt"), "x").unwrap();
        }

        assert!(!path.exists());
        assert!(ScratchWorkspace::acquire(&path).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_overlapping_acquire_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data");

        let first = ScratchWorkspace::acquire(&path).unwrap();
        fs::write(first.path().join("in-flight.txt"), "x").unwrap();

        let second = ScratchWorkspace::acquire(&path);
        assert!(matches!(second, Err(ImportError::WorkspaceBusy(_))));

        // The rejected attempt must not have touched the first run's files
        assert!(first.path().join("in-flight.txt").is_file());
        drop(first);

        assert!(ScratchWorkspace::acquire(&path).is_ok());
    }

    #[test]
    fn test_stale_contents_are_cleared() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data");
        fs::create_dir_all(path.join("old-export")).unwrap();

        let ws = ScratchWorkspace::acquire(&path).unwrap();
        assert_eq!(fs::read_dir(ws.path()).unwrap().count(), 0);
    }
}
