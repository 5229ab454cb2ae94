//! Process-wide singleton enforcement: at most one `ExecutionCoordinator`
//! may write to a given store at a time. An exclusive, non-blocking `flock`
//! on a PID file next to the database is acquired once at startup; failure
//! to acquire refuses to start rather than risking two processes racing the
//! same schedule. Grounded on `libc`, the crate several repos in the
//! example pack (and the teacher's own `exchange-sim` sub-crate) reach for
//! when they need a raw OS-level primitive rather than a higher-level crate.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Holds the lock for as long as it lives. Dropping it releases the `flock`
/// and removes the PID file.
pub struct SingletonGuard {
    file: File,
    path: PathBuf,
}

impl SingletonGuard {
    /// Acquire the lock at `path`, creating the file if missing. Returns an
    /// error if another process already holds it.
    pub fn acquire(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|e| anyhow::anyhow!("could not open lock file {}: {e}", path.display()))?;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            anyhow::bail!(
                "another kairos instance already holds the lock at {} — refusing to start",
                path.display()
            );
        }

        let mut handle = &file;
        handle.set_len(0)?;
        write!(handle, "{}", std::process::id())?;

        Ok(Self { file, path })
    }
}

impl Drop for SingletonGuard {
    fn drop(&mut self) {
        let _ = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
        let _ = std::fs::remove_file(&self.path);
    }
}
