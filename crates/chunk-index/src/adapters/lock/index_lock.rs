//! Advisory `fs2` lock on `<dir>/index.lock`.
//!
//! The holder writes its PID into the file so a contender can name it. The
//! file itself is never removed: the kernel drops the lock when its holder
//! exits, and unlinking a file someone else may have just locked would let
//! two processes each hold a lock on a different inode. A contender backs
//! off until its timeout runs out.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

pub const LOCK_FILE: &str = "index.lock";

/// Wait used when the configuration does not name one.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("cannot open lock file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("refusing to lock through symlink {}", .0.display())]
    Symlink(PathBuf),

    #[error("index {} is held{}", .path.display(), .holder.map(|p| format!(" by pid {}", p)).unwrap_or_default())]
    Held { holder: Option<u32>, path: PathBuf },

    #[error("cannot record pid in {}: {source}", .path.display())]
    Record {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

enum Attempt {
    Acquired(File),
    Held(Option<u32>),
}

/// Exclusive lock on an index directory, released on drop.
#[derive(Debug)]
pub struct IndexLock {
    file: File,
    path: PathBuf,
    pid: u32,
}

impl IndexLock {
    /// Lock `dir`, creating it if needed, waiting at most `timeout`.
    pub fn acquire(dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = dir.join(LOCK_FILE);
        fs::create_dir_all(dir).map_err(|source| LockError::Open {
            path: dir.to_path_buf(),
            source,
        })?;
        if fs::symlink_metadata(&path).map_or(false, |m| m.file_type().is_symlink()) {
            return Err(LockError::Symlink(path));
        }

        let deadline = Instant::now() + timeout;
        let mut backoff = Duration::from_millis(25);
        let own = std::process::id();

        loop {
            match try_lock(&path)? {
                Attempt::Acquired(file) => return Self::record(file, path, own),
                Attempt::Held(holder) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(LockError::Held { holder, path });
                    }
                    thread::sleep(backoff.min(deadline - now));
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    fn record(mut file: File, path: PathBuf, pid: u32) -> Result<Self, LockError> {
        let written = file
            .set_len(0)
            .and_then(|_| writeln!(file, "{}", pid))
            .and_then(|_| file.sync_all());
        if let Err(source) = written {
            let _ = FileExt::unlock(&file);
            return Err(LockError::Record { path, source });
        }
        tracing::debug!(path = %path.display(), pid, "[chunk-index] index lock acquired");
        Ok(Self { file, path, pid })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        // Blank the PID while still holding the lock, then release.
        let _ = self.file.set_len(0);
        let _ = FileExt::unlock(&self.file);
        tracing::debug!(path = %self.path.display(), pid = self.pid, "[chunk-index] index lock released");
    }
}

fn try_lock(path: &Path) -> Result<Attempt, LockError> {
    // Never truncate here: a holder's PID must stay readable.
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| LockError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(Attempt::Acquired(file)),
        Err(_) => Ok(Attempt::Held(holder_pid(path))),
    }
}

pub(crate) fn holder_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}
