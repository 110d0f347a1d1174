//! An out-of-band advisory file lock with a bounded lifetime, so a crashed
//! holder cannot wedge peers indefinitely (spec.md §4.4 NFS variant, §5).
//!
//! This is deliberately simple rather than reaching for a platform `flock`
//! crate: NFS does not reliably honor `flock` across hosts, which is
//! exactly the scenario this lock exists for. Staleness is judged purely
//! by the lock file's mtime, the same mechanism proxmox-backup and similar
//! NFS-tolerant tools use for crashed-holder detection.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

const DEFAULT_LIFETIME: Duration = Duration::from_secs(600);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct FileLock {
    lock_path: PathBuf,
}

impl FileLock {
    /// Acquire the lock at `<index_path>.lock`, waiting out any lock held
    /// by a still-live holder and stealing any lock older than `lifetime`.
    pub fn acquire(index_path: &Path, lifetime: Duration) -> std::io::Result<Self> {
        let lock_path = lock_path_for(index_path);

        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    write!(file, "{}", std::process::id())?;
                    return Ok(Self { lock_path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if is_stale(&lock_path, lifetime) {
                        let _ = fs::remove_file(&lock_path);
                        continue;
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn acquire_default(index_path: &Path) -> std::io::Result<Self> {
        Self::acquire(index_path, DEFAULT_LIFETIME)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn lock_path_for(index_path: &Path) -> PathBuf {
    let mut name = index_path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

fn is_stale(lock_path: &Path, lifetime: Duration) -> bool {
    let Ok(metadata) = fs::metadata(lock_path) else {
        return true;
    };
    let Ok(modified) = metadata.modified() else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age > lifetime)
        .unwrap_or(false)
}
