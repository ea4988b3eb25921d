use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Error};
use nix::fcntl::{flock, FlockArg};

/// An advisory single-instance lock, held for the lifetime of the value.
///
/// This is a convenience the bundled CLI takes out around a `verify` call
/// so two invocations against the same cache root don't race; the engine
/// itself does not take this lock and provides no cross-process exclusion
/// on its own (see the concurrency model notes).
pub struct LockedFile {
    _file: File,
}

impl LockedFile {
    /// Blocks (polling every 100ms) until the lock is acquired or `timeout`
    /// elapses.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("unable to open lock file {:?}", path))?;

        let fd = file.as_raw_fd();
        let start = Instant::now();
        let mut warned = false;

        loop {
            match flock(fd, FlockArg::LockExclusiveNonblock) {
                Ok(()) => return Ok(LockedFile { _file: file }),
                Err(_) => {
                    if !warned {
                        warned = true;
                        log::warn!("waiting for lock on {:?}...", path);
                    }
                }
            }

            if start.elapsed() >= timeout {
                bail!("unable to acquire lock {:?} - timed out", path);
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}
