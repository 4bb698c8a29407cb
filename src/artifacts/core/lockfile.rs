//! `.lock` file protocol
//!
//! A writer creates `<target>.lock` exclusively, writes the new content into it,
//! flushes it to disk and renames it over `<target>`. The rename is the commit
//! point. A lock that is dropped without being committed is removed again.

use crate::errors::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const LOCK_SUFFIX: &str = ".lock";

#[derive(Debug)]
pub struct Lockfile {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
}

impl Lockfile {
    pub fn lock_path_for(target: &Path) -> PathBuf {
        let mut lock_path = target.as_os_str().to_owned();
        lock_path.push(LOCK_SUFFIX);
        PathBuf::from(lock_path)
    }

    /// Take the lock for `target`, failing with `Locked` if someone else holds it
    pub fn acquire(target: impl Into<PathBuf>) -> Result<Self> {
        let target = target.into();
        let lock_path = Self::lock_path_for(&target);

        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => Error::Locked(lock_path.clone()),
                _ => Error::io(&lock_path, e),
            })?;

        Ok(Lockfile {
            target,
            lock_path,
            file: Some(file),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Flush the written content and rename it over the target
    pub fn commit(mut self) -> Result<()> {
        if let Some(file) = self.file.as_ref() {
            file.sync_all().map_err(|e| Error::io(&self.lock_path, e))?;
        }
        // on failure the lock is still held and Drop removes it
        std::fs::rename(&self.lock_path, &self.target).map_err(|e| Error::io(&self.target, e))?;
        self.file.take();
        Ok(())
    }

    /// Release the lock without touching the target
    pub fn rollback(mut self) -> Result<()> {
        self.file.take();
        remove_if_present(&self.lock_path)
    }

    /// Remove a lock left behind by a crashed writer if it is older than `max_age`
    ///
    /// Returns whether a lock was removed.
    pub fn break_stale(target: &Path, max_age: Duration) -> Result<bool> {
        let lock_path = Self::lock_path_for(target);
        let metadata = match std::fs::metadata(&lock_path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::io(&lock_path, e)),
        };

        let modified = metadata.modified().map_err(|e| Error::io(&lock_path, e))?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age < max_age {
            return Ok(false);
        }

        tracing::warn!("breaking stale lock {:?} ({}s old)", lock_path, age.as_secs());
        remove_if_present(&lock_path)?;
        Ok(true)
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

impl Write for Lockfile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::other("lock already released")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for Lockfile {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
