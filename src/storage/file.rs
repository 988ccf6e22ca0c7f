//! File Backend
//!
//! One file per entry, named `{prefix}{sha256(key)}{suffix}`. The file's
//! modification time holds the absolute expiry instant, so no metadata store
//! is needed.
//!
//! There is no cross-process locking. A read racing a delete or clear simply
//! misses; it never fails.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::{codec, resolve_ttl, validate_key, Ttl};
use crate::config::{Config, FileStorageConfig};
use crate::error::{CacheError, Result};
use crate::storage::Storage;

// == Filesystem ==
/// Filesystem operations the file backend relies on.
pub trait Filesystem: Send + Sync + fmt::Debug {
    /// Whether `path` is an existing directory the process may write into.
    fn is_writable_dir(&self, path: &Path) -> bool;

    fn exists(&self, path: &Path) -> bool;

    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Creates or truncates `path` with `contents`.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()>;

    /// Atomically replaces `to` with `from`.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Regular files directly inside `dir` whose name starts with `prefix`,
    /// in lexical order.
    fn list_prefixed(&self, dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>>;
}

/// [`Filesystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn is_writable_dir(&self, path: &Path) -> bool {
        let is_dir = fs::metadata(path).map(|meta| meta.is_dir()).unwrap_or(false);
        is_dir && can_create_in(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()> {
        let file: File = OpenOptions::new().write(true).open(path)?;
        file.set_modified(time)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn list_prefixed(&self, dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with(prefix) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Asks the kernel whether new entries may be created in `dir`, honoring
/// ownership, ACLs and read-only mounts.
#[cfg(unix)]
fn can_create_in(dir: &Path) -> bool {
    use rustix::fs::{access, Access};

    access(dir, Access::WRITE_OK | Access::EXEC_OK).is_ok()
}

#[cfg(not(unix))]
fn can_create_in(dir: &Path) -> bool {
    fs::metadata(dir)
        .map(|meta| !meta.permissions().readonly())
        .unwrap_or(false)
}

/// Trailing marker of in-flight writes.
const STAGING_MARKER: &str = ".tmp";

// == File Storage ==
/// Backend keeping each entry in its own file.
///
/// Distinct keys map to distinct names unless their SHA-256 digests collide,
/// which is not handled.
#[derive(Debug)]
pub struct FileStorage {
    fs: Arc<dyn Filesystem>,
    directory: PathBuf,
    prefix: String,
    suffix: String,
    default_ttl: u64,
    staging_counter: AtomicU64,
}

impl FileStorage {
    /// Creates a backend over `storages.file.*`, failing fast when the
    /// directory is missing or not writable.
    pub fn new(config: &Config, fs: Arc<dyn Filesystem>) -> Result<Self> {
        let defaults = FileStorageConfig::default();
        let directory: PathBuf = config.get_or("storages.file.path", defaults.path);

        if !fs.is_writable_dir(&directory) {
            return Err(CacheError::BackendUnavailable(format!(
                "cannot use file cache handler, because the directory {} does not exist or is not writable",
                directory.display()
            )));
        }

        Ok(Self {
            fs,
            directory,
            prefix: config.get_or("storages.file.prefix", defaults.prefix),
            suffix: config.get_or("storages.file.suffix", defaults.suffix),
            default_ttl: config.get_or("ttl", Config::default().ttl),
            staging_counter: AtomicU64::new(0),
        })
    }

    /// Backend over the local filesystem.
    pub fn local(config: &Config) -> Result<Self> {
        Self::new(config, Arc::new(LocalFilesystem))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File name for `key`.
    pub fn file_name(&self, key: &str) -> String {
        let digest = Sha256::digest(key.as_bytes());
        format!("{}{}{}", self.prefix, hex::encode(digest), self.suffix)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.directory.join(self.file_name(key))
    }

    /// Prefixed temporary path, so `clear` also sweeps abandoned writes.
    fn staging_path(&self, key: &str) -> PathBuf {
        let sequence = self.staging_counter.fetch_add(1, Ordering::Relaxed);
        self.directory.join(format!(
            "{}.{}.{}{}",
            self.file_name(key),
            std::process::id(),
            sequence,
            STAGING_MARKER
        ))
    }

    fn is_staging(path: &Path) -> bool {
        path.to_string_lossy().ends_with(STAGING_MARKER)
    }

    /// Removes `path` if it has expired at `now`; reports whether it did.
    fn remove_if_expired(&self, path: &Path, now: SystemTime) -> bool {
        match self.fs.modified(path) {
            Ok(expires_at) if now >= expires_at => self.fs.remove(path).is_ok(),
            _ => false,
        }
    }
}

impl Storage for FileStorage {
    fn name(&self) -> &'static str {
        "file"
    }

    fn fetch(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        let path = self.entry_path(key);

        let expires_at = match self.fs.modified(&path) {
            Ok(time) => time,
            Err(_) => return Ok(None),
        };

        if SystemTime::now() >= expires_at {
            debug!(key, "cache file expired");
            if let Err(err) = self.fs.remove(&path) {
                debug!(key, error = %err, "could not remove expired cache file");
            }
            return Ok(None);
        }

        // The file may vanish between the stat and the read
        let data = match self.fs.read(&path) {
            Ok(data) => data,
            Err(err) => {
                debug!(key, error = %err, "cache file unreadable");
                return Ok(None);
            }
        };

        match codec::decode(&data) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(key, path = %path.display(), error = %err, "corrupt cache file");
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: &Value, ttl: Option<Ttl>) -> Result<bool> {
        validate_key(key)?;
        let ttl = resolve_ttl(ttl, self.default_ttl)?;
        let expires_at = SystemTime::now()
            .checked_add(Duration::from_secs(ttl))
            .ok_or_else(|| CacheError::InvalidTtl(ttl.to_string()))?;

        let data = match codec::encode(value) {
            Ok(data) => data,
            Err(err) => {
                warn!(key, error = %err, "cache value could not be encoded");
                return Ok(false);
            }
        };

        let staging = self.staging_path(key);
        if let Err(err) = self.fs.write(&staging, &data) {
            warn!(key, path = %staging.display(), error = %err, "cache file write failed");
            let _ = self.fs.remove(&staging);
            return Ok(false);
        }

        if let Err(err) = self.fs.set_modified(&staging, expires_at) {
            warn!(key, path = %staging.display(), error = %err, "cache file expiry update failed");
            let _ = self.fs.remove(&staging);
            return Ok(false);
        }

        let path = self.entry_path(key);
        if let Err(err) = self.fs.rename(&staging, &path) {
            warn!(key, path = %path.display(), error = %err, "cache file publish failed");
            let _ = self.fs.remove(&staging);
            return Ok(false);
        }

        debug!(key, ttl, "cache file written");
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let path = self.entry_path(key);

        if !self.fs.exists(&path) {
            return Ok(true);
        }

        match self.fs.remove(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(err) => {
                warn!(key, path = %path.display(), error = %err, "cache file delete failed");
                Ok(false)
            }
        }
    }

    fn clear(&self) -> bool {
        let files = match self.fs.list_prefixed(&self.directory, &self.prefix) {
            Ok(files) => files,
            Err(err) => {
                warn!(directory = %self.directory.display(), error = %err, "cache directory listing failed");
                return false;
            }
        };

        // Keep going after a failure; the caller only learns that something stayed
        let mut success = true;
        for file in files {
            if let Err(err) = self.fs.remove(&file) {
                warn!(path = %file.display(), error = %err, "cache file delete failed");
                success = false;
            }
        }
        success
    }

    fn prune_expired(&self) -> usize {
        let files = match self.fs.list_prefixed(&self.directory, &self.prefix) {
            Ok(files) => files,
            Err(err) => {
                warn!(directory = %self.directory.display(), error = %err, "cache directory listing failed");
                return 0;
            }
        };

        // A staging file's mtime is still "now" until its expiry is stamped
        let now = SystemTime::now();
        files
            .iter()
            .filter(|file| !Self::is_staging(file))
            .filter(|file| self.remove_if_expired(file, now))
            .count()
    }
}
