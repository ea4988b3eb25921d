//! The filesystem capability the engine calls through instead of `tokio::fs`
//! directly, so tests can substitute an in-memory fake.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

mod lock;
mod tokio_fs;

pub use lock::LockedFile;
pub use tokio_fs::TokioFs;

#[derive(Clone, Copy, Debug)]
pub struct FileMeta {
    pub len: u64,
    pub is_file: bool,
    pub is_dir: bool,
}

#[derive(Clone, Debug)]
pub struct DirEntryInfo {
    pub path: PathBuf,
    pub is_file: bool,
    pub is_dir: bool,
}

/// Filesystem operations the verification engine needs. All paths are
/// absolute. Every method is a potential suspension point.
#[async_trait]
pub trait CacheFs: Send + Sync {
    async fn metadata(&self, path: &Path) -> std::io::Result<FileMeta>;

    /// Reads an entire file into memory. Bucket files and content blobs are
    /// both assumed to be small enough for this; see `DataBlob`-style size
    /// caps upstream if that assumption ever needs revisiting.
    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;

    /// Writes `data` to `path` atomically: write to a sibling temp file,
    /// then rename over the destination. Mirrors this codebase's own
    /// `file_set_contents` helper.
    async fn atomic_write(&self, path: &Path, data: &[u8]) -> std::io::Result<()>;

    /// Same as [`CacheFs::atomic_write`], but stages the temp file under
    /// `staging_dir` instead of next to `path`. The default implementation
    /// ignores `staging_dir` and delegates to `atomic_write`; `TokioFs`
    /// overrides it for callers (the `_lastverified` marker) that must
    /// stage through `tmp/`.
    async fn atomic_write_via(&self, path: &Path, staging_dir: &Path, data: &[u8]) -> std::io::Result<()> {
        let _ = staging_dir;
        self.atomic_write(path, data).await
    }

    async fn remove_file(&self, path: &Path) -> std::io::Result<()>;

    /// Removes `path` recursively, whether it names a file or a directory.
    /// Not-found is not an error.
    async fn remove_path_recursive(&self, path: &Path) -> std::io::Result<()>;

    /// Removes `path` only if it is an empty directory. Not-found and
    /// not-empty are both tolerated as no-ops by callers that probe first.
    async fn remove_empty_dir(&self, path: &Path) -> std::io::Result<()>;

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Direct (non-recursive) children of `path`. Empty if `path` is
    /// missing.
    async fn read_dir(&self, path: &Path) -> std::io::Result<Vec<DirEntryInfo>>;
}

pub(crate) fn is_not_found(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::NotFound
}
