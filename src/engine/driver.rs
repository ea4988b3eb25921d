//! Orchestrates the six verification phases and narrows errors to
//! [`VerifyError`] at the public boundary.

use std::path::Path;

use crate::engine::{content_gc, last_verified, mark, rebuild_index, tmp_gc};
use crate::error::VerifyError;
use crate::fs::{CacheFs, TokioFs};
use crate::integrity::{IntegrityChecker, Sha2Checker};
use crate::layout::CacheLayout;
use crate::options::VerifyOptions;
use crate::stats::Stats;

/// Verifies and garbage-collects the cache rooted at `root`, against the
/// real filesystem, using the default SHA-1/SHA-256/SHA-512 checker.
pub async fn verify(root: impl AsRef<Path>) -> Result<Stats, VerifyError> {
    verify_with(root, VerifyOptions::default(), &TokioFs, &Sha2Checker).await
}

/// Same as [`verify`], with explicit options and injected `CacheFs`/
/// `IntegrityChecker` capabilities. This is the seam unit and integration
/// tests drive.
pub async fn verify_with(
    root: impl AsRef<Path>,
    options: VerifyOptions,
    fs: &dyn CacheFs,
    checker: &dyn IntegrityChecker,
) -> Result<Stats, VerifyError> {
    let layout = CacheLayout::new(root.as_ref());

    let start_time =
        mark::mark_start(fs, &layout)
            .await
            .map_err(|source| VerifyError::CacheRootUnusable {
                path: layout.root.clone(),
                source,
            })?;
    mark::fix_perms(&layout);

    let stats = Stats::starting_at(start_time);

    match run_phases(fs, checker, &layout, &options, stats).await {
        Ok(stats) => {
            if options.is_cancelled() {
                return Err(VerifyError::Cancelled);
            }
            let end_time = mark::now_millis();
            last_verified::write_last_verified(fs, &layout, end_time)
                .await
                .map_err(VerifyError::Io)?;

            let mut stats = stats;
            stats.end_time = end_time;
            stats.run_time = end_time - start_time;
            Ok(stats)
        }
        Err(err) => Err(VerifyError::Io(err)),
    }
}

/// Runs GarbageCollectTmp, RebuildIndex, and GarbageCollectContent in
/// sequence, checking for cancellation between each. A cancellation
/// observed mid-pipeline stops further phases but still returns whatever
/// stats were accumulated so far - the caller decides to discard them since
/// `_lastverified` is never written for a cancelled run.
async fn run_phases(
    fs: &dyn CacheFs,
    checker: &dyn IntegrityChecker,
    layout: &CacheLayout,
    options: &VerifyOptions,
    stats: Stats,
) -> anyhow::Result<Stats> {
    if options.is_cancelled() {
        return Ok(stats);
    }
    tmp_gc::gc_tmp(fs, layout).await?;

    if options.is_cancelled() {
        return Ok(stats);
    }
    let (stats, retained) =
        rebuild_index::rebuild_index(fs, checker, layout, options, stats).await?;

    if options.is_cancelled() {
        return Ok(stats);
    }
    let stats = content_gc::gc_content(fs, layout, options, &retained, stats).await?;

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use sha2::{Digest as _, Sha512};

    use super::*;
    use crate::digest::{Algorithm, Digest, Integrity};
    use crate::entry::Entry;
    use crate::fs::{DirEntryInfo, FileMeta};
    use crate::integrity::IntegrityError;

    /// In-memory `CacheFs` used to force unexpected-error branches (any
    /// error that isn't a plain not-found) to propagate rather than being
    /// absorbed into `Stats`. Real-filesystem behavior is exercised against
    /// `tempfile`-backed roots in the crate's `tests/` directory instead.
    #[derive(Default)]
    struct FakeFs {
        files: Mutex<HashMap<PathBuf, Vec<u8>>>,
        broken_metadata: Mutex<HashSet<PathBuf>>,
        broken_writes: Mutex<HashSet<PathBuf>>,
    }

    impl FakeFs {
        fn insert(&self, path: PathBuf, data: Vec<u8>) {
            self.files.lock().unwrap().insert(path, data);
        }

        fn break_metadata_for(&self, path: PathBuf) {
            self.broken_metadata.lock().unwrap().insert(path);
        }

        fn break_writes_for(&self, path: PathBuf) {
            self.broken_writes.lock().unwrap().insert(path);
        }
    }

    fn broken_pipe() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "injected failure")
    }

    #[async_trait]
    impl CacheFs for FakeFs {
        async fn metadata(&self, path: &Path) -> std::io::Result<FileMeta> {
            if self.broken_metadata.lock().unwrap().contains(path) {
                return Err(broken_pipe());
            }
            let files = self.files.lock().unwrap();
            if let Some(data) = files.get(path) {
                return Ok(FileMeta {
                    len: data.len() as u64,
                    is_file: true,
                    is_dir: false,
                });
            }
            if files.keys().any(|p| p.starts_with(path) && p != path) {
                return Ok(FileMeta { len: 0, is_file: false, is_dir: true });
            }
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "not found"))
        }

        async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "not found"))
        }

        async fn atomic_write(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
            if self.broken_writes.lock().unwrap().contains(path) {
                return Err(broken_pipe());
            }
            self.files.lock().unwrap().insert(path.to_path_buf(), data.to_vec());
            Ok(())
        }

        async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
            self.files.lock().unwrap().remove(path);
            Ok(())
        }

        async fn remove_path_recursive(&self, path: &Path) -> std::io::Result<()> {
            self.files
                .lock()
                .unwrap()
                .retain(|p, _| p != path && !p.starts_with(path));
            Ok(())
        }

        async fn remove_empty_dir(&self, _path: &Path) -> std::io::Result<()> {
            Ok(())
        }

        async fn create_dir_all(&self, _path: &Path) -> std::io::Result<()> {
            Ok(())
        }

        async fn read_dir(&self, path: &Path) -> std::io::Result<Vec<DirEntryInfo>> {
            let files = self.files.lock().unwrap();
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for p in files.keys() {
                if let Ok(rel) = p.strip_prefix(path) {
                    let mut components = rel.components();
                    if let Some(first) = components.next() {
                        let child = path.join(first);
                        if components.next().is_some() {
                            if seen.insert(child.clone()) {
                                out.push(DirEntryInfo { path: child, is_file: false, is_dir: true });
                            }
                        } else {
                            out.push(DirEntryInfo { path: child, is_file: true, is_dir: false });
                        }
                    }
                }
            }
            Ok(out)
        }
    }

    /// Always reports a mismatch, or an injected unknown I/O error if armed.
    #[derive(Default)]
    struct FakeChecker {
        fail_unexpectedly: Mutex<bool>,
    }

    #[async_trait]
    impl IntegrityChecker for FakeChecker {
        async fn check_stream(
            &self,
            _fs: &dyn CacheFs,
            _path: &Path,
            _expected: &Digest,
        ) -> Result<(), IntegrityError> {
            if *self.fail_unexpectedly.lock().unwrap() {
                Err(IntegrityError::Io(broken_pipe()))
            } else {
                Ok(())
            }
        }
    }

    fn seed_single_entry(fs: &FakeFs, layout: &CacheLayout, content: &[u8]) -> PathBuf {
        let digest = Digest::new(Algorithm::Sha512, Sha512::digest(content).to_vec());
        let content_path = crate::content_store::content_path(layout, &digest);
        fs.insert(content_path.clone(), content.to_vec());

        let entry = Entry {
            key: "my-test-key".to_string(),
            integrity: Integrity::single(digest),
            time: 1,
            metadata: serde_json::json!({}),
            size: Some(content.len() as u64),
        };
        let payload = serde_json::to_string(&entry).unwrap();
        let record = crate::bucket::format_record(&payload);
        let bucket_path = crate::bucket::bucket_path(layout, &entry.key);
        fs.insert(bucket_path, record.into_bytes());

        content_path
    }

    #[tokio::test]
    async fn unexpected_stat_error_aborts_the_run() {
        let layout = CacheLayout::new("/cache");
        let fs = FakeFs::default();
        let content_path = seed_single_entry(&fs, &layout, b"foobarbaz");
        fs.break_metadata_for(content_path);

        let err = verify_with("/cache", VerifyOptions::new(), &fs, &FakeChecker::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Io(_)));
    }

    #[tokio::test]
    async fn unexpected_integrity_error_aborts_the_run() {
        let layout = CacheLayout::new("/cache");
        let fs = FakeFs::default();
        seed_single_entry(&fs, &layout, b"foobarbaz");

        let checker = FakeChecker::default();
        *checker.fail_unexpectedly.lock().unwrap() = true;

        let err = verify_with("/cache", VerifyOptions::new(), &fs, &checker)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Io(_)));
    }

    #[tokio::test]
    async fn write_failure_during_rewrite_aborts_the_run() {
        let layout = CacheLayout::new("/cache");
        let fs = FakeFs::default();
        seed_single_entry(&fs, &layout, b"foobarbaz");
        fs.break_writes_for(crate::bucket::bucket_path(&layout, "my-test-key"));

        let err = verify_with("/cache", VerifyOptions::new(), &fs, &FakeChecker::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Io(_)));
    }

    #[tokio::test]
    async fn missing_content_is_rejected_without_error() {
        let layout = CacheLayout::new("/cache");
        let fs = FakeFs::default();

        let entry = Entry {
            key: "my-test-key".to_string(),
            integrity: Integrity::single(Digest::new(Algorithm::Sha512, Sha512::digest(b"x").to_vec())),
            time: 1,
            metadata: serde_json::json!({}),
            size: Some(1),
        };
        let payload = serde_json::to_string(&entry).unwrap();
        let record = crate::bucket::format_record(&payload);
        fs.insert(crate::bucket::bucket_path(&layout, &entry.key), record.into_bytes());

        let stats = verify_with("/cache", VerifyOptions::new(), &fs, &FakeChecker::default())
            .await
            .unwrap();
        assert_eq!(stats.missing_content, 1);
        assert_eq!(stats.total_entries, 0);
    }
}
