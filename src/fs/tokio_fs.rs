use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{is_not_found, CacheFs, DirEntryInfo, FileMeta};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Default [`CacheFs`] implementation, backed by `tokio::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioFs;

#[async_trait]
impl CacheFs for TokioFs {
    async fn metadata(&self, path: &Path) -> std::io::Result<FileMeta> {
        let meta = tokio::fs::metadata(path).await?;
        Ok(FileMeta {
            len: meta.len(),
            is_file: meta.is_file(),
            is_dir: meta.is_dir(),
        })
    }

    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn atomic_write(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(dir).await?;

        let tmp_name = format!(
            ".{}.tmp-{}-{}",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "atomic".to_string()),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed),
        );
        let tmp_path = dir.join(tmp_name);

        let result = async {
            tokio::fs::write(&tmp_path, data).await?;
            tokio::fs::rename(&tmp_path, path).await
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp_path).await;
        }

        result
    }

    async fn atomic_write_via(&self, path: &Path, staging_dir: &Path, data: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(staging_dir).await?;

        let tmp_name = format!(
            ".{}.tmp-{}-{}",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "atomic".to_string()),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed),
        );
        let tmp_path = staging_dir.join(tmp_name);

        let result = async {
            tokio::fs::write(&tmp_path, data).await?;
            tokio::fs::rename(&tmp_path, path).await
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp_path).await;
        }

        result
    }

    async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn remove_path_recursive(&self, path: &Path) -> std::io::Result<()> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(err) if is_not_found(&err) => return Ok(()),
            Err(err) => return Err(err),
        };

        let result = if meta.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        };

        match result {
            Ok(()) => Ok(()),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn remove_empty_dir(&self, path: &Path) -> std::io::Result<()> {
        match tokio::fs::remove_dir(path).await {
            Ok(()) => Ok(()),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn read_dir(&self, path: &Path) -> std::io::Result<Vec<DirEntryInfo>> {
        let mut rd = match tokio::fs::read_dir(path).await {
            Ok(rd) => rd,
            Err(err) if is_not_found(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut out = Vec::new();
        while let Some(entry) = rd.next_entry().await? {
            let file_type = entry.file_type().await?;
            out.push(DirEntryInfo {
                path: entry.path(),
                is_file: file_type.is_file(),
                is_dir: file_type.is_dir(),
            });
        }
        Ok(out)
    }
}
