//! Phase 1 (MarkStart) and phase 2 (FixPerms).

use std::time::{SystemTime, UNIX_EPOCH};

use crate::fs::CacheFs;
use crate::layout::CacheLayout;

/// Current wall-clock time, in epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the epoch")
        .as_millis() as i64
}

/// Records a wall-clock start time and ensures the cache directory tree
/// exists.
pub async fn mark_start(fs: &dyn CacheFs, layout: &CacheLayout) -> std::io::Result<i64> {
    fs.create_dir_all(&layout.root).await?;
    fs.create_dir_all(&layout.index_dir).await?;
    fs.create_dir_all(&layout.content_dir).await?;
    fs.create_dir_all(&layout.tmp_dir).await?;
    Ok(now_millis())
}

/// Reserved hook for file ownership/permission normalization. A no-op:
/// leave the interface in place for a future implementation rather than
/// synthesizing behavior the source never specified.
pub fn fix_perms(_layout: &CacheLayout) {}
