//! Phase 3 (GarbageCollectTmp).

use anyhow::{Context, Result};

use crate::fs::CacheFs;
use crate::layout::CacheLayout;

/// Removes every file and directory under `tmp/`. Absent `tmp/` is not an
/// error - it is created if missing, then left empty. Does not touch
/// siblings of `tmp/`.
pub async fn gc_tmp(fs: &dyn CacheFs, layout: &CacheLayout) -> Result<()> {
    fs.create_dir_all(&layout.tmp_dir)
        .await
        .with_context(|| format!("unable to create {:?}", layout.tmp_dir))?;

    let children = fs
        .read_dir(&layout.tmp_dir)
        .await
        .with_context(|| format!("unable to list {:?}", layout.tmp_dir))?;

    let removed = children.len();
    for child in children {
        fs.remove_path_recursive(&child.path)
            .await
            .with_context(|| format!("unable to remove {:?}", child.path))?;
    }

    log::debug!("gc_tmp: removed {} entries from {:?}", removed, layout.tmp_dir);

    Ok(())
}
