//! Phase 5 (GarbageCollectContent).

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex as AsyncMutex;

use crate::bucket;
use crate::fs::CacheFs;
use crate::layout::CacheLayout;
use crate::options::VerifyOptions;
use crate::stats::Stats;

/// Deletes every content-store blob not referenced by the rebuilt index.
/// `retained` is the set of content paths `RebuildIndex` verified and kept.
pub async fn gc_content(
    fs: &dyn CacheFs,
    layout: &CacheLayout,
    options: &VerifyOptions,
    retained: &HashSet<PathBuf>,
    mut stats: Stats,
) -> Result<Stats> {
    let blobs = bucket::list_files_recursive(fs, &layout.content_dir)
        .await
        .with_context(|| format!("unable to enumerate content under {:?}", layout.content_dir))?;

    let orphans: Vec<PathBuf> = blobs.into_iter().filter(|p| !retained.contains(p)).collect();

    let stats_mutex = AsyncMutex::new(Stats::default());
    let stats_ref = &stats_mutex;

    let results: Vec<Result<()>> = stream::iter(orphans)
        .map(|path| async move {
            let meta = fs
                .metadata(&path)
                .await
                .with_context(|| format!("stat failed for orphan {:?}", path))?;
            fs.remove_file(&path)
                .await
                .with_context(|| format!("unable to remove orphan blob {:?}", path))?;
            log::debug!("gc_content: reclaimed orphan blob {:?}", path);

            let mut guard = stats_ref.lock().await;
            guard.reclaimed_count += 1;
            guard.reclaimed_size += meta.len;
            Ok(())
        })
        .buffer_unordered(options.concurrency())
        .collect()
        .await;

    for result in results {
        result?;
    }

    let phase_stats = stats_mutex.into_inner();
    log::info!(
        "gc_content: reclaimed {} blobs ({} bytes)",
        phase_stats.reclaimed_count,
        phase_stats.reclaimed_size,
    );
    stats.merge(phase_stats);

    bucket::prune_empty_dirs(fs, &layout.content_dir)
        .await
        .with_context(|| format!("unable to prune empty directories under {:?}", layout.content_dir))?;

    Ok(stats)
}
