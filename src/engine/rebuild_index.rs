//! Phase 4 (RebuildIndex) - the heart of the system.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex as AsyncMutex;

use crate::bucket;
use crate::content_store;
use crate::entry::Entry;
use crate::fs::{is_not_found, CacheFs};
use crate::integrity::{IntegrityChecker, IntegrityError};
use crate::layout::CacheLayout;
use crate::options::VerifyOptions;
use crate::stats::Stats;

/// Per-digest memoization state, shared across concurrently processed
/// buckets: multiple entries (in the same or different buckets) may share a
/// digest, and `verifiedContent`/`keptSize` must only account for it once.
#[derive(Clone)]
enum DigestState {
    InProgress,
    Done(u64),
}

enum Claim {
    AlreadyDone,
    GoVerify,
    Wait,
}

type VerifiedMap = AsyncMutex<HashMap<PathBuf, DigestState>>;

/// Scans every index bucket, parses surviving entries, applies the
/// caller's filter, deduplicates per key, verifies each retained entry's
/// content, and rewrites each bucket from scratch. Returns the updated
/// stats and the set of content-store paths the rebuilt index references
/// (input to `GarbageCollectContent`).
pub async fn rebuild_index(
    fs: &dyn CacheFs,
    checker: &dyn IntegrityChecker,
    layout: &CacheLayout,
    options: &VerifyOptions,
    mut stats: Stats,
) -> Result<(Stats, HashSet<PathBuf>)> {
    let bucket_paths = bucket::list_files_recursive(fs, &layout.index_dir)
        .await
        .with_context(|| format!("unable to enumerate buckets under {:?}", layout.index_dir))?;

    let verified: VerifiedMap = AsyncMutex::new(HashMap::new());
    let verified_ref = &verified;

    let results: Vec<Result<Stats>> = stream::iter(bucket_paths)
        .map(|bucket_path| async move {
            process_bucket(fs, checker, layout, options, verified_ref, &bucket_path).await
        })
        .buffer_unordered(options.concurrency())
        .collect()
        .await;

    for result in results {
        stats.merge(result?);
    }

    bucket::prune_empty_dirs(fs, &layout.index_dir)
        .await
        .with_context(|| format!("unable to prune empty directories under {:?}", layout.index_dir))?;

    let retained = verified
        .into_inner()
        .into_iter()
        .filter_map(|(path, state)| match state {
            DigestState::Done(_) => Some(path),
            DigestState::InProgress => None,
        })
        .collect();

    log::info!(
        "rebuild_index: {} entries retained, {} distinct blobs verified, {} rejected",
        stats.total_entries,
        stats.verified_content,
        stats.rejected_entries,
    );

    Ok((stats, retained))
}

async fn process_bucket(
    fs: &dyn CacheFs,
    checker: &dyn IntegrityChecker,
    layout: &CacheLayout,
    options: &VerifyOptions,
    verified: &VerifiedMap,
    bucket_path: &Path,
) -> Result<Stats> {
    let mut stats = Stats::default();

    let raw = match fs.read(bucket_path).await {
        Ok(data) => data,
        Err(err) if is_not_found(&err) => return Ok(stats),
        Err(err) => {
            return Err(
                anyhow::Error::new(err).context(format!("unable to read bucket {:?}", bucket_path))
            )
        }
    };
    let text = String::from_utf8_lossy(&raw);

    // Parse, checking each line's hash and JSON shape; torn or unparseable
    // lines are silently dropped (not counted as rejections). Line order is
    // preserved so dedup can apply last-write-wins on ties.
    let mut parsed: Vec<(String, Entry)> = Vec::new();
    for record in bucket::split_records(&text) {
        if bucket::is_torn(&record) {
            continue;
        }
        let entry: Entry = match serde_json::from_str(record.payload) {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        if !options.apply_filter(&entry) {
            stats.rejected_entries += 1;
            continue;
        }
        parsed.push((record.payload.to_string(), entry));
    }

    // Deduplicate by key: keep the record with the greatest `time`; ties
    // keep the later occurrence (last-write-wins).
    let mut winner_by_key: HashMap<String, usize> = HashMap::new();
    for (idx, (_, entry)) in parsed.iter().enumerate() {
        match winner_by_key.get(&entry.key) {
            None => {
                winner_by_key.insert(entry.key.clone(), idx);
            }
            Some(&current) => {
                if entry.time >= parsed[current].1.time {
                    winner_by_key.insert(entry.key.clone(), idx);
                }
            }
        }
    }
    let shadowed = parsed.len() - winner_by_key.len();
    stats.rejected_entries += shadowed as u64;

    let mut winners: Vec<usize> = winner_by_key.into_values().collect();
    winners.sort_unstable();

    let mut retained_payloads: Vec<String> = Vec::new();

    for idx in winners {
        let (payload, entry) = &parsed[idx];
        let retained =
            verify_entry_content(fs, checker, layout, verified, entry, &mut stats).await?;
        if retained {
            stats.total_entries += 1;
            retained_payloads.push(payload.clone());
        }
    }

    if retained_payloads.is_empty() {
        fs.remove_file(bucket_path)
            .await
            .with_context(|| format!("unable to remove empty bucket {:?}", bucket_path))?;
    } else {
        let new_text: String = retained_payloads
            .iter()
            .map(|payload| bucket::format_record(payload))
            .collect();
        fs.atomic_write(bucket_path, new_text.as_bytes())
            .await
            .with_context(|| format!("unable to rewrite bucket {:?}", bucket_path))?;
    }

    log::debug!(
        "rebuild_index: {:?} kept {} of {} parsed entries",
        bucket_path,
        retained_payloads.len(),
        parsed.len(),
    );

    Ok(stats)
}

/// Verifies a single candidate entry's content: stat, size check, then a
/// per-digest claim before streaming the integrity check. Returns whether
/// the entry is retained; mutates `stats` with the accounting for whichever
/// outcome occurred.
async fn verify_entry_content(
    fs: &dyn CacheFs,
    checker: &dyn IntegrityChecker,
    layout: &CacheLayout,
    verified: &VerifiedMap,
    entry: &Entry,
    stats: &mut Stats,
) -> Result<bool> {
    let digest = entry.integrity.strongest();
    let path = content_store::content_path(layout, digest);

    let meta = match fs.metadata(&path).await {
        Ok(meta) => meta,
        Err(err) if is_not_found(&err) => {
            stats.rejected_entries += 1;
            stats.missing_content += 1;
            return Ok(false);
        }
        Err(err) => {
            return Err(anyhow::Error::new(err).context(format!("stat failed for {:?}", path)))
        }
    };

    if let Some(expected_size) = entry.size {
        if expected_size != meta.len {
            reject_bad_content(fs, &path, meta.len, stats).await?;
            return Ok(false);
        }
    }

    match claim_digest(verified, &path).await {
        Claim::AlreadyDone => Ok(true),
        Claim::Wait => unreachable!("claim_digest resolves waits internally"),
        Claim::GoVerify => match checker.check_stream(fs, &path, digest).await {
            Ok(()) => {
                finish_claim(verified, &path, meta.len).await;
                stats.verified_content += 1;
                stats.kept_size += meta.len;
                Ok(true)
            }
            Err(IntegrityError::Mismatch) => {
                abandon_claim(verified, &path).await;
                reject_bad_content(fs, &path, meta.len, stats).await?;
                Ok(false)
            }
            Err(IntegrityError::Io(err)) => {
                abandon_claim(verified, &path).await;
                Err(anyhow::Error::new(err)
                    .context(format!("integrity check failed for {:?}", path)))
            }
        },
    }
}

/// Claims the right to verify `path`'s digest, blocking (cooperatively)
/// until either this task wins the claim or an already-completed
/// verification is observed.
async fn claim_digest(verified: &VerifiedMap, path: &Path) -> Claim {
    loop {
        let mut guard = verified.lock().await;
        match guard.get(path) {
            Some(DigestState::Done(_)) => return Claim::AlreadyDone,
            Some(DigestState::InProgress) => {
                drop(guard);
                tokio::task::yield_now().await;
                continue;
            }
            None => {
                guard.insert(path.to_path_buf(), DigestState::InProgress);
                return Claim::GoVerify;
            }
        }
    }
}

async fn finish_claim(verified: &VerifiedMap, path: &Path, size: u64) {
    verified
        .lock()
        .await
        .insert(path.to_path_buf(), DigestState::Done(size));
}

async fn abandon_claim(verified: &VerifiedMap, path: &Path) {
    verified.lock().await.remove(path);
}

async fn reject_bad_content(
    fs: &dyn CacheFs,
    path: &Path,
    actual_size: u64,
    stats: &mut Stats,
) -> Result<()> {
    fs.remove_file(path)
        .await
        .with_context(|| format!("unable to remove bad content {:?}", path))?;
    log::warn!("reclaiming {:?}: content does not match its digest", path);
    stats.rejected_entries += 1;
    stats.missing_content += 1;
    stats.bad_content_count += 1;
    stats.reclaimed_count += 1;
    stats.reclaimed_size += actual_size;
    Ok(())
}
