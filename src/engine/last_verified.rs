//! Phase 6 (WriteLastVerified) and the public `last_run` read operation.

use anyhow::{Context, Result};

use crate::fs::{is_not_found, CacheFs};
use crate::layout::CacheLayout;

/// Persists the wall-clock time the run finished, so a subsequent call to
/// `last_run` can report it. Written only after every earlier phase has
/// succeeded - a cancelled or failed run leaves the previous marker in
/// place untouched. Staged through `tmp/` before the rename, per the
/// cache's write-to-temp-then-rename convention.
pub async fn write_last_verified(fs: &dyn CacheFs, layout: &CacheLayout, end_time: i64) -> Result<()> {
    fs.atomic_write_via(
        &layout.last_verified_path,
        &layout.tmp_dir,
        end_time.to_string().as_bytes(),
    )
    .await
    .with_context(|| format!("unable to write {:?}", layout.last_verified_path))?;
    Ok(())
}

/// Reads the epoch-millisecond timestamp of the most recent successful
/// `verify` run, or `None` if the cache has never been verified.
pub async fn last_run(fs: &dyn CacheFs, layout: &CacheLayout) -> Result<Option<i64>> {
    let raw = match fs.read(&layout.last_verified_path).await {
        Ok(raw) => raw,
        Err(err) if is_not_found(&err) => return Ok(None),
        Err(err) => {
            return Err(anyhow::Error::new(err)
                .context(format!("unable to read {:?}", layout.last_verified_path)))
        }
    };

    let text = String::from_utf8_lossy(&raw);
    let millis: i64 = text
        .trim()
        .parse()
        .with_context(|| format!("malformed timestamp in {:?}", layout.last_verified_path))?;
    Ok(Some(millis))
}
