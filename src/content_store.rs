//! Content-store path derivation: `content-v<N>/<algo>/<shard>/<shard>/<tail>`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Error};

use crate::digest::{hex_decode, Algorithm, Digest};
use crate::layout::CacheLayout;

/// Deterministic path for a blob, keyed by the digest's canonical
/// (strongest) algorithm form.
pub fn content_path(layout: &CacheLayout, digest: &Digest) -> PathBuf {
    let hex = digest.hex();
    layout
        .content_dir
        .join(digest.algorithm.as_str())
        .join(&hex[0..2])
        .join(&hex[2..4])
        .join(&hex[4..])
}

/// Inverse of [`content_path`]: recovers the digest a content-store file
/// was stored under from its path, for garbage-collection's orphan check.
pub fn digest_from_path(layout: &CacheLayout, path: &Path) -> Result<Digest, Error> {
    let rel = path
        .strip_prefix(&layout.content_dir)
        .with_context(|| format!("{:?} is not under the content store", path))?;

    let mut components: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str().unwrap_or_default())
        .collect();

    if components.len() != 4 {
        bail!("malformed content path {:?}", path);
    }

    let tail = components.pop().unwrap();
    let shard2 = components.pop().unwrap();
    let shard1 = components.pop().unwrap();
    let algo = components.pop().unwrap();

    let algorithm: Algorithm = algo
        .parse()
        .with_context(|| format!("malformed content path {:?}", path))?;
    let hex = format!("{}{}{}", shard1, shard2, tail);
    let bytes = hex_decode(&hex).with_context(|| format!("malformed content path {:?}", path))?;

    Ok(Digest::new(algorithm, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::Algorithm;

    #[test]
    fn path_roundtrips_through_digest_from_path() {
        let layout = CacheLayout::new("/cache");
        let digest = Digest::new(Algorithm::Sha256, vec![0xab, 0xcd, 0xef, 0x01, 0x02]);
        let path = content_path(&layout, &digest);
        let recovered = digest_from_path(&layout, &path).unwrap();
        assert_eq!(recovered, digest);
    }
}
