//! Bucket path derivation and the newline-delimited `<hash>\t<payload>`
//! record format.

use std::hash::Hasher;
use std::path::{Path, PathBuf};

use siphasher::sip::SipHasher13;

use crate::digest::hex_encode;
use crate::layout::CacheLayout;

/// Fixed key so `hashKey` is stable across processes and runs; callers that
/// need to force a hash collision for testing swap this out via
/// `hash_key_with`.
const SIP_KEY: (u64, u64) = (0xcace_d17e_5ead_beef, 0x1234_5678_9abc_def0);

/// Stable hash used in bucket path derivation.
pub fn hash_key(key: &str) -> u64 {
    hash_key_with(SIP_KEY, key)
}

pub fn hash_key_with(sip_key: (u64, u64), key: &str) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(sip_key.0, sip_key.1);
    hasher.write(key.as_bytes());
    hasher.finish()
}

/// Deterministic path for a user key's bucket file:
/// `index-v<N>/<shard>/<shard>/<bucket>`.
pub fn bucket_path(layout: &CacheLayout, key: &str) -> PathBuf {
    bucket_path_for_hash(layout, hash_key(key))
}

pub fn bucket_path_for_hash(layout: &CacheLayout, hashed: u64) -> PathBuf {
    let hex = format!("{:016x}", hashed);
    layout
        .index_dir
        .join(&hex[0..2])
        .join(&hex[2..4])
        .join(&hex[4..])
}

/// Checksum over `payload`, used to prefix bucket records and detect torn
/// or corrupted lines.
pub fn hash_entry(payload: &[u8]) -> String {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    format!("{:08x}", hasher.finalize())
}

/// Formats a single bucket record, including its leading newline.
pub fn format_record(payload: &str) -> String {
    format!("\n{}\t{}", hash_entry(payload.as_bytes()), payload)
}

/// A bucket line split at the first tab, before hash verification.
pub struct RawRecord<'a> {
    pub claimed_hash: &'a str,
    pub payload: &'a str,
}

/// Splits bucket text into non-empty, tab-delimited lines. Lines with no
/// tab at all (pure trailing garbage) are dropped outright.
pub fn split_records(text: &str) -> Vec<RawRecord<'_>> {
    text.split('\n')
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            line.split_once('\t')
                .map(|(claimed_hash, payload)| RawRecord {
                    claimed_hash,
                    payload,
                })
        })
        .collect()
}

/// A torn record is one whose claimed hash disagrees with its payload's
/// recomputed hash.
pub fn is_torn(record: &RawRecord<'_>) -> bool {
    !record
        .claimed_hash
        .eq_ignore_ascii_case(&hash_entry(record.payload.as_bytes()))
}

/// Recursively yields every regular file under `dir` (bucket or content
/// store enumeration). Implemented by hand rather than with a sync
/// directory-walking crate, since recursion must go through the injected
/// `CacheFs` so tests can substitute an in-memory fake.
pub async fn list_files_recursive(
    fs: &dyn crate::fs::CacheFs,
    dir: &Path,
) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        for entry in fs.read_dir(&current).await? {
            if entry.is_dir {
                stack.push(entry.path);
            } else if entry.is_file {
                out.push(entry.path);
            }
        }
    }

    Ok(out)
}

/// Removes now-empty directories under `root`, bottom-up, never removing
/// `root` itself.
///
/// Implemented iteratively (collect every subdirectory breadth-first, then
/// revisit deepest-first) rather than recursively, to avoid pulling in an
/// async-recursion helper crate for a single call site.
pub async fn prune_empty_dirs(
    fs: &dyn crate::fs::CacheFs,
    root: &Path,
) -> std::io::Result<()> {
    let mut all_dirs = Vec::new();
    let mut stack = vec![(root.to_path_buf(), 0usize)];

    while let Some((dir, depth)) = stack.pop() {
        for entry in fs.read_dir(&dir).await? {
            if entry.is_dir {
                stack.push((entry.path.clone(), depth + 1));
                all_dirs.push((entry.path, depth + 1));
            }
        }
    }

    // Deepest directories first, so a parent only gets checked once its
    // children have already been pruned.
    all_dirs.sort_by(|a, b| b.1.cmp(&a.1));

    for (dir, _depth) in all_dirs {
        if fs.read_dir(&dir).await?.is_empty() {
            fs.remove_empty_dir(&dir).await?;
        }
    }

    Ok(())
}

/// Lowercase hex of a siphash; exposed for callers (e.g. the CLI's `status`
/// output) that want a readable bucket identifier.
pub fn bucket_hex(hashed: u64) -> String {
    hex_encode(&hashed.to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torn_record_is_detected_by_hash_mismatch() {
        let good = format_record("hello");
        let records = split_records(&good);
        assert_eq!(records.len(), 1);
        assert!(!is_torn(&records[0]));

        let torn = "\nbadhash\thello";
        let records = split_records(torn);
        assert_eq!(records.len(), 1);
        assert!(is_torn(&records[0]));
    }

    #[test]
    fn split_records_drops_lines_without_a_tab() {
        let text = "\nnotab-garbage\n1234abcd\tpayload";
        let records = split_records(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload, "payload");
    }

    #[test]
    fn hash_key_is_stable_across_calls() {
        assert_eq!(hash_key("a"), hash_key("a"));
        assert_ne!(hash_key("a"), hash_key("b"));
    }
}
