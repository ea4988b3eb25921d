//! Accounting record returned by [`crate::verify`].

use serde::{Deserialize, Serialize};

/// Tallies produced by a single verification run. Field names are part of
/// the public API contract and are serialized as camelCase JSON.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Distinct blobs whose integrity was re-checked and passed.
    pub verified_content: u64,
    /// Blobs deleted from the content store.
    pub reclaimed_count: u64,
    /// Byte sum of deleted blobs.
    pub reclaimed_size: u64,
    /// Blobs deleted because their content did not match their digest.
    pub bad_content_count: u64,
    /// Byte sum of retained blobs.
    pub kept_size: u64,
    /// Entries referencing a blob that was absent or invalid.
    pub missing_content: u64,
    /// Entries removed from the index (filtered, shadowed, torn, or missing content).
    pub rejected_entries: u64,
    /// Entries retained in the rebuilt index.
    pub total_entries: u64,
    /// Epoch milliseconds when the run started.
    pub start_time: i64,
    /// Epoch milliseconds when the run finished.
    pub end_time: i64,
    /// `end_time - start_time`, in milliseconds.
    pub run_time: i64,
}

impl Stats {
    pub(crate) fn starting_at(start_time: i64) -> Self {
        Stats {
            start_time,
            ..Default::default()
        }
    }

    /// Folds the counters of `other` into `self`; used to merge the partial
    /// stats produced by independently processed buckets.
    pub(crate) fn merge(&mut self, other: Stats) {
        self.verified_content += other.verified_content;
        self.reclaimed_count += other.reclaimed_count;
        self.reclaimed_size += other.reclaimed_size;
        self.bad_content_count += other.bad_content_count;
        self.kept_size += other.kept_size;
        self.missing_content += other.missing_content;
        self.rejected_entries += other.rejected_entries;
        self.total_entries += other.total_entries;
    }
}
