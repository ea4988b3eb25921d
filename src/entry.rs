//! The parsed payload of a bucket record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::digest::Integrity;

/// Logical identity is `key`; among several records for the same key in a
/// bucket, the one with the greatest `time` is the effective entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub key: String,
    pub integrity: Integrity,
    pub time: i64,
    #[serde(default)]
    pub metadata: Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<u64>,
}
