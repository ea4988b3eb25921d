//! Shared fixture-building helpers for the scenario tests, in the style of
//! a small `cargo-test-support`: build a seeded cache root from a
//! declarative list of entries, then hand it to `verify`.

use std::path::PathBuf;

use cache_verify::{bucket_path, content_path, format_record, Algorithm, CacheLayout, Digest, Entry, Integrity};
use sha2::{Digest as _, Sha512};

pub const CONTENT: &[u8] = b"foobarbaz";

pub fn integrity_of(content: &[u8]) -> Integrity {
    Integrity::single(Digest::new(Algorithm::Sha512, Sha512::digest(content).to_vec()))
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub layout: CacheLayout,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = CacheLayout::new(dir.path());
        Fixture { dir, layout }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Writes a content blob under the content store, keyed by its strongest
    /// digest. Returns the path it was written to.
    pub async fn write_blob(&self, content: &[u8]) -> PathBuf {
        let integrity = integrity_of(content);
        let path = content_path(&self.layout, integrity.strongest());
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    /// Appends one entry record to `key`'s bucket, writing the blob too.
    pub async fn seed_entry(&self, key: &str, content: &[u8], metadata: serde_json::Value, time: i64) {
        self.write_blob(content).await;
        self.append_record(key, content, metadata, time).await;
    }

    /// Appends an entry record without (re)writing the blob - useful for a
    /// second insert that shadows an earlier one.
    pub async fn append_record(&self, key: &str, content: &[u8], metadata: serde_json::Value, time: i64) {
        let entry = Entry {
            key: key.to_string(),
            integrity: integrity_of(content),
            time,
            metadata,
            size: Some(content.len() as u64),
        };
        let payload = serde_json::to_string(&entry).unwrap();
        self.append_raw(key, &format_record(&payload)).await;
    }

    /// Appends arbitrary raw bytes (e.g. torn garbage) straight to a bucket.
    pub async fn append_raw(&self, key: &str, raw: &str) {
        let path = bucket_path(&self.layout, key);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        let mut existing = tokio::fs::read(&path).await.unwrap_or_default();
        existing.extend_from_slice(raw.as_bytes());
        tokio::fs::write(&path, existing).await.unwrap();
    }

    pub async fn bucket_text(&self, key: &str) -> String {
        let path = bucket_path(&self.layout, key);
        String::from_utf8(tokio::fs::read(&path).await.unwrap_or_default()).unwrap()
    }
}
