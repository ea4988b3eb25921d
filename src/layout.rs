//! Fixed knowledge of where things live under a cache root.

use std::path::{Path, PathBuf};

/// Bumped whenever the on-disk index/content tree format changes.
pub const CACHE_VERSION: u32 = 1;

#[derive(Clone, Debug)]
pub struct CacheLayout {
    pub root: PathBuf,
    pub index_dir: PathBuf,
    pub content_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub last_verified_path: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let index_dir = root.join(format!("index-v{}", CACHE_VERSION));
        let content_dir = root.join(format!("content-v{}", CACHE_VERSION));
        let tmp_dir = root.join("tmp");
        let last_verified_path = root.join("_lastverified");
        Self {
            root,
            index_dir,
            content_dir,
            tmp_dir,
            last_verified_path,
        }
    }
}
