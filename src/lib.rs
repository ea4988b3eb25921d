//! Verification and garbage-collection engine for a content-addressed
//! local cache: a directory tree of bucketed index files pointing at
//! content-addressed blobs, as used by content-addressed package caches.
//!
//! The entry point is [`verify`], which runs the full six-phase pipeline
//! against a cache root and returns a [`Stats`] summary. [`last_run`] reads
//! back the timestamp of the most recent successful run without doing any
//! work.

mod bucket;
mod content_store;
mod digest;
mod engine;
mod entry;
mod error;
mod fs;
mod integrity;
mod layout;
mod options;
mod stats;

pub use bucket::{bucket_path, format_record, hash_entry, hash_key};
pub use content_store::content_path;
pub use digest::{Algorithm, Digest, Integrity};
pub use engine::{last_run, verify, verify_with};
pub use entry::Entry;
pub use error::VerifyError;
pub use fs::{CacheFs, DirEntryInfo, FileMeta, LockedFile, TokioFs};
pub use integrity::{IntegrityChecker, IntegrityError, Sha2Checker};
pub use layout::CacheLayout;
pub use options::{EntryFilter, VerifyOptions};
pub use stats::Stats;
