//! The six-phase verification pipeline: MarkStart, FixPerms,
//! GarbageCollectTmp, RebuildIndex, GarbageCollectContent, WriteLastVerified.

mod content_gc;
mod driver;
mod last_verified;
mod mark;
mod rebuild_index;
mod tmp_gc;

pub use driver::{verify, verify_with};
pub use last_verified::last_run;
