//! Public error type.
//!
//! Internal phase code composes errors with `anyhow`, the way the rest of
//! this codebase does; the driver narrows the final `anyhow::Error` down to
//! a `VerifyError` only at the crate boundary.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    /// The cache root could not be created or accessed.
    #[error("cache root '{path}' is not usable: {source}")]
    CacheRootUnusable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Verification was cancelled before it could finish; `_lastverified`
    /// was not updated.
    #[error("verification was cancelled")]
    Cancelled,

    /// Any other unexpected I/O or integrity-checker error (category 5 in
    /// the error taxonomy). Aborts the run.
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}
