//! Streaming integrity verification against an expected [`Digest`].

use std::path::Path;

use async_trait::async_trait;
use sha1::Sha1;
use sha2::{Digest as _, Sha256, Sha512};

use crate::digest::{Algorithm, Digest};
use crate::fs::CacheFs;

#[derive(Debug)]
pub enum IntegrityError {
    Mismatch,
    Io(std::io::Error),
}

impl std::fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityError::Mismatch => write!(f, "content does not match its digest"),
            IntegrityError::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for IntegrityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IntegrityError::Mismatch => None,
            IntegrityError::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for IntegrityError {
    fn from(err: std::io::Error) -> Self {
        IntegrityError::Io(err)
    }
}

/// Given a stream (here: a whole-file read through the injected [`CacheFs`])
/// and an expected digest, yields success or a mismatch error.
#[async_trait]
pub trait IntegrityChecker: Send + Sync {
    async fn check_stream(
        &self,
        fs: &dyn CacheFs,
        path: &Path,
        expected: &Digest,
    ) -> Result<(), IntegrityError>;
}

/// Default checker, backed by the RustCrypto `sha1`/`sha2` crates.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha2Checker;

#[async_trait]
impl IntegrityChecker for Sha2Checker {
    async fn check_stream(
        &self,
        fs: &dyn CacheFs,
        path: &Path,
        expected: &Digest,
    ) -> Result<(), IntegrityError> {
        let data = fs.read(path).await?;

        let computed = match expected.algorithm {
            Algorithm::Sha1 => Sha1::digest(&data).to_vec(),
            Algorithm::Sha256 => Sha256::digest(&data).to_vec(),
            Algorithm::Sha512 => Sha512::digest(&data).to_vec(),
        };

        if computed == expected.bytes {
            Ok(())
        } else {
            Err(IntegrityError::Mismatch)
        }
    }
}
