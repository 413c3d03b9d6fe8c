use std::path::{Path, PathBuf};

use serde::Serialize;
use sha1::{Digest, Sha1};
use sha2::Sha512;

use crate::core::error::{PublisherError, PublisherResult};

/// Hashes of one artifact, reported and used for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDigest {
    pub path: PathBuf,
    pub size: u64,
    pub sha1: String,
    pub sha512: String,
}

impl ArtifactDigest {
    pub fn of_bytes(path: &Path, bytes: &[u8]) -> Self {
        let mut sha1 = Sha1::new();
        sha1.update(bytes);
        let mut sha512 = Sha512::new();
        sha512.update(bytes);

        Self {
            path: path.to_path_buf(),
            size: bytes.len() as u64,
            sha1: hex::encode(sha1.finalize()),
            sha512: hex::encode(sha512.finalize()),
        }
    }

    pub async fn compute(path: &Path) -> PublisherResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| PublisherError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::of_bytes(path, &bytes))
    }
}
