//! Streaming content digests.
//!
//! Files are hashed in fixed-size chunks so memory stays bounded no matter
//! how large an asset is.

use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Computes the content hash used as a record's dedup key.
#[async_trait]
pub trait ContentDigester: Send + Sync {
    /// Lowercase hex digest of the file at `path`
    async fn digest(&self, path: &Path) -> std::io::Result<String>;
}

/// SHA-256 over fixed-size reads
#[derive(Debug, Clone)]
pub struct Sha256Digester {
    chunk_size: usize,
}

impl Sha256Digester {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Default for Sha256Digester {
    fn default() -> Self {
        Self::new(1_048_576)
    }
}

#[async_trait]
impl ContentDigester for Sha256Digester {
    async fn digest(&self, path: &Path) -> std::io::Result<String> {
        compute_file_hash(path, self.chunk_size).await
    }
}

/// Compute the SHA-256 of a file, reading at most `chunk_size` bytes at a time
pub async fn compute_file_hash(path: &Path, chunk_size: usize) -> std::io::Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_size.max(1)];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
