//! Content hashing for uploaded documents.
//!
//! The hex SHA-256 of the raw file bytes doubles as the document's
//! namespace, so identical uploads land on the same index partition.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;

use super::IngestError;

const READ_BUFFER: usize = 8192;

/// Streaming SHA-256 over the file at `path`, rendered as lowercase hex.
///
/// Reads in fixed-size blocks; the file is never fully resident.
pub async fn hash_file(path: &Path) -> Result<String, IngestError> {
    let mut file = fs::File::open(path)
        .await
        .map_err(|source| IngestError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|source| IngestError::Io {
                path: path.display().to_string(),
                source,
            })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
