use crate::error::{IndexerError, Result};
use greppy_vector_store::{fingerprint_bytes, Fingerprint};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Raw bytes of one scanned file plus its digest
#[derive(Debug, Clone)]
pub struct HashedFile {
    pub path: PathBuf,
    /// Root-relative, '/'-separated
    pub relative: String,
    pub fingerprint: Fingerprint,
    pub mtime_ms: u64,
    pub bytes: Vec<u8>,
}

/// SHA-256 of the file's raw bytes
pub async fn fingerprint(path: &Path) -> Result<Fingerprint> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| IndexerError::io_unavailable(path.display().to_string(), e))?;
    Ok(fingerprint_bytes(&bytes))
}

pub async fn read_and_hash(path: PathBuf, relative: String) -> Result<HashedFile> {
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => return Err(IndexerError::io_unavailable(relative, e)),
    };
    let mtime_ms = tokio::fs::metadata(&path)
        .await
        .ok()
        .and_then(|meta| meta.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .and_then(|d| u64::try_from(d.as_millis()).ok())
        .unwrap_or(0);

    Ok(HashedFile {
        fingerprint: fingerprint_bytes(&bytes),
        path,
        relative,
        mtime_ms,
        bytes,
    })
}
