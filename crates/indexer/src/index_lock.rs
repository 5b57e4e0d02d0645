use crate::{IndexerError, Result};
use fs2::FileExt;
use std::path::Path;
use std::time::Instant;

/// Cross-process single-writer guard; released on drop
pub(crate) struct IndexWriteLock {
    file: std::fs::File,
}

impl Drop for IndexWriteLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub(crate) async fn acquire_index_write_lock(path: &Path) -> Result<IndexWriteLock> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let path = path.to_path_buf();
    let lock = tokio::task::spawn_blocking(move || -> Result<IndexWriteLock> {
        use std::fs::OpenOptions;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| {
                IndexerError::Other(format!("open index lock {}: {err}", path.display()))
            })?;

        let start = Instant::now();
        file.lock_exclusive().map_err(|err| {
            IndexerError::Other(format!("acquire index lock {}: {err}", path.display()))
        })?;
        let waited = start.elapsed().as_millis();
        if waited > 0 {
            log::debug!("Waited {waited}ms for index lock {}", path.display());
        }

        Ok(IndexWriteLock { file })
    })
    .await
    .map_err(|err| IndexerError::Other(format!("join index lock task: {err}")))??;

    Ok(lock)
}
