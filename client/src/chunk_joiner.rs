use std::path::{Path, PathBuf};

use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use utilities::logger::warn;
use utilities::result::{DfsError, Result};

/// Reassembles a download: the output file is created up front at its final
/// size, then each chunk is written at `index * chunk_size`. `abort` removes
/// the partial file so a failed download leaves nothing behind.
pub struct ChunkJoiner {
    path: PathBuf,
    chunk_size: u64,
}

impl ChunkJoiner {
    pub async fn create(path: &Path, file_size: u64, chunk_size: u64) -> Result<Self> {
        let mut file = tokio::fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(path)
            .await
            .map_err(|e| DfsError::Internal(format!("cannot create {}: {e}", path.display())))?;
        if file_size > 0 {
            // reserve the full extent so out-of-order chunk writes land cleanly
            file.seek(std::io::SeekFrom::Start(file_size - 1))
                .await
                .map_err(|e| DfsError::Internal(format!("cannot reserve output space: {e}")))?;
            file.write_all(&[0])
                .await
                .map_err(|e| DfsError::Internal(format!("cannot reserve output space: {e}")))?;
        }
        Ok(ChunkJoiner {
            path: path.to_path_buf(),
            chunk_size,
        })
    }

    pub async fn join_chunk(&self, index: u64, data: &[u8]) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&self.path)
            .await
            .map_err(|e| DfsError::Internal(format!("cannot open {}: {e}", self.path.display())))?;
        file.seek(std::io::SeekFrom::Start(index * self.chunk_size))
            .await
            .map_err(|e| DfsError::Internal(format!("seek for chunk {index} failed: {e}")))?;
        file.write_all(data)
            .await
            .map_err(|e| DfsError::Internal(format!("write of chunk {index} failed: {e}")))?;
        Ok(())
    }

    pub async fn abort(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "Could not remove partial download");
        }
    }
}
