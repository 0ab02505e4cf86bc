use std::path::{Path, PathBuf};

use tokio::{
    fs::OpenOptions,
    io::{AsyncReadExt, AsyncSeekExt},
};
use utilities::result::{DfsError, Result};

/// Reads a local file as fixed-size chunks. Each read opens its own
/// descriptor, so chunks can be pulled in any order.
pub struct FileChunker {
    path: PathBuf,
    chunk_size: u64,
    file_size: u64,
}

impl FileChunker {
    pub async fn open(path: &Path, chunk_size: u64) -> Result<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| DfsError::Internal(format!("cannot stat {}: {e}", path.display())))?;
        if metadata.is_dir() {
            return Err(DfsError::Internal(format!(
                "{} is a directory",
                path.display()
            )));
        }
        Ok(FileChunker {
            path: path.to_path_buf(),
            chunk_size,
            file_size: metadata.len(),
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn num_chunks(&self) -> u64 {
        self.file_size.div_ceil(self.chunk_size)
    }

    /// Bytes of chunk `index`; the final chunk comes back short.
    pub async fn read_chunk(&self, index: u64) -> Result<Vec<u8>> {
        let mut file = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .await
            .map_err(|e| DfsError::Internal(format!("cannot open {}: {e}", self.path.display())))?;
        file.seek(std::io::SeekFrom::Start(index * self.chunk_size))
            .await
            .map_err(|e| DfsError::Internal(format!("seek to chunk {index} failed: {e}")))?;
        let mut data = Vec::with_capacity(self.chunk_size as usize);
        file.take(self.chunk_size)
            .read_to_end(&mut data)
            .await
            .map_err(|e| DfsError::Internal(format!("read of chunk {index} failed: {e}")))?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn chunker_for(content: &[u8], chunk_size: u64) -> (FileChunker, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.bin");
        tokio::fs::write(&path, content).await.unwrap();
        (FileChunker::open(&path, chunk_size).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn splits_across_chunk_boundaries() {
        let content: Vec<u8> = (0..10u8).collect();
        let (chunker, _dir) = chunker_for(&content, 4).await;
        assert_eq!(chunker.num_chunks(), 3);
        assert_eq!(chunker.read_chunk(0).await.unwrap(), &content[0..4]);
        assert_eq!(chunker.read_chunk(1).await.unwrap(), &content[4..8]);
        assert_eq!(chunker.read_chunk(2).await.unwrap(), &content[8..10]);
    }

    #[tokio::test]
    async fn exact_multiple_has_no_tail_chunk() {
        let content = vec![7u8; 8];
        let (chunker, _dir) = chunker_for(&content, 4).await;
        assert_eq!(chunker.num_chunks(), 2);
        assert_eq!(chunker.read_chunk(1).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn empty_file_has_no_chunks() {
        let (chunker, _dir) = chunker_for(b"", 4).await;
        assert_eq!(chunker.file_size(), 0);
        assert_eq!(chunker.num_chunks(), 0);
    }

    #[tokio::test]
    async fn directories_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileChunker::open(dir.path(), 4).await.is_err());
    }
}
