use std::path::{Path, PathBuf};

use protocol::chunk_id;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{info, instrument, warn};
use utilities::result::{DfsError, Result};

/// Directory-backed [`ChunkStore`]: one file per chunk, named by its chunk
/// identifier. In-flight writes go to a `staged/` subdirectory and are
/// renamed into place on success, so a crashed or failed transfer never
/// leaves a half-written chunk visible.
#[derive(Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| DfsError::Internal(format!("cannot create storage root: {e}")))?;
        fs::create_dir_all(root.join("staged"))
            .await
            .map_err(|e| DfsError::Internal(format!("cannot create staging dir: {e}")))?;
        info!(root = %root.display(), "Opened chunk store");
        Ok(DirStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn committed_path(&self, chunk_id: &str) -> PathBuf {
        self.root.join(chunk_id)
    }

    fn staged_path(&self, chunk_id: &str) -> PathBuf {
        self.root.join("staged").join(chunk_id)
    }
}

impl super::ChunkStore for DirStore {
    #[instrument(name = "dir_store_write", skip(self, data))]
    async fn write(&self, chunk_id: &str, data: &[u8]) -> Result<u64> {
        let staged = self.staged_path(chunk_id);
        let result = async {
            let mut file = File::create(&staged).await?;
            file.write_all(data).await?;
            file.flush().await?;
            drop(file);
            fs::rename(&staged, self.committed_path(chunk_id)).await?;
            Ok::<_, DfsError>(())
        }
        .await;
        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_file(&staged).await {
                warn!(%chunk_id, error = %cleanup, "Could not remove staged file");
            }
            return Err(e);
        }
        Ok(data.len() as u64)
    }

    #[instrument(name = "dir_store_read", skip(self))]
    async fn read(&self, chunk_id: &str) -> Result<Vec<u8>> {
        match fs::read(self.committed_path(chunk_id)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DfsError::ChunkMissing(chunk_id.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, chunk_id: &str) -> Result<bool> {
        let path = self.committed_path(chunk_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(name = "dir_store_enumerate", skip(self))]
    async fn available_chunks(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut chunk_ids = vec![];
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry
                .file_name()
                .into_string()
                .map_err(|_| DfsError::Internal("non-utf8 file name in store".to_owned()))?;
            // stray files that don't follow the chunk grammar are not inventory
            if chunk_id::conforms(&name) {
                chunk_ids.push(name);
            }
        }
        Ok(chunk_ids)
    }

    fn available_space(&self) -> Result<(u64, u64)> {
        let stats = nix::sys::statvfs::statvfs(&self.root)
            .map_err(|e| DfsError::Internal(format!("statvfs failed: {e}")))?;
        let fragment = stats.fragment_size() as u64;
        let free = stats.blocks_available() as u64 * fragment;
        let total = stats.blocks() as u64 * fragment;
        Ok((free, total))
    }
}
