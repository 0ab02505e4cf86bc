use utilities::result::Result;

/// Key→blob store backing one chunk server. Writes must be atomic: after a
/// failed `write` the key must not resolve, after a successful one the full
/// blob must.
pub trait ChunkStore {
    /// Persist `data` under `chunk_id`, replacing any previous blob. Returns
    /// the number of bytes written.
    async fn write(&self, chunk_id: &str, data: &[u8]) -> Result<u64>;

    /// Fetch the blob stored under `chunk_id`, `ChunkMissing` if absent.
    async fn read(&self, chunk_id: &str) -> Result<Vec<u8>>;

    /// Remove the blob. Returns whether the key was present.
    async fn delete(&self, chunk_id: &str) -> Result<bool>;

    /// Enumerate every chunk identifier currently held.
    async fn available_chunks(&self) -> Result<Vec<String>>;

    /// `(free_bytes, total_bytes)` of the underlying medium.
    fn available_space(&self) -> Result<(u64, u64)>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use utilities::result::ErrorKind;

    /// Contract test any store implementation has to pass.
    pub async fn store_contract(store: impl ChunkStore) -> Result<()> {
        let chunk_id = "chunk_contract.bin_0";
        let original = b"hello world";

        let written = store.write(chunk_id, original).await?;
        assert_eq!(written as usize, original.len());
        assert_eq!(store.available_chunks().await?, vec![chunk_id.to_owned()]);

        let read_back = store.read(chunk_id).await?;
        assert_eq!(read_back, original);

        // overwrite replaces the blob
        store.write(chunk_id, b"rewritten").await?;
        assert_eq!(store.read(chunk_id).await?, b"rewritten");

        let err = store.read("chunk_contract.bin_9").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChunkMissing);

        assert!(store.delete(chunk_id).await?);
        assert!(!store.delete(chunk_id).await?);
        assert!(store.available_chunks().await?.is_empty());

        let (free, total) = store.available_space()?;
        assert!(total >= free);
        Ok(())
    }
}
