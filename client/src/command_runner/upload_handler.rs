use std::{collections::HashMap, path::Path};

use futures::future::join_all;
use protocol::chunk_id;
use utilities::logger::{info, instrument, tracing, warn};
use utilities::result::{DfsError, Result};

use crate::{
    chunkserver_service::ChunkserverService, file_chunker::FileChunker,
    nameserver_service::NameserverService,
};

pub struct UploadHandler {
    nameserver: NameserverService,
    chunkserver: ChunkserverService,
}

impl UploadHandler {
    pub fn new(nameserver: NameserverService, chunkserver: ChunkserverService) -> Self {
        UploadHandler {
            nameserver,
            chunkserver,
        }
    }

    /// Upload pipeline: plan with the name server, push every chunk to each
    /// assigned replica in parallel, then commit whatever actually landed. A
    /// chunk that lands on no replica aborts the whole upload before the
    /// commit, so a failed upload installs no file record.
    #[instrument(skip(self))]
    pub async fn upload(&self, local_path: &Path, remote_name: &str) -> Result<String> {
        let metadata = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| DfsError::Internal(format!("cannot stat {}: {e}", local_path.display())))?;
        if metadata.is_dir() {
            return Err(DfsError::Internal(format!(
                "{} is a directory",
                local_path.display()
            )));
        }
        let filesize = metadata.len();
        let plan = self.nameserver.upload_init(remote_name, filesize).await?;
        info!(%remote_name, %filesize, num_chunks = plan.num_chunks, "Upload planned");

        let chunker = FileChunker::open(local_path, plan.chunk_size).await?;
        let mut completed: HashMap<String, Vec<String>> = HashMap::new();
        for index in 0..plan.num_chunks {
            let data = chunker.read_chunk(index).await?;
            let assigned = plan
                .chunk_assignments
                .get(&index)
                .cloned()
                .unwrap_or_default();
            let chunk_id = chunk_id::format(remote_name, index);
            let pushes = assigned.iter().map(|node| {
                let chunkserver = self.chunkserver.clone();
                let chunk_id = chunk_id.clone();
                let data = &data;
                async move {
                    match chunkserver.store_chunk(node, &chunk_id, data).await {
                        Ok(_) => Some(node.node_id.clone()),
                        Err(e) => {
                            warn!(node_id = %node.node_id, error = %e, "Replica push failed");
                            None
                        }
                    }
                }
            });
            let acked: Vec<String> = join_all(pushes).await.into_iter().flatten().collect();
            if acked.is_empty() {
                return Err(DfsError::Internal(format!(
                    "chunk {index} was not stored on any assigned chunk server"
                )));
            }
            completed.insert(index.to_string(), acked);
        }

        self.nameserver
            .upload_complete(remote_name, filesize, completed)
            .await?;
        Ok(format!(
            "{remote_name} uploaded: {filesize} bytes in {} chunks",
            plan.num_chunks
        ))
    }
}
