use std::path::Path;

use protocol::chunk_id;
use utilities::logger::{info, instrument, tracing, warn};
use utilities::result::{DfsError, Result};

use crate::{
    chunk_joiner::ChunkJoiner, chunkserver_service::ChunkserverService,
    nameserver_service::NameserverService,
};

pub struct DownloadHandler {
    nameserver: NameserverService,
    chunkserver: ChunkserverService,
}

impl DownloadHandler {
    pub fn new(nameserver: NameserverService, chunkserver: ChunkserverService) -> Self {
        DownloadHandler {
            nameserver,
            chunkserver,
        }
    }

    /// Download pipeline: resolve locations, then walk chunks in ascending
    /// index order trying each listed replica until one serves the bytes.
    /// Any unservable chunk aborts and removes the partial output.
    #[instrument(skip(self))]
    pub async fn download(&self, remote_name: &str, local_path: &Path) -> Result<String> {
        let init = self.nameserver.download_init(remote_name).await?;
        info!(
            %remote_name,
            filesize = init.filesize,
            num_chunks = init.chunk_locations.len(),
            "Download planned"
        );
        let joiner = ChunkJoiner::create(local_path, init.filesize, init.chunk_size).await?;

        let mut indexes: Vec<u64> = init.chunk_locations.keys().copied().collect();
        indexes.sort_unstable();
        for index in indexes {
            let chunk_id = chunk_id::format(remote_name, index);
            let mut data = None;
            for node in &init.chunk_locations[&index] {
                match self.chunkserver.retrieve_chunk(node, &chunk_id).await {
                    Ok(bytes) => {
                        data = Some(bytes);
                        break;
                    }
                    Err(e) => {
                        warn!(node_id = %node.node_id, error = %e, "Replica read failed")
                    }
                }
            }
            let Some(bytes) = data else {
                joiner.abort().await;
                return Err(DfsError::Internal(format!(
                    "no replica of chunk {index} could be read"
                )));
            };
            if let Err(e) = joiner.join_chunk(index, &bytes).await {
                joiner.abort().await;
                return Err(e);
            }
        }
        Ok(format!(
            "{remote_name} downloaded to {} ({} bytes)",
            local_path.display(),
            init.filesize
        ))
    }
}
