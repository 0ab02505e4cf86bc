use std::time::Duration;

use protocol::{
    message::{NodeMeta, Reply, Request, RetrieveChunkBody, StoreChunkBody},
    wire,
};
use utilities::logger::{instrument, tracing};
use utilities::result::{DfsError, Result};

/// Data-plane client for chunk servers: the JSON/`READY`/payload handshakes
/// of `store_chunk` and `retrieve_chunk`, one connection per transfer.
#[derive(Debug, Clone)]
pub struct ChunkserverService {
    io_timeout: Duration,
}

impl ChunkserverService {
    pub fn new(io_timeout: Duration) -> Self {
        ChunkserverService { io_timeout }
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn store_chunk(
        &self,
        node: &NodeMeta,
        chunk_id: &str,
        data: &[u8],
    ) -> Result<StoreChunkBody> {
        let mut stream = wire::connect(&node.addr(), self.io_timeout).await?;
        wire::send_message(
            &mut stream,
            &Request::StoreChunk {
                chunk_id: chunk_id.to_owned(),
                chunk_size: data.len() as u64,
            },
            self.io_timeout,
        )
        .await?;
        wire::await_ready(&mut stream, self.io_timeout).await?;
        wire::write_payload(&mut stream, data, self.io_timeout).await?;
        let reply: Reply<StoreChunkBody> = wire::read_message(&mut stream, self.io_timeout).await?;
        let body = reply.into_result()?;
        // the server hashes what it received; a mismatch means corruption in flight
        let local_checksum = format!("{:x}", md5::compute(data));
        if body.checksum != local_checksum {
            return Err(DfsError::Internal(format!(
                "checksum mismatch for {chunk_id}: sent {local_checksum}, stored {}",
                body.checksum
            )));
        }
        Ok(body)
    }

    #[instrument(skip(self))]
    pub async fn retrieve_chunk(&self, node: &NodeMeta, chunk_id: &str) -> Result<Vec<u8>> {
        let mut stream = wire::connect(&node.addr(), self.io_timeout).await?;
        wire::send_message(
            &mut stream,
            &Request::RetrieveChunk {
                chunk_id: chunk_id.to_owned(),
            },
            self.io_timeout,
        )
        .await?;
        let reply: Reply<RetrieveChunkBody> =
            wire::read_message(&mut stream, self.io_timeout).await?;
        let body = reply.into_result()?;
        wire::send_ready(&mut stream, self.io_timeout).await?;
        wire::read_payload(&mut stream, body.size, self.io_timeout).await
    }
}
