use std::{net::SocketAddr, time::Duration};

use protocol::{
    message::{Ack, Reply, RetrieveChunkBody, StoreChunkBody, Request},
    wire,
};
use storage::{ChunkStore, DirStore};
use tokio::net::{TcpListener, TcpStream};
use utilities::logger::{Instrument, Span, error, info, instrument, tracing, warn};
use utilities::result::{DfsError, Result};

/// Data-plane TCP server: one command per connection, chunk payloads framed
/// by the `READY` handshake around the JSON control messages.
pub struct DataServer {
    listener: TcpListener,
    store: DirStore,
    io_timeout: Duration,
}

impl DataServer {
    pub async fn bind(addr: &str, store: DirStore, io_timeout: Duration) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Chunk server listening");
        Ok(DataServer {
            listener,
            store,
            io_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn serve(self) -> Result<()> {
        loop {
            let (stream, _) = self.listener.accept().await?;
            let store = self.store.clone();
            let io_timeout = self.io_timeout;
            let span = Span::current();
            tokio::spawn(
                async move {
                    Self::handle_connection(stream, store, io_timeout).await;
                }
                .instrument(span),
            );
        }
    }

    async fn handle_connection(mut stream: TcpStream, store: DirStore, io_timeout: Duration) {
        let request = match wire::read_message::<Request>(&mut stream, io_timeout).await {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Unreadable data-plane request");
                let _ =
                    wire::send_message(&mut stream, &Reply::<Ack>::failure(&e), io_timeout).await;
                return;
            }
        };
        let outcome = match request {
            Request::StoreChunk {
                chunk_id,
                chunk_size,
            } => Self::store_chunk(&mut stream, &store, &chunk_id, chunk_size, io_timeout).await,
            Request::RetrieveChunk { chunk_id } => {
                Self::retrieve_chunk(&mut stream, &store, &chunk_id, io_timeout).await
            }
            Request::DeleteChunk { chunk_id } => {
                Self::delete_chunk(&mut stream, &store, &chunk_id, io_timeout).await
            }
            other => Err(DfsError::Internal(format!(
                "control-plane command sent to a chunk server: {other:?}"
            ))),
        };
        if let Err(e) = outcome {
            error!(error = %e, "Data-plane request failed");
            let _ = wire::send_message(&mut stream, &Reply::<Ack>::failure(&e), io_timeout).await;
        }
    }

    /// Two-phase receive: acknowledge with `READY`, take exactly
    /// `chunk_size` raw bytes, persist, answer with the payload's MD5. An
    /// error before the final reply leaves no blob behind (staged writes).
    #[instrument(name = "data_store_chunk", skip(stream, store))]
    async fn store_chunk(
        stream: &mut TcpStream,
        store: &DirStore,
        chunk_id: &str,
        chunk_size: u64,
        io_timeout: Duration,
    ) -> Result<()> {
        wire::send_ready(stream, io_timeout).await?;
        let data = wire::read_payload(stream, chunk_size, io_timeout).await?;
        let checksum = format!("{:x}", md5::compute(&data));
        let size = store.write(chunk_id, &data).await?;
        info!(%chunk_id, %size, "Stored chunk");
        wire::send_message(
            stream,
            &Reply::success(StoreChunkBody {
                chunk_id: chunk_id.to_owned(),
                size,
                checksum,
            }),
            io_timeout,
        )
        .await
    }

    /// Two-phase send: announce the size, wait for the client's `READY`,
    /// then stream the blob.
    #[instrument(name = "data_retrieve_chunk", skip(stream, store))]
    async fn retrieve_chunk(
        stream: &mut TcpStream,
        store: &DirStore,
        chunk_id: &str,
        io_timeout: Duration,
    ) -> Result<()> {
        let data = store.read(chunk_id).await?;
        wire::send_message(
            stream,
            &Reply::success(RetrieveChunkBody {
                chunk_id: chunk_id.to_owned(),
                size: data.len() as u64,
            }),
            io_timeout,
        )
        .await?;
        wire::await_ready(stream, io_timeout).await?;
        wire::write_payload(stream, &data, io_timeout).await?;
        info!(%chunk_id, size = data.len(), "Served chunk");
        Ok(())
    }

    #[instrument(name = "data_delete_chunk", skip(stream, store))]
    async fn delete_chunk(
        stream: &mut TcpStream,
        store: &DirStore,
        chunk_id: &str,
        io_timeout: Duration,
    ) -> Result<()> {
        if !store.delete(chunk_id).await? {
            return Err(DfsError::ChunkMissing(chunk_id.to_owned()));
        }
        info!(%chunk_id, "Deleted chunk");
        wire::send_message(
            stream,
            &Reply::success(Ack::with_message(format!("Chunk {chunk_id} deleted"))),
            io_timeout,
        )
        .await
    }
}
