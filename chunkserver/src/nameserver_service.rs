use std::time::Duration;

use protocol::{
    message::{Ack, Reply, Request},
    wire,
};
use utilities::logger::{instrument, tracing};
use utilities::result::Result;

/// JSON RPC client for the name server's control plane: one connection per
/// request, closed after the reply.
#[derive(Debug, Clone)]
pub struct NameserverService {
    addr: String,
    io_timeout: Duration,
}

impl NameserverService {
    pub fn new(addr: impl Into<String>, io_timeout: Duration) -> Self {
        NameserverService {
            addr: addr.into(),
            io_timeout,
        }
    }

    async fn call(&self, request: &Request) -> Result<Ack> {
        let mut stream = wire::connect(&self.addr, self.io_timeout).await?;
        wire::send_message(&mut stream, request, self.io_timeout).await?;
        let reply: Reply<Ack> = wire::read_message(&mut stream, self.io_timeout).await?;
        reply.into_result()
    }

    #[instrument(skip(self))]
    pub async fn register(&self, node_id: &str, host: &str, port: u16) -> Result<Ack> {
        self.call(&Request::RegisterDatanode {
            node_id: node_id.to_owned(),
            host: host.to_owned(),
            port,
        })
        .await
    }

    #[instrument(skip(self, chunks), fields(chunk_count = chunks.len()))]
    pub async fn heartbeat(
        &self,
        node_id: &str,
        available_space: u64,
        total_space: u64,
        chunks: Vec<String>,
    ) -> Result<Ack> {
        self.call(&Request::Heartbeat {
            node_id: node_id.to_owned(),
            available_space,
            total_space,
            chunks,
        })
        .await
    }
}
