use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use utilities::logger::{Instrument, Span, info};
use utilities::result::Result;

use crate::handler::RequestHandler;

/// Control-plane TCP server: accepts connections and hands each one to the
/// request handler on its own task, so a slow peer never stalls the plane.
pub struct NameServer {
    listener: TcpListener,
    handler: Arc<RequestHandler>,
}

impl NameServer {
    pub async fn bind(addr: &str, handler: Arc<RequestHandler>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Name server listening");
        Ok(NameServer { listener, handler })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn serve(self) -> Result<()> {
        loop {
            let (stream, _) = self.listener.accept().await?;
            let handler = self.handler.clone();
            let span = Span::current();
            tokio::spawn(
                async move {
                    handler.handle_connection(stream).await;
                }
                .instrument(span),
            );
        }
    }
}
