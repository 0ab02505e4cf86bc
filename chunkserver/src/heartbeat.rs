use std::time::Duration;

use storage::{ChunkStore, DirStore};
use tokio::{task::JoinHandle, time::interval};
use utilities::logger::{trace, warn};
use utilities::result::Result;
use utilities::retry_policy::RetryPolicy;

use crate::nameserver_service::NameserverService;

/// Announce this node to the name server, retrying on the configured
/// schedule while it comes up. Registration must land before the first
/// heartbeat is accepted.
pub async fn register_with_backoff(
    nameserver: &NameserverService,
    node_id: &str,
    host: &str,
    port: u16,
    policy: &RetryPolicy,
) -> Result<()> {
    policy
        .run(|| {
            let nameserver = nameserver.clone();
            let node_id = node_id.to_owned();
            let host = host.to_owned();
            async move { nameserver.register(&node_id, &host, port).await }
        })
        .await?;
    Ok(())
}

/// Periodic health report: free/total space plus the full chunk inventory,
/// re-enumerated from the store every beat. Surviving blobs reappear in the
/// first beat after a restart; failures are logged and the loop carries on.
pub fn start_heartbeat_loop(
    nameserver: NameserverService,
    store: DirStore,
    node_id: String,
    heartbeat_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(heartbeat_interval);
        loop {
            ticker.tick().await;
            let chunks = match store.available_chunks().await {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(error = %e, "Could not enumerate the chunk store");
                    continue;
                }
            };
            let (available_space, total_space) = match store.available_space() {
                Ok(space) => space,
                Err(e) => {
                    warn!(error = %e, "Could not read storage capacity");
                    continue;
                }
            };
            match nameserver
                .heartbeat(&node_id, available_space, total_space, chunks)
                .await
            {
                Ok(_) => trace!(%node_id, "Heartbeat accepted"),
                Err(e) => warn!(error = %e, "Heartbeat failed"),
            }
        }
    })
}
