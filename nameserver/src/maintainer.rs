use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, time::interval};
use utilities::logger::{info, warn};

use crate::{config::Config, state::NameServerState};

/// Cadences for the three background supervisors.
#[derive(Debug, Clone)]
pub struct MaintainerSettings {
    pub liveness_timeout: Duration,
    pub heartbeat_check_interval: Duration,
    pub replication_check_interval: Duration,
    pub stats_interval: Duration,
}

impl From<&Config> for MaintainerSettings {
    fn from(config: &Config) -> Self {
        MaintainerSettings {
            liveness_timeout: Duration::from_secs(config.liveness_timeout_secs),
            heartbeat_check_interval: Duration::from_secs(config.heartbeat_check_interval_secs),
            replication_check_interval: Duration::from_secs(config.replication_check_interval_secs),
            stats_interval: Duration::from_secs(config.stats_interval_secs),
        }
    }
}

/// Long-lived supervision of the metadata tables: a liveness scanner, an
/// under-replication checker, and a statistics reporter, each on its own
/// interval. All three stop when the returned shutdown sender is flipped or
/// dropped. Iterations only touch in-memory state; repair traffic is out of
/// scope here.
pub struct StateMaintainer {
    state: Arc<NameServerState>,
    settings: MaintainerSettings,
}

impl StateMaintainer {
    pub fn new(state: Arc<NameServerState>, settings: MaintainerSettings) -> Self {
        StateMaintainer { state, settings }
    }

    pub fn start(self) -> watch::Sender<bool> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state = self.state.clone();
        let liveness_timeout = self.settings.liveness_timeout;
        let mut ticker = interval(self.settings.heartbeat_check_interval);
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let newly_dead = state.sweep_dead(liveness_timeout).await;
                        for node_id in newly_dead {
                            warn!(%node_id, "Chunk server dead, replicas dropped from the index");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        });

        let state = self.state.clone();
        let mut ticker = interval(self.settings.replication_check_interval);
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for (filename, chunk_indexes) in state.under_replication_report().await {
                            warn!(%filename, ?chunk_indexes, "File is under-replicated");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        });

        let state = self.state;
        let mut ticker = interval(self.settings.stats_interval);
        let mut shutdown = shutdown_rx;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let counters = state.counters().await;
                        info!(
                            alive_nodes = counters.alive_nodes,
                            total_nodes = counters.total_nodes,
                            files = counters.files,
                            chunks = counters.chunks,
                            "Cluster statistics"
                        );
                    }
                    _ = shutdown.changed() => break,
                }
            }
        });

        shutdown_tx
    }
}
