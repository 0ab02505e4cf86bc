pub mod file_record;
pub mod node_record;

use std::{collections::HashMap, time::Duration};

use protocol::message::{FileSummary, NodeMeta, NodeStatus};
use tokio::sync::Mutex;
use utilities::result::{DfsError, Result};

pub use file_record::FileRecord;
pub use node_record::ChunkServerRecord;

/// Counters emitted by the statistics reporter.
#[derive(Debug, Clone, Copy)]
pub struct ClusterCounters {
    pub alive_nodes: usize,
    pub total_nodes: usize,
    pub files: usize,
    pub chunks: usize,
}

/// The name server's two regions of mutable state: the chunk-server registry
/// and the file index, each behind its own lock. Whenever both are needed the
/// registry lock is taken first; no method performs I/O while holding either.
#[derive(Default)]
pub struct NameServerState {
    nodes: Mutex<HashMap<String, ChunkServerRecord>>,
    files: Mutex<HashMap<String, FileRecord>>,
}

impl NameServerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent registration. Returns whether the id was new.
    pub async fn register_node(&self, id: &str, host: &str, port: u16) -> bool {
        let mut nodes = self.nodes.lock().await;
        if nodes.contains_key(id) {
            return false;
        }
        nodes.insert(
            id.to_owned(),
            ChunkServerRecord::new(id.to_owned(), host.to_owned(), port),
        );
        true
    }

    pub async fn record_heartbeat(
        &self,
        id: &str,
        available_space: u64,
        total_space: u64,
        chunks: Vec<String>,
    ) -> Result<()> {
        let mut nodes = self.nodes.lock().await;
        let record = nodes
            .get_mut(id)
            .ok_or_else(|| DfsError::UnknownNode(id.to_owned()))?;
        record.record_heartbeat(available_space, total_space, chunks);
        Ok(())
    }

    /// Snapshot of every node currently usable for placement.
    pub async fn live_snapshot(&self, liveness_timeout: Duration) -> Vec<ChunkServerRecord> {
        let nodes = self.nodes.lock().await;
        nodes
            .values()
            .filter(|record| record.is_live(liveness_timeout))
            .cloned()
            .collect()
    }

    /// `id -> meta` for live nodes only, used to filter download locations.
    pub async fn live_node_metas(&self, liveness_timeout: Duration) -> HashMap<String, NodeMeta> {
        let nodes = self.nodes.lock().await;
        nodes
            .values()
            .filter(|record| record.is_live(liveness_timeout))
            .map(|record| (record.id.clone(), record.meta()))
            .collect()
    }

    pub async fn node_statuses(&self) -> Vec<NodeStatus> {
        let nodes = self.nodes.lock().await;
        let mut statuses: Vec<NodeStatus> = nodes.values().map(|record| record.status()).collect();
        statuses.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        statuses
    }

    /// Install (or overwrite) a file record. Last writer wins.
    pub async fn install_file(&self, record: FileRecord) {
        let mut files = self.files.lock().await;
        files.insert(record.name.clone(), record);
    }

    pub async fn get_file(&self, name: &str) -> Option<FileRecord> {
        let files = self.files.lock().await;
        files.get(name).cloned()
    }

    pub async fn remove_file(&self, name: &str) -> Result<()> {
        let mut files = self.files.lock().await;
        files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DfsError::NotFound(name.to_owned()))
    }

    pub async fn list_summaries(&self) -> Vec<FileSummary> {
        let files = self.files.lock().await;
        let mut summaries: Vec<FileSummary> =
            files.values().map(|record| record.summary()).collect();
        summaries.sort_by(|a, b| a.filename.cmp(&b.filename));
        summaries
    }

    /// `(file_count, total_bytes)` across the index.
    pub async fn file_totals(&self) -> (u64, u64) {
        let files = self.files.lock().await;
        let total_size = files.values().map(|record| record.size).sum();
        (files.len() as u64, total_size)
    }

    /// Liveness sweep: flag nodes whose heartbeat went stale, then strip the
    /// newly dead ids from every file's replica lists. Registry lock first,
    /// file lock second, never held together.
    pub async fn sweep_dead(&self, liveness_timeout: Duration) -> Vec<String> {
        let newly_dead: Vec<String> = {
            let mut nodes = self.nodes.lock().await;
            nodes
                .values_mut()
                .filter(|record| record.alive && !record.heartbeat_fresh(liveness_timeout))
                .map(|record| {
                    record.alive = false;
                    record.id.clone()
                })
                .collect()
        };
        if !newly_dead.is_empty() {
            let mut files = self.files.lock().await;
            for record in files.values_mut() {
                for id in &newly_dead {
                    record.remove_location(id);
                }
            }
        }
        newly_dead
    }

    /// Files with at least one under-replicated chunk.
    pub async fn under_replication_report(&self) -> Vec<(String, Vec<u64>)> {
        let files = self.files.lock().await;
        files
            .values()
            .filter_map(|record| {
                let indexes = record.under_replicated();
                if indexes.is_empty() {
                    None
                } else {
                    Some((record.name.clone(), indexes))
                }
            })
            .collect()
    }

    pub async fn counters(&self) -> ClusterCounters {
        let (alive_nodes, total_nodes) = {
            let nodes = self.nodes.lock().await;
            let alive = nodes.values().filter(|record| record.alive).count();
            (alive, nodes.len())
        };
        let (files, chunks) = {
            let files = self.files.lock().await;
            let chunks = files.values().map(|record| record.chunks.len()).sum();
            (files.len(), chunks)
        };
        ClusterCounters {
            alive_nodes,
            total_nodes,
            files,
            chunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const LIVENESS: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn register_is_idempotent() {
        let state = NameServerState::new();
        assert!(state.register_node("node-1", "127.0.0.1", 8001).await);
        assert!(!state.register_node("node-1", "127.0.0.1", 8001).await);
        assert_eq!(state.node_statuses().await.len(), 1);
    }

    #[tokio::test]
    async fn heartbeat_requires_registration() {
        let state = NameServerState::new();
        let err = state
            .record_heartbeat("ghost", 0, 0, vec![])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), utilities::result::ErrorKind::UnknownNode);

        state.register_node("node-1", "127.0.0.1", 8001).await;
        state
            .record_heartbeat("node-1", 100, 200, vec!["chunk_a.bin_0".to_owned()])
            .await
            .unwrap();
        let status = &state.node_statuses().await[0];
        assert!(status.is_alive);
        assert_eq!(status.available_space, 100);
        assert_eq!(status.chunk_count, 1);
    }

    #[tokio::test]
    async fn sweep_strips_dead_nodes_from_files() {
        let state = NameServerState::new();
        state.register_node("node-1", "127.0.0.1", 8001).await;
        state.register_node("node-2", "127.0.0.1", 8002).await;

        let mut record = FileRecord::new("a.bin".to_owned(), 10, 1024 * 1024, 2);
        record.add_location(0, "node-1");
        record.add_location(0, "node-2");
        state.install_file(record).await;

        // zero timeout: every heartbeat is instantly stale
        let dead = state.sweep_dead(Duration::ZERO).await;
        assert_eq!(dead.len(), 2);
        let file = state.get_file("a.bin").await.unwrap();
        assert!(file.chunks[&0].is_empty());

        // already-dead nodes are not reported twice
        assert!(state.sweep_dead(Duration::ZERO).await.is_empty());
    }

    #[tokio::test]
    async fn replica_ids_always_point_into_the_registry() {
        let state = NameServerState::new();
        state.register_node("node-1", "127.0.0.1", 8001).await;
        let mut record = FileRecord::new("a.bin".to_owned(), 10, 1024 * 1024, 1);
        record.add_location(0, "node-1");
        state.install_file(record).await;

        let registered: Vec<String> = state
            .node_statuses()
            .await
            .into_iter()
            .map(|status| status.node_id)
            .collect();
        let file = state.get_file("a.bin").await.unwrap();
        for locations in file.chunks.values() {
            for id in locations {
                assert!(registered.contains(id));
            }
        }
    }

    #[tokio::test]
    async fn live_snapshot_excludes_flagged_nodes() {
        let state = NameServerState::new();
        state.register_node("node-1", "127.0.0.1", 8001).await;
        state.register_node("node-2", "127.0.0.1", 8002).await;
        assert_eq!(state.live_snapshot(LIVENESS).await.len(), 2);

        state.sweep_dead(Duration::ZERO).await;
        assert!(state.live_snapshot(LIVENESS).await.is_empty());

        // a heartbeat is the only way back to alive
        state.record_heartbeat("node-1", 1, 1, vec![]).await.unwrap();
        let live = state.live_snapshot(LIVENESS).await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, "node-1");
    }

    #[tokio::test]
    async fn totals_and_counters_track_the_index() {
        let state = NameServerState::new();
        state.register_node("node-1", "127.0.0.1", 8001).await;
        let mut record = FileRecord::new("a.bin".to_owned(), 500, 1024 * 1024, 1);
        record.add_location(0, "node-1");
        state.install_file(record).await;

        assert_eq!(state.file_totals().await, (1, 500));
        let counters = state.counters().await;
        assert_eq!(counters.files, 1);
        assert_eq!(counters.chunks, 1);
        assert_eq!(counters.alive_nodes, 1);

        state.remove_file("a.bin").await.unwrap();
        let err = state.remove_file("a.bin").await.unwrap_err();
        assert_eq!(err.kind(), utilities::result::ErrorKind::NotFound);
        assert_eq!(state.file_totals().await, (0, 0));
    }
}
