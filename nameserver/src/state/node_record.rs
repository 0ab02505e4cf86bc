use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use protocol::message::{NodeMeta, NodeStatus};

/// Registry entry for one chunk server. Created by `register_datanode`,
/// mutated by heartbeats and the liveness scanner, never destroyed.
#[derive(Debug, Clone)]
pub struct ChunkServerRecord {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub last_heartbeat: Instant,
    pub available_space: u64,
    pub total_space: u64,
    pub inventory: HashSet<String>,
    pub alive: bool,
}

impl ChunkServerRecord {
    pub fn new(id: String, host: String, port: u16) -> Self {
        ChunkServerRecord {
            id,
            host,
            port,
            last_heartbeat: Instant::now(),
            available_space: 0,
            total_space: 0,
            inventory: HashSet::default(),
            alive: true,
        }
    }

    /// A heartbeat is the only path back from dead to alive.
    pub fn record_heartbeat(&mut self, available_space: u64, total_space: u64, chunks: Vec<String>) {
        self.last_heartbeat = Instant::now();
        self.available_space = available_space;
        self.total_space = total_space;
        self.inventory = chunks.into_iter().collect();
        self.alive = true;
    }

    pub fn heartbeat_fresh(&self, liveness_timeout: Duration) -> bool {
        self.last_heartbeat.elapsed() < liveness_timeout
    }

    /// Live for placement and download purposes: the scanner has not flagged
    /// the node, and its heartbeat is within the liveness window.
    pub fn is_live(&self, liveness_timeout: Duration) -> bool {
        self.alive && self.heartbeat_fresh(liveness_timeout)
    }

    pub fn meta(&self) -> NodeMeta {
        NodeMeta {
            node_id: self.id.clone(),
            host: self.host.clone(),
            port: self.port,
        }
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            node_id: self.id.clone(),
            host: self.host.clone(),
            port: self.port,
            is_alive: self.alive,
            available_space: self.available_space,
            total_space: self.total_space,
            chunk_count: self.inventory.len() as u64,
            seconds_since_heartbeat: self.last_heartbeat.elapsed().as_secs(),
        }
    }
}
