use std::collections::HashMap;

use chrono::{DateTime, Utc};
use protocol::message::{FileDetail, FileSummary};

/// Metadata for one stored file: its declared size, the fixed chunk geometry
/// it was created with, and which chunk servers are believed to hold each
/// chunk. Replica lists are advisory for reads, authoritative for "which node
/// the client was told to try".
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub name: String,
    pub size: u64,
    pub chunk_size: u64,
    pub replication_factor: u32,
    pub created_at: DateTime<Utc>,
    pub chunks: HashMap<u64, Vec<String>>,
}

impl FileRecord {
    /// A fresh record pre-seeds one (empty) replica list per chunk index, so
    /// `[0, ceil(size / chunk_size))` is always fully keyed and chunks the
    /// uploader never reported still show up as under-replicated.
    pub fn new(name: String, size: u64, chunk_size: u64, replication_factor: u32) -> Self {
        let num_chunks = size.div_ceil(chunk_size);
        FileRecord {
            name,
            size,
            chunk_size,
            replication_factor,
            created_at: Utc::now(),
            chunks: (0..num_chunks).map(|index| (index, Vec::new())).collect(),
        }
    }

    pub fn num_chunks(&self) -> u64 {
        self.chunks.len() as u64
    }

    /// Record that `node_id` holds chunk `index`. Duplicate locations within
    /// one chunk are forbidden and silently skipped.
    pub fn add_location(&mut self, index: u64, node_id: &str) {
        let locations = self.chunks.entry(index).or_default();
        if !locations.iter().any(|id| id == node_id) {
            locations.push(node_id.to_owned());
        }
    }

    /// Strip `node_id` from every chunk's replica list.
    pub fn remove_location(&mut self, node_id: &str) {
        for locations in self.chunks.values_mut() {
            locations.retain(|id| id != node_id);
        }
    }

    /// Chunk indexes whose replica count is below the replication factor,
    /// ascending.
    pub fn under_replicated(&self) -> Vec<u64> {
        let mut indexes: Vec<u64> = self
            .chunks
            .iter()
            .filter(|(_, locations)| locations.len() < self.replication_factor as usize)
            .map(|(index, _)| *index)
            .collect();
        indexes.sort_unstable();
        indexes
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            filename: self.name.clone(),
            size: self.size,
            chunks: self.num_chunks(),
            created_at: self.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn detail(&self) -> FileDetail {
        FileDetail {
            filename: self.name.clone(),
            size: self.size,
            chunk_size: self.chunk_size,
            replication_factor: self.replication_factor,
            created_at: self.created_at.timestamp(),
            chunks: self.chunks.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> FileRecord {
        FileRecord::new("hello.bin".to_owned(), 2 * 1024 * 1024, 1024 * 1024, 3)
    }

    #[test]
    fn duplicate_locations_are_skipped() {
        let mut file = record();
        file.add_location(0, "node-1");
        file.add_location(0, "node-1");
        file.add_location(0, "node-2");
        assert_eq!(file.chunks[&0], vec!["node-1", "node-2"]);
    }

    #[test]
    fn removing_a_node_touches_every_chunk() {
        let mut file = record();
        for index in 0..2 {
            file.add_location(index, "node-1");
            file.add_location(index, "node-2");
        }
        file.remove_location("node-1");
        assert_eq!(file.chunks[&0], vec!["node-2"]);
        assert_eq!(file.chunks[&1], vec!["node-2"]);
    }

    #[test]
    fn under_replication_reports_ascending_indexes() {
        let mut file = record();
        file.add_location(0, "node-1");
        file.add_location(0, "node-2");
        file.add_location(0, "node-3");
        file.add_location(1, "node-1");
        assert_eq!(file.under_replicated(), vec![1]);
        file.remove_location("node-3");
        assert_eq!(file.under_replicated(), vec![0, 1]);
    }
}
