use protocol::message::NodeMeta;

use crate::state::ChunkServerRecord;

/// Seam for chunk placement. Policies rank an already-filtered snapshot of
/// live nodes; they hold no locks and record no reservations.
pub trait NodeSelectionPolicy {
    /// Pick up to `count` nodes for a new chunk. Fewer than `count` returned
    /// means the fleet cannot satisfy the replication factor.
    fn select(&self, candidates: &[ChunkServerRecord], count: usize) -> Vec<NodeMeta>;
}

/// Default policy: most free space first.
pub struct SpaceWeightedPolicy;

impl NodeSelectionPolicy for SpaceWeightedPolicy {
    fn select(&self, candidates: &[ChunkServerRecord], count: usize) -> Vec<NodeMeta> {
        let mut ranked: Vec<&ChunkServerRecord> = candidates.iter().collect();
        ranked.sort_by(|a, b| {
            b.available_space
                .cmp(&a.available_space)
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked
            .into_iter()
            .take(count)
            .map(|record| record.meta())
            .collect()
    }
}
