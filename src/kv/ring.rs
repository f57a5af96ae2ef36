//! Weighted consistent-hash ring used to dispatch keys across cache nodes.

use alloy_primitives::keccak256;

/// Virtual points placed on the ring per unit of node weight.
pub const VIRTUAL_NODES_PER_WEIGHT: u32 = 32;

/// Consistent-hash ring over node indices.
///
/// Each node owns `weight × VIRTUAL_NODES_PER_WEIGHT` points, so the share
/// of keys routed to a node is proportional to its weight.
#[derive(Debug, Clone)]
pub struct HashRing {
    /// Sorted `(position, node index)` pairs.
    points: Vec<(u64, usize)>,
    weights: Vec<u32>,
}

fn position(bytes: &[u8]) -> u64 {
    let digest = keccak256(bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

impl HashRing {
    /// Build a ring from `(name, weight)` pairs. Names only seed positions.
    pub fn new<'a>(nodes: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        let mut points = Vec::new();
        let mut weights = Vec::new();

        for (index, (name, weight)) in nodes.into_iter().enumerate() {
            weights.push(weight);
            for replica in 0..weight.saturating_mul(VIRTUAL_NODES_PER_WEIGHT) {
                let seed = format!("{index}-{name}#{replica}");
                points.push((position(seed.as_bytes()), index));
            }
        }

        points.sort_unstable();
        points.dedup_by_key(|(pos, _)| *pos);

        Self { points, weights }
    }

    /// Index of the node that owns `key`, or `None` for an empty ring.
    #[must_use]
    pub fn locate(&self, key: &str) -> Option<usize> {
        if self.points.is_empty() {
            return None;
        }
        let pos = position(key.as_bytes());
        let slot = self.points.partition_point(|(p, _)| *p < pos);
        let (_, index) = self.points[slot % self.points.len()];
        Some(index)
    }

    /// Number of ring points owned by node `index`.
    #[must_use]
    pub fn virtual_nodes(&self, index: usize) -> usize {
        self.points.iter().filter(|(_, i)| *i == index).count()
    }

    #[must_use]
    pub fn weight(&self, index: usize) -> Option<u32> {
        self.weights.get(index).copied()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_node_owns_points_proportional_to_weight() {
        let ring = HashRing::new([("a:6379", 1), ("b:6379", 2), ("c:6379", 3)]);
        assert_eq!(ring.node_count(), 3);
        for (index, weight) in [(0usize, 1u32), (1, 2), (2, 3)] {
            assert_eq!(
                ring.virtual_nodes(index),
                (weight * VIRTUAL_NODES_PER_WEIGHT) as usize
            );
        }
    }

    #[test]
    fn locate_is_stable() {
        let ring = HashRing::new([("a:6379", 2), ("b:6379", 2)]);
        let first = ring.locate("cache:es:floor_price:0x01");
        for _ in 0..10 {
            assert_eq!(ring.locate("cache:es:floor_price:0x01"), first);
        }
    }

    #[test]
    fn every_node_is_reachable() {
        let ring = HashRing::new([("a:6379", 1), ("b:6379", 2), ("c:6379", 5)]);
        let mut hit = [false; 3];
        for i in 0..2_000 {
            if let Some(index) = ring.locate(&format!("key-{i}")) {
                hit[index] = true;
            }
        }
        assert_eq!(hit, [true, true, true]);
    }

    #[test]
    fn empty_ring_locates_nothing() {
        let ring = HashRing::new(std::iter::empty::<(&str, u32)>());
        assert!(ring.is_empty());
        assert_eq!(ring.locate("anything"), None);
    }

    #[test]
    fn duplicate_hosts_still_count_separately() {
        let ring = HashRing::new([("a:6379", 1), ("a:6379", 1)]);
        assert!(ring.virtual_nodes(0) > 0);
        assert!(ring.virtual_nodes(1) > 0);
    }
}
