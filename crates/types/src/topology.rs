//! Topology graph and the hierarchy derived from it.
//!
//! The graph is an adjacency view rebuilt from the current device and link
//! sets whenever it is needed; it holds no state of its own. Neighbor order
//! follows link insertion order, which is what makes breadth-first searches
//! (and therefore path tie-breaks) reproducible.

use crate::{Device, DeviceId, Link};
use indexmap::IndexMap;
use std::collections::{HashMap, VecDeque};

/// Adjacency view over devices and active links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyGraph {
    adjacency: IndexMap<DeviceId, Vec<DeviceId>>,
}

impl TopologyGraph {
    /// Build the graph from devices and links.
    ///
    /// Inactive links and links whose endpoints are not in `devices` are
    /// ignored. Links are bidirectional regardless of which endpoint is
    /// recorded first.
    pub fn build<'a>(
        devices: impl IntoIterator<Item = &'a Device>,
        links: impl IntoIterator<Item = &'a Link>,
    ) -> Self {
        let mut adjacency: IndexMap<DeviceId, Vec<DeviceId>> = devices
            .into_iter()
            .map(|device| (device.id, Vec::new()))
            .collect();

        for link in links.into_iter().filter(|l| l.is_active()) {
            let (a, b) = (link.a.device, link.b.device);
            if a == b || !adjacency.contains_key(&a) || !adjacency.contains_key(&b) {
                continue;
            }
            for (from, to) in [(a, b), (b, a)] {
                if let Some(neighbors) = adjacency.get_mut(&from) {
                    if !neighbors.contains(&to) {
                        neighbors.push(to);
                    }
                }
            }
        }

        Self { adjacency }
    }

    /// Neighbors of `device` in link insertion order.
    pub fn neighbors(&self, device: DeviceId) -> &[DeviceId] {
        self.adjacency
            .get(&device)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, device: DeviceId) -> bool {
        self.adjacency.contains_key(&device)
    }

    pub fn are_adjacent(&self, a: DeviceId, b: DeviceId) -> bool {
        self.neighbors(a).contains(&b)
    }

    /// Device ids in insertion order.
    pub fn devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Hop distance from `root` to every reachable device.
    pub fn distances_from(&self, root: DeviceId) -> HashMap<DeviceId, usize> {
        let mut distances = HashMap::new();
        if !self.contains(root) {
            return distances;
        }
        distances.insert(root, 0);
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            let next_distance = distances[&current] + 1;
            for &neighbor in self.neighbors(current) {
                if !distances.contains_key(&neighbor) {
                    distances.insert(neighbor, next_distance);
                    queue.push_back(neighbor);
                }
            }
        }
        distances
    }
}

/// Downstream/upstream orientation of every device relative to a root OLT.
///
/// A neighbor one hop farther from the root is downstream; the first
/// neighbor one hop nearer is the single upstream link. Neighbors at equal
/// depth (cross links) are neither. Devices the root cannot reach have no
/// orientation.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    root: Option<DeviceId>,
    depth: HashMap<DeviceId, usize>,
}

impl Hierarchy {
    pub fn from_root(graph: &TopologyGraph, root: Option<DeviceId>) -> Self {
        let depth = root
            .map(|root| graph.distances_from(root))
            .unwrap_or_default();
        Self { root, depth }
    }

    pub fn root(&self) -> Option<DeviceId> {
        self.root
    }

    pub fn depth(&self, device: DeviceId) -> Option<usize> {
        self.depth.get(&device).copied()
    }

    pub fn is_reachable(&self, device: DeviceId) -> bool {
        self.depth.contains_key(&device)
    }

    /// Neighbors one hop farther from the root, in neighbor order.
    pub fn downstream_of(&self, graph: &TopologyGraph, device: DeviceId) -> Vec<DeviceId> {
        let Some(depth) = self.depth(device) else {
            return Vec::new();
        };
        graph
            .neighbors(device)
            .iter()
            .copied()
            .filter(|n| self.depth(*n) == Some(depth + 1))
            .collect()
    }

    /// First neighbor one hop nearer the root.
    pub fn upstream_of(&self, graph: &TopologyGraph, device: DeviceId) -> Option<DeviceId> {
        let depth = self.depth(device)?;
        if depth == 0 {
            return None;
        }
        graph
            .neighbors(device)
            .iter()
            .copied()
            .find(|n| self.depth(*n) == Some(depth - 1))
    }

    /// Every device below `device`, breadth-first.
    pub fn subtree(&self, graph: &TopologyGraph, device: DeviceId) -> Vec<DeviceId> {
        let mut found = Vec::new();
        let mut queue = VecDeque::from([device]);
        while let Some(current) = queue.pop_front() {
            for child in self.downstream_of(graph, current) {
                if !found.contains(&child) {
                    found.push(child);
                    queue.push_back(child);
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceKind, LinkEndpoint, LinkId, LinkStatus, PortMedium, PortNumber};

    fn device(id: u64, kind: DeviceKind) -> Device {
        Device::new(DeviceId(id), kind, format!("d{id}"))
    }

    fn link(id: u64, a: u64, b: u64) -> Link {
        Link {
            id: LinkId(id),
            a: LinkEndpoint {
                device: DeviceId(a),
                port: PortNumber(1),
            },
            b: LinkEndpoint {
                device: DeviceId(b),
                port: PortNumber(1),
            },
            medium: PortMedium::Optical,
            status: LinkStatus::Active,
        }
    }

    #[test]
    fn test_links_are_bidirectional_and_deduplicated() {
        let devices = vec![device(1, DeviceKind::Olt), device(2, DeviceKind::Splitter)];
        let links = vec![link(1, 2, 1), link(2, 1, 2)];
        let graph = TopologyGraph::build(&devices, &links);
        assert_eq!(graph.neighbors(DeviceId(1)), &[DeviceId(2)]);
        assert_eq!(graph.neighbors(DeviceId(2)), &[DeviceId(1)]);
    }

    #[test]
    fn test_inactive_and_dangling_links_ignored() {
        let devices = vec![device(1, DeviceKind::Olt), device(2, DeviceKind::Splitter)];
        let mut inactive = link(1, 1, 2);
        inactive.status = LinkStatus::Inactive;
        let dangling = link(2, 1, 99);
        let graph = TopologyGraph::build(&devices, &[inactive, dangling]);
        assert!(graph.neighbors(DeviceId(1)).is_empty());
        assert!(graph.neighbors(DeviceId(99)).is_empty());
    }

    #[test]
    fn test_hierarchy_orientation() {
        // 1 - 2 - {3, 4}, 3 - 4 cross link
        let devices = vec![
            device(1, DeviceKind::Olt),
            device(2, DeviceKind::Splitter),
            device(3, DeviceKind::Ont),
            device(4, DeviceKind::Ont),
            device(5, DeviceKind::Pc),
        ];
        let links = vec![link(1, 1, 2), link(2, 2, 3), link(3, 2, 4), link(4, 3, 4)];
        let graph = TopologyGraph::build(&devices, &links);
        let hierarchy = Hierarchy::from_root(&graph, Some(DeviceId(1)));

        assert_eq!(
            hierarchy.downstream_of(&graph, DeviceId(2)),
            vec![DeviceId(3), DeviceId(4)]
        );
        assert_eq!(hierarchy.upstream_of(&graph, DeviceId(3)), Some(DeviceId(2)));
        assert_eq!(hierarchy.upstream_of(&graph, DeviceId(1)), None);
        assert!(hierarchy.downstream_of(&graph, DeviceId(3)).is_empty());
        assert!(!hierarchy.is_reachable(DeviceId(5)));
        assert_eq!(
            hierarchy.subtree(&graph, DeviceId(1)),
            vec![DeviceId(2), DeviceId(3), DeviceId(4)]
        );
    }
}
