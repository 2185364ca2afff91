//! Breadth-first shortest-hop paths.
//!
//! Ties between equal-length paths are broken by neighbor order (link
//! insertion order): the first path BFS discovers wins.

use crate::{DeviceId, TopologyGraph};
use std::collections::{HashMap, VecDeque};

/// Shortest path from `from` to `to`, inclusive of both ends.
///
/// Returns `[from]` when the endpoints are equal and `None` when they are
/// disconnected or either is absent from the graph. A missing path is an
/// expected outcome, not an error.
pub fn shortest_path(graph: &TopologyGraph, from: DeviceId, to: DeviceId) -> Option<Vec<DeviceId>> {
    if from == to {
        return Some(vec![from]);
    }
    if !graph.contains(from) || !graph.contains(to) {
        return None;
    }

    let mut parent: HashMap<DeviceId, DeviceId> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    parent.insert(from, from);

    while let Some(current) = queue.pop_front() {
        for &neighbor in graph.neighbors(current) {
            if parent.contains_key(&neighbor) {
                continue;
            }
            parent.insert(neighbor, current);
            if neighbor == to {
                return Some(unwind(&parent, from, to));
            }
            queue.push_back(neighbor);
        }
    }

    None
}

fn unwind(parent: &HashMap<DeviceId, DeviceId>, from: DeviceId, to: DeviceId) -> Vec<DeviceId> {
    let mut path = vec![to];
    let mut current = to;
    while current != from {
        match parent.get(&current) {
            Some(&prev) => {
                path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Remove immediate repeats from a walk.
pub fn normalize_path(path: Vec<DeviceId>) -> Vec<DeviceId> {
    let mut normalized: Vec<DeviceId> = Vec::with_capacity(path.len());
    for id in path {
        if normalized.last() != Some(&id) {
            normalized.push(id);
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Device, DeviceKind, Link, LinkEndpoint, LinkId, LinkStatus, PortMedium, PortNumber};

    fn graph(n: u64, edges: &[(u64, u64)]) -> TopologyGraph {
        let devices: Vec<Device> = (1..=n)
            .map(|i| Device::new(DeviceId(i), DeviceKind::Router, format!("r{i}")))
            .collect();
        let links: Vec<Link> = edges
            .iter()
            .enumerate()
            .map(|(i, &(a, b))| Link {
                id: LinkId(i as u64),
                a: LinkEndpoint {
                    device: DeviceId(a),
                    port: PortNumber(1),
                },
                b: LinkEndpoint {
                    device: DeviceId(b),
                    port: PortNumber(1),
                },
                medium: PortMedium::Ethernet,
                status: LinkStatus::Active,
            })
            .collect();
        TopologyGraph::build(&devices, &links)
    }

    #[test]
    fn test_same_endpoint_is_single_element() {
        let g = graph(1, &[]);
        assert_eq!(shortest_path(&g, DeviceId(1), DeviceId(1)), Some(vec![DeviceId(1)]));
    }

    #[test]
    fn test_disconnected_is_none() {
        let g = graph(3, &[(1, 2)]);
        assert_eq!(shortest_path(&g, DeviceId(1), DeviceId(3)), None);
        assert_eq!(shortest_path(&g, DeviceId(1), DeviceId(42)), None);
    }

    #[test]
    fn test_minimum_hops_and_tie_break() {
        // Two 2-hop routes 1-2-4 and 1-3-4; link 1-2 was added first.
        let g = graph(4, &[(1, 2), (1, 3), (2, 4), (3, 4)]);
        let path = shortest_path(&g, DeviceId(1), DeviceId(4)).unwrap();
        assert_eq!(path, vec![DeviceId(1), DeviceId(2), DeviceId(4)]);
        assert_eq!(path.len() - 1, g.distances_from(DeviceId(1))[&DeviceId(4)]);
        assert_eq!(shortest_path(&g, DeviceId(1), DeviceId(4)), Some(path));
    }

    #[test]
    fn test_path_length_matches_bfs_distance_everywhere() {
        let g = graph(6, &[(1, 2), (2, 3), (3, 4), (4, 5), (5, 6), (1, 6), (2, 5)]);
        for from in g.devices() {
            let distances = g.distances_from(from);
            for to in g.devices() {
                let path = shortest_path(&g, from, to).unwrap();
                assert_eq!(path.len() - 1, distances[&to]);
                assert_eq!(path.first(), Some(&from));
                assert_eq!(path.last(), Some(&to));
            }
        }
    }

    #[test]
    fn test_normalize_removes_immediate_repeats() {
        let raw = vec![DeviceId(1), DeviceId(1), DeviceId(2), DeviceId(1)];
        assert_eq!(
            normalize_path(raw),
            vec![DeviceId(1), DeviceId(2), DeviceId(1)]
        );
    }
}
