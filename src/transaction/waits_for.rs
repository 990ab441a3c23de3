//! Wait-for graph over blocked read-write transactions.
//!
//! An edge `a -> b` records that `a` is blocked behind a lock or queued
//! operation owned by `b`. The graph is plain adjacency data owned by the
//! coordinator; nodes exist only for read-write transactions and are torn
//! down with them.

use std::collections::{BTreeMap, BTreeSet};

use crate::storage::TransactionId;

#[derive(Debug, Default, Clone)]
pub struct WaitsForGraph {
    edges: BTreeMap<TransactionId, BTreeSet<TransactionId>>,
}

impl WaitsForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Only read-write transactions get one.
    pub fn add_node(&mut self, tid: TransactionId) {
        self.edges.entry(tid).or_default();
    }

    pub fn contains(&self, tid: TransactionId) -> bool {
        self.edges.contains_key(&tid)
    }

    /// Record `from -> to`. Dropped silently when `from` has no node
    /// (read-only transactions never wait-for) or when the edge would be a
    /// self-loop.
    pub fn add_edge(&mut self, from: TransactionId, to: TransactionId) {
        if from == to {
            return;
        }
        if let Some(out) = self.edges.get_mut(&from) {
            out.insert(to);
        }
    }

    /// Remove `tid`'s node and every edge pointing at it.
    pub fn remove(&mut self, tid: TransactionId) {
        self.edges.remove(&tid);
        for out in self.edges.values_mut() {
            out.remove(&tid);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// True when no transaction waits on anything.
    pub fn has_no_edges(&self) -> bool {
        self.edges.values().all(|out| out.is_empty())
    }

    fn neighbors(&self, tid: TransactionId) -> Vec<TransactionId> {
        self.edges
            .get(&tid)
            .map(|out| out.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Depth-first search from `start`, returning the members of the first
    /// cycle found, if any.
    ///
    /// Iterative with an explicit frame stack plus visited and on-path
    /// sets, so path membership is an O(log n) set probe and deep graphs
    /// cannot overflow the call stack. BTree ordering makes the result
    /// deterministic.
    pub fn find_cycle_from(&self, start: TransactionId) -> Option<Vec<TransactionId>> {
        if !self.edges.contains_key(&start) {
            return None;
        }

        let mut visited: BTreeSet<TransactionId> = BTreeSet::new();
        let mut on_path: BTreeSet<TransactionId> = BTreeSet::new();
        let mut path: Vec<TransactionId> = Vec::new();
        // (node, neighbor list, next neighbor index)
        let mut stack: Vec<(TransactionId, Vec<TransactionId>, usize)> = Vec::new();

        visited.insert(start);
        on_path.insert(start);
        path.push(start);
        stack.push((start, self.neighbors(start), 0));

        while !stack.is_empty() {
            let top = stack.len() - 1;
            let node = stack[top].0;
            let idx = stack[top].2;
            if idx >= stack[top].1.len() {
                on_path.remove(&node);
                path.pop();
                stack.pop();
                continue;
            }
            let next = stack[top].1[idx];
            stack[top].2 += 1;

            if on_path.contains(&next) {
                // Back edge: the cycle is the path suffix starting at `next`.
                let pos = path.iter().position(|t| *t == next).unwrap_or(0);
                return Some(path[pos..].to_vec());
            }
            if visited.insert(next) {
                on_path.insert(next);
                path.push(next);
                let neighbors = self.neighbors(next);
                stack.push((next, neighbors, 0));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: u32) -> TransactionId {
        TransactionId::new(n)
    }

    fn graph(edges: &[(u32, u32)]) -> WaitsForGraph {
        let mut g = WaitsForGraph::new();
        for &(from, to) in edges {
            g.add_node(t(from));
            g.add_node(t(to));
            g.add_edge(t(from), t(to));
        }
        g
    }

    #[test]
    fn test_no_cycle() {
        let g = graph(&[(1, 2), (2, 3)]);
        assert_eq!(g.find_cycle_from(t(1)), None);
        assert_eq!(g.find_cycle_from(t(3)), None);
    }

    #[test]
    fn test_two_cycle() {
        let g = graph(&[(1, 2), (2, 1)]);
        let cycle = g.find_cycle_from(t(1)).unwrap();
        assert_eq!(cycle, vec![t(1), t(2)]);
    }

    #[test]
    fn test_cycle_beyond_start() {
        // 1 -> 2 -> 3 -> 2: the cycle excludes the start node.
        let g = graph(&[(1, 2), (2, 3), (3, 2)]);
        let cycle = g.find_cycle_from(t(1)).unwrap();
        assert_eq!(cycle, vec![t(2), t(3)]);
    }

    #[test]
    fn test_long_cycle() {
        let g = graph(&[(1, 2), (2, 3), (3, 4), (4, 1)]);
        let cycle = g.find_cycle_from(t(1)).unwrap();
        assert_eq!(cycle, vec![t(1), t(2), t(3), t(4)]);
    }

    #[test]
    fn test_self_loops_ignored() {
        let mut g = WaitsForGraph::new();
        g.add_node(t(1));
        g.add_edge(t(1), t(1));
        assert_eq!(g.find_cycle_from(t(1)), None);
    }

    #[test]
    fn test_edges_to_missing_nodes_are_sinks() {
        // Read-only transactions can own queued operations without having
        // a node; an edge to them must not be followed anywhere.
        let mut g = WaitsForGraph::new();
        g.add_node(t(1));
        g.add_edge(t(1), t(9));
        assert_eq!(g.find_cycle_from(t(1)), None);
    }

    #[test]
    fn test_remove_clears_inbound_edges() {
        let mut g = graph(&[(1, 2), (2, 1)]);
        g.remove(t(2));
        assert_eq!(g.find_cycle_from(t(1)), None);
        assert!(g.contains(t(1)));
        assert!(!g.contains(t(2)));
        assert!(g.has_no_edges());
    }

    #[test]
    fn test_edge_without_node_dropped() {
        let mut g = WaitsForGraph::new();
        g.add_edge(t(5), t(6));
        assert!(g.is_empty());
    }
}
