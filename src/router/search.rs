use std::collections::VecDeque;

use crate::catalog::TradeItem;

use super::graph::{InputGraph, NodeId};
use super::Input;

/// Breadth-first search from `start` to the first node whose item equals
/// `target`. Neighbours are expanded in edge-insertion order, so among equal
/// length paths the first discovered wins. Returns `None` when no node holds
/// `target`.
pub fn shortest_path(
    graph: &InputGraph,
    start: NodeId,
    target: &TradeItem,
) -> Option<Vec<(Input, NodeId)>> {
    let start_node = graph.node(start)?;
    if start_node.item == *target {
        return Some(Vec::new());
    }

    // parent[n] = (input, predecessor) used to first reach n
    let mut parent: Vec<Option<(Input, NodeId)>> = vec![None; graph.len()];
    let mut visited = vec![false; graph.len()];
    let mut frontier = VecDeque::new();
    visited[start] = true;
    frontier.push_back(start);

    while let Some(current) = frontier.pop_front() {
        let node = graph.node(current)?;
        for edge in node.edges() {
            if visited[edge.to] {
                continue;
            }
            visited[edge.to] = true;
            parent[edge.to] = Some((edge.input, current));
            if graph.node(edge.to)?.item == *target {
                return Some(unwind(&parent, start, edge.to));
            }
            frontier.push_back(edge.to);
        }
    }
    None
}

fn unwind(parent: &[Option<(Input, NodeId)>], start: NodeId, found: NodeId) -> Vec<(Input, NodeId)> {
    let mut path = Vec::new();
    let mut cursor = found;
    while cursor != start {
        match parent[cursor] {
            Some((input, prev)) => {
                path.push((input, cursor));
                cursor = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
