//! Arena-backed input graph.
//!
//! ```text
//!   ordering 0 (ID)        ordering 1 (ABCDE)            ordering 6 (MB)
//!   [0]─R/L/Down/Up─[..]   [n0]─...                      [m0]─...
//!    │  next ordering        │  next ordering               │
//!    └──────────────────────►└──────────────► ... ─────────►└──► back to [0]
//! ```
//!
//! Nodes are addressed by index. Every node carries a fixed-size edge table
//! whose slot order is the order edges were inserted; breadth-first search
//! relies on that order for its tie-break.

use crate::catalog::TradeItem;

use super::{GraphError, Input};

pub type NodeId = usize;

/// Page inputs move this many rows.
pub const PAGE_SIZE: usize = 8;

/// Shortest ordering a graph can be built from.
pub const MIN_ORDERING_LEN: usize = 3;

/// Four cursor edges plus one ordering-change edge.
pub const MAX_EDGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub input: Input,
    pub to: NodeId,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub item: TradeItem,
    edges: [Option<Edge>; MAX_EDGES],
}

impl Node {
    fn new(item: TradeItem) -> Self {
        Self {
            item,
            edges: [None; MAX_EDGES],
        }
    }

    fn push(&mut self, input: Input, to: NodeId) {
        if let Some(slot) = self.edges.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some(Edge { input, to });
        }
    }

    /// Outgoing edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edges.iter().map_while(|slot| *slot)
    }
}

#[derive(Debug, Clone)]
pub struct InputGraph {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl InputGraph {
    /// Builds one sub-graph per ordering and chains their roots circularly with
    /// [`Input::NextOrdering`]. A single ordering gets no chaining edge.
    pub fn build(orderings: Vec<Vec<TradeItem>>) -> Result<Self, GraphError> {
        if orderings.is_empty() {
            return Err(GraphError::Empty);
        }

        let total = orderings.iter().map(Vec::len).sum();
        let mut graph = Self {
            nodes: Vec::with_capacity(total),
            roots: Vec::with_capacity(orderings.len()),
        };

        for (index, ordering) in orderings.into_iter().enumerate() {
            if ordering.len() < MIN_ORDERING_LEN {
                return Err(GraphError::TooShort {
                    ordering: index,
                    len: ordering.len(),
                });
            }
            graph.add_ordering(ordering);
        }

        if graph.roots.len() > 1 {
            for (idx, &root) in graph.roots.iter().enumerate() {
                let next = graph.roots[(idx + 1) % graph.roots.len()];
                graph.nodes[root].push(Input::NextOrdering, next);
            }
        }

        Ok(graph)
    }

    fn add_ordering(&mut self, ordering: Vec<TradeItem>) {
        let n = ordering.len();
        let start = self.nodes.len();
        let end = start + n - 1;
        self.nodes.extend(ordering.into_iter().map(Node::new));
        self.roots.push(start);

        for i in 0..n {
            let node = &mut self.nodes[start + i];
            if i == 0 {
                node.push(Input::LineDown, start + 1);
                node.push(Input::LineUp, end);
                node.push(Input::PageForward, start + PAGE_SIZE.min(n - 1));
                node.push(Input::PageBackward, end);
            } else if i == n - 1 {
                node.push(Input::LineDown, start);
                node.push(Input::LineUp, end - 1);
                node.push(Input::PageForward, start);
                node.push(Input::PageBackward, start + i.saturating_sub(PAGE_SIZE));
            } else {
                node.push(Input::PageForward, start + (i + PAGE_SIZE).min(n - 1));
                node.push(Input::PageBackward, start + i.saturating_sub(PAGE_SIZE));
                node.push(Input::LineDown, start + i + 1);
                node.push(Input::LineUp, start + i - 1);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Global root: the first row of the first ordering.
    pub fn root(&self) -> NodeId {
        self.roots[0]
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Follows `input` from `from`, if such an edge exists.
    pub fn step(&self, from: NodeId, input: Input) -> Option<NodeId> {
        self.nodes
            .get(from)?
            .edges()
            .find(|edge| edge.input == input)
            .map(|edge| edge.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Chip;

    pub(crate) fn letters(n: usize) -> Vec<TradeItem> {
        (0..n)
            .map(|i| {
                let mut chip = Chip::nothing();
                chip.name = format!("item{i}");
                TradeItem::Chip(chip)
            })
            .collect()
    }

    #[test]
    fn interior_edges_in_insertion_order() {
        let graph = InputGraph::build(vec![letters(20)]).unwrap();
        let edges: Vec<_> = graph.node(10).unwrap().edges().collect();
        assert_eq!(
            edges,
            vec![
                Edge { input: Input::PageForward, to: 18 },
                Edge { input: Input::PageBackward, to: 2 },
                Edge { input: Input::LineDown, to: 11 },
                Edge { input: Input::LineUp, to: 9 },
            ]
        );
    }

    #[test]
    fn endpoints_wrap() {
        let graph = InputGraph::build(vec![letters(20)]).unwrap();
        let first: Vec<_> = graph.node(0).unwrap().edges().map(|e| (e.input, e.to)).collect();
        assert_eq!(
            first,
            vec![
                (Input::LineDown, 1),
                (Input::LineUp, 19),
                (Input::PageForward, 8),
                (Input::PageBackward, 19),
            ]
        );
        let last: Vec<_> = graph.node(19).unwrap().edges().map(|e| (e.input, e.to)).collect();
        assert_eq!(
            last,
            vec![
                (Input::LineDown, 0),
                (Input::LineUp, 18),
                (Input::PageForward, 0),
                (Input::PageBackward, 11),
            ]
        );
    }

    #[test]
    fn short_ordering_pages_clamp() {
        let graph = InputGraph::build(vec![letters(4)]).unwrap();
        assert_eq!(graph.step(0, Input::PageForward), Some(3));
        assert_eq!(graph.step(3, Input::PageBackward), Some(0));
        assert_eq!(graph.step(1, Input::PageForward), Some(3));
        assert_eq!(graph.step(2, Input::PageBackward), Some(0));
    }

    #[test]
    fn roots_are_chained_circularly() {
        let graph = InputGraph::build(vec![letters(5), letters(3), letters(4)]).unwrap();
        assert_eq!(graph.roots(), &[0, 5, 8]);
        assert_eq!(graph.step(0, Input::NextOrdering), Some(5));
        assert_eq!(graph.step(5, Input::NextOrdering), Some(8));
        assert_eq!(graph.step(8, Input::NextOrdering), Some(0));
        assert_eq!(graph.step(1, Input::NextOrdering), None);
    }

    #[test]
    fn single_ordering_has_no_chaining_edge() {
        let graph = InputGraph::build(vec![letters(5)]).unwrap();
        assert_eq!(graph.step(0, Input::NextOrdering), None);
    }

    #[test]
    fn rejects_short_and_empty() {
        assert!(matches!(
            InputGraph::build(vec![letters(5), letters(2)]),
            Err(GraphError::TooShort { ordering: 1, len: 2 })
        ));
        assert!(matches!(InputGraph::build(Vec::new()), Err(GraphError::Empty)));
    }
}
