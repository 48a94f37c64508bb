//! Shortest input sequences to a list row.
//!
//! A [`Router`] is built once at startup from the catalogue orderings and then
//! shared read-only (it is a cheap `Arc` clone) with whoever needs routes.

mod graph;
mod search;

use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, TradeItem};

pub use graph::{Edge, InputGraph, Node, NodeId, MAX_EDGES, MIN_ORDERING_LEN, PAGE_SIZE};
pub use search::shortest_path;

/// Cursor inputs on an item list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Input {
    /// R: eight rows forward.
    PageForward,
    /// L: eight rows back.
    PageBackward,
    LineDown,
    LineUp,
    /// Plus: switch to the next sort mode.
    NextOrdering,
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Input::PageForward => "R",
            Input::PageBackward => "L",
            Input::LineDown => "Down",
            Input::LineUp => "Up",
            Input::NextOrdering => "Plus",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("no orderings to build a graph from")]
    Empty,
    #[error("ordering {ordering} has {len} rows, need at least 3")]
    TooShort { ordering: usize, len: usize },
}

/// Target is not present in the graph. This is a catalogue integrity problem;
/// callers must not retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no route to {item}")]
pub struct RouteNotFound {
    pub item: String,
}

#[derive(Debug, Clone)]
pub struct Router {
    graph: Arc<InputGraph>,
}

impl Router {
    pub fn new(orderings: Vec<Vec<TradeItem>>) -> Result<Self, GraphError> {
        let graph = InputGraph::build(orderings)?;
        debug!(
            "built input graph: {} nodes over {} orderings",
            graph.len(),
            graph.roots().len()
        );
        Ok(Self {
            graph: Arc::new(graph),
        })
    }

    /// Graph over the seven chained chip sort modes.
    pub fn for_chips(catalog: &Catalog) -> Result<Self, GraphError> {
        Self::new(catalog.chip_orderings())
    }

    /// Graph over the single part ordering.
    pub fn for_parts(catalog: &Catalog) -> Result<Self, GraphError> {
        Self::new(vec![catalog.part_ordering()])
    }

    pub fn graph(&self) -> &InputGraph {
        &self.graph
    }

    /// Minimal `(input, node)` steps from the global root to `target`. Empty
    /// when the root already holds `target`.
    pub fn route(&self, target: &TradeItem) -> Result<Vec<(Input, NodeId)>, RouteNotFound> {
        self.route_from(self.graph.root(), target)
    }

    pub fn route_from(
        &self,
        start: NodeId,
        target: &TradeItem,
    ) -> Result<Vec<(Input, NodeId)>, RouteNotFound> {
        shortest_path(&self.graph, start, target).ok_or_else(|| RouteNotFound {
            item: target.to_string(),
        })
    }

    /// Just the inputs of [`Router::route`].
    pub fn inputs(&self, target: &TradeItem) -> Result<Vec<Input>, RouteNotFound> {
        Ok(self.route(target)?.into_iter().map(|(input, _)| input).collect())
    }

    /// Checks that every item is reachable; the first failure is returned.
    pub fn validate<'a>(
        &self,
        items: impl IntoIterator<Item = &'a TradeItem>,
    ) -> Result<usize, RouteNotFound> {
        let mut checked = 0;
        for item in items {
            self.route(item)?;
            checked += 1;
        }
        Ok(checked)
    }
}
