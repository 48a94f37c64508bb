use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::link::LinkError;
use crate::queue::SnapshotError;
use crate::router::{GraphError, RouteNotFound};

/// Crate-level error; each concern keeps its own enum and converts into this.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Route(#[from] RouteNotFound),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0} thread panicked")]
    Panicked(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
