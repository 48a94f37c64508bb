//! Scripted controller input interleaved with screen-state polling.

mod runner;
mod trace;
mod vision;

pub use runner::{ScriptRunner, Timing};
pub use trace::{InputTrace, TraceEntry};
pub use vision::{Frame, Region, Vision};

use crate::link::LinkError;

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("vision backend failed: {0}")]
    Vision(#[from] std::io::Error),
}
