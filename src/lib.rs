//! Queued, cancellable item trades driven through a computer-controlled game
//! controller.
//!
//! The crate is layered leaf to root:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  service   (wires Manager + Worker on two threads)       │
//! ├───────────────────────────┬──────────────────────────────┤
//! │  queue  (Queue Manager)   │  worker  (Trade Worker)      │
//! │                           ├──────────────┬───────────────┤
//! │                           │  script      │  router       │
//! │                           ├──────────────┤               │
//! │                           │  link        │               │
//! └───────────────────────────┴──────────────┴───────────────┘
//! ```
//!
//! The Manager and the Worker share only the primitives bundled in
//! [`queue::Wiring`]: the FIFO intake and the cancellation signal with its
//! one-way notice channels.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod link;
pub mod queue;
pub mod router;
pub mod script;
pub mod service;
pub mod wait;
pub mod worker;

pub use catalog::{Catalog, TradeItem};
pub use config::BotConfig;
pub use error::{Error, Result};
pub use router::{Input, Router};
