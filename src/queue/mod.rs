//! Request queue: admission, cancellation, persistence and statistics.

mod cancel;
mod manager;
mod message;
mod shared;
mod snapshot;
mod stats;

pub use cancel::CancellationSignal;
pub use manager::{
    CancelResult, QueueManager, CANCELLED_IN_PROGRESS, CANCELLED_QUEUED, NOTHING_TO_CANCEL,
    QUEUE_EMPTY,
};
pub use message::{
    CancelNotice, Command, Finish, QueueEntry, QueueListing, Reaction, Reply, ReplyContext,
    StatsReply, TradeRequest, UserId, WorkItem, WorkerEvent,
};
pub use shared::{ManagerChannels, WorkerChannels, Wiring};
pub use snapshot::{
    Snapshot, SnapshotError, SnapshotStore, SNAPSHOT_HEADER_LEN, SNAPSHOT_MAGIC, SNAPSHOT_VERSION,
};
pub use stats::{ItemCount, StatsStore, TradeStats, UserStats};

/// Why a request was refused at admission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("You already have a pending request for `{item}`")]
    Duplicate { item: String },
    #[error(
        "{item} cannot be requested when there are more than {depth} people in the queue. \
         Try asking someone to dupe it for you!"
    )]
    DepthPolicy { item: String, depth: usize },
    #[error("The queue is paused; try again later.")]
    Paused,
}
