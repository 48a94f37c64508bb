//! Records crossing the queue boundaries.
//!
//! ```text
//!   chat ──Command──► Manager ──WorkItem──► Worker
//!   chat ◄──Reply──── Manager / Worker
//!                     Manager ◄─WorkerEvent─ Worker
//!                     Manager ──CancelNotice► Worker
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::TradeItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a reply goes. Opaque to the core apart from the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyContext {
    pub user: UserId,
    pub user_name: String,
    pub channel_id: u64,
    pub message_id: u64,
}

impl ReplyContext {
    pub fn new(user: UserId, user_name: impl Into<String>) -> Self {
        Self {
            user,
            user_name: user_name.into(),
            channel_id: 0,
            message_id: 0,
        }
    }
}

/// One admitted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub context: ReplyContext,
    pub item: TradeItem,
    /// Admission order; unique per manager lifetime and across restores.
    pub seq: u64,
}

impl TradeRequest {
    pub fn user(&self) -> UserId {
        self.context.user
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Enqueue { context: ReplyContext, item: TradeItem },
    Cancel { context: ReplyContext },
    ListQueue { context: ReplyContext },
    ClearQueue { context: ReplyContext },
    Pause { context: ReplyContext },
    Resume { context: ReplyContext },
    ScreenCapture { context: ReplyContext },
    TradeCount { context: ReplyContext },
    TopTrades { context: ReplyContext, limit: usize },
    TopUsers { context: ReplyContext, limit: usize },
    UserTrades { context: ReplyContext, user: UserId, limit: usize },
    Shutdown,
}

/// Acknowledgement marker attached to the user's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reaction {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub user: UserId,
    pub user_name: String,
    pub item: String,
}

impl fmt::Display for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) - {}", self.user_name, self.user, self.item)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueListing {
    pub in_progress: Option<QueueEntry>,
    /// Up to the listing limit, in service order.
    pub queued: Vec<QueueEntry>,
    /// Every active request, the in-progress one included.
    pub total: usize,
}

impl fmt::Display for QueueListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.in_progress {
            Some(entry) => writeln!(f, "In progress: {entry}")?,
            None => writeln!(f, "In progress: No one")?,
        }
        if self.queued.is_empty() {
            writeln!(f, "No queued trades")?;
        }
        for (idx, entry) in self.queued.iter().enumerate() {
            writeln!(f, "{}. {entry}", idx + 1)?;
        }
        write!(f, "Total requests in queue: {}", self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatsReply {
    TradeCount { trades: u64, users: usize },
    TopTrades(Vec<(String, u64)>),
    TopUsers(Vec<(UserId, u64)>),
    UserTrades { user: UserId, trades: Vec<(String, u64)> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain acknowledgement, optionally with text.
    Message {
        context: ReplyContext,
        text: Option<String>,
        reaction: Option<Reaction>,
    },
    Queue {
        context: ReplyContext,
        listing: QueueListing,
    },
    Stats {
        context: ReplyContext,
        stats: StatsReply,
    },
    /// Claim artifact: the requester needs this image to join the trade.
    RoomCode {
        context: ReplyContext,
        item: String,
        png: Vec<u8>,
    },
    TradeFailed {
        context: ReplyContext,
        message: String,
        recent_inputs: Vec<String>,
        screen_png: Option<Vec<u8>>,
    },
    Screen {
        context: ReplyContext,
        png: Vec<u8>,
    },
    /// Broadcast after any change to the active set.
    QueueChanged { depth: usize },
}

impl Reply {
    pub fn text(context: &ReplyContext, text: impl Into<String>, reaction: Option<Reaction>) -> Self {
        Reply::Message {
            context: context.clone(),
            text: Some(text.into()),
            reaction,
        }
    }

    pub fn ok(context: &ReplyContext) -> Self {
        Reply::Message {
            context: context.clone(),
            text: None,
            reaction: Some(Reaction::Ok),
        }
    }

    pub fn context(&self) -> Option<&ReplyContext> {
        match self {
            Reply::Message { context, .. }
            | Reply::Queue { context, .. }
            | Reply::Stats { context, .. }
            | Reply::RoomCode { context, .. }
            | Reply::TradeFailed { context, .. }
            | Reply::Screen { context, .. } => Some(context),
            Reply::QueueChanged { .. } => None,
        }
    }
}

/// Work handed to the Worker, served in FIFO order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    Trade(TradeRequest),
    ScreenCapture(ReplyContext),
    Shutdown,
}

/// Discard the request with this admission sequence number on dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelNotice {
    pub user: UserId,
    pub seq: u64,
}

/// How a request left the Worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Finish {
    Completed,
    Cancelled,
    TimedOut,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Terminal outcome; the request leaves the active set.
    Finished { user: UserId, seq: u64, finish: Finish },
    /// Transient failure; the request stays active and is attempted again.
    Requeued { user: UserId, seq: u64, attempt: u32 },
}
