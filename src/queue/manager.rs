//! Queue Manager: sole owner of the active request set.
//!
//! ```text
//!            commands                    intake (FIFO)
//!   chat ───────────────► QueueManager ───────────────► Worker
//!                          │  active: seq → request       │
//!                          │  by_user: user → seq         │
//!                          │◄──── WorkerEvent ────────────┤
//!                          │───── CancelNotice ──────────►│
//!                          └──── snapshot / stats files
//! ```
//!
//! Every mutation of the active set is written through to the snapshot and
//! followed by a `Reply::QueueChanged` broadcast.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::mpsc::{RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::catalog::TradeItem;
use crate::config::QueueConfig;

use super::cancel::CancellationSignal;
use super::message::{
    CancelNotice, Command, Finish, QueueEntry, QueueListing, Reaction, Reply, ReplyContext,
    StatsReply, TradeRequest, UserId, WorkItem, WorkerEvent,
};
use super::shared::ManagerChannels;
use super::snapshot::SnapshotStore;
use super::stats::{StatsStore, TradeStats};
use super::AdmissionError;

/// How long each cancel wait slice lasts before completions are drained.
const CANCEL_SLICE: Duration = Duration::from_millis(50);

pub const CANCELLED_IN_PROGRESS: &str = "Successfully cancelled in-progress trade.";
pub const CANCELLED_QUEUED: &str = "Successfully cancelled queued trade.";
pub const NOTHING_TO_CANCEL: &str = "You don't have any queued trades.";
pub const QUEUE_EMPTY: &str = "There are no requests waiting in the queue.";

/// What a Cancel command achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelResult {
    InProgress,
    Queued,
    NotFound,
}

pub struct QueueManager {
    config: QueueConfig,
    common: HashSet<String>,
    channels: ManagerChannels,
    cancel: Arc<CancellationSignal>,
    active: BTreeMap<u64, TradeRequest>,
    by_user: HashMap<UserId, u64>,
    next_seq: u64,
    paused: bool,
    snapshots: SnapshotStore,
    stats_store: StatsStore,
    stats: TradeStats,
}

impl QueueManager {
    /// `common` holds the display names refused while the queue is deep.
    pub fn new(
        config: QueueConfig,
        common: HashSet<String>,
        channels: ManagerChannels,
        cancel: Arc<CancellationSignal>,
    ) -> Self {
        let snapshots = SnapshotStore::new(&config.snapshot_path);
        let stats_store = StatsStore::new(&config.stats_path);
        let stats = stats_store.load();
        Self {
            config,
            common,
            channels,
            cancel,
            active: BTreeMap::new(),
            by_user: HashMap::new(),
            next_seq: 1,
            paused: false,
            snapshots,
            stats_store,
            stats,
        }
    }

    pub fn depth(&self) -> usize {
        self.active.len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn stats(&self) -> &TradeStats {
        &self.stats
    }

    /// Active requests in service order.
    pub fn requests(&self) -> impl Iterator<Item = &TradeRequest> {
        self.active.values()
    }

    /// Reloads a persisted queue and hands it to the Worker. Returns the
    /// number of requests restored.
    pub fn restore(&mut self) -> usize {
        let snapshot = match self.snapshots.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return 0,
            Err(err) => {
                warn!(
                    "ignoring queue snapshot {}: {err}",
                    self.snapshots.path().display()
                );
                return 0;
            }
        };

        let mut restored = 0;
        for request in snapshot.requests {
            if self.by_user.contains_key(&request.user()) || self.active.contains_key(&request.seq) {
                warn!("dropping duplicate restored request for {}", request.user());
                continue;
            }
            self.next_seq = self.next_seq.max(request.seq + 1);
            self.admit(request);
            restored += 1;
        }
        if restored > 0 {
            info!(
                "restored {restored} queued requests from {} (saved {})",
                self.snapshots.path().display(),
                snapshot.saved_at
            );
            self.broadcast_depth();
        }
        restored
    }

    /// Serves commands until `Shutdown` or until every command sender is gone.
    pub fn run(mut self) {
        self.restore();
        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
        loop {
            match self.channels.commands.recv_timeout(poll) {
                Ok(command) => {
                    self.drain_events();
                    if !self.handle(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.drain_events();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    info!("command source closed; stopping queue manager");
                    self.shutdown();
                    break;
                }
            }
        }
    }

    /// Handles one command. Returns false once the manager should stop.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Enqueue { context, item } => {
                let reply = match self.enqueue(context.clone(), item) {
                    Ok(_) => Reply::ok(&context),
                    Err(err) => Reply::text(&context, err.to_string(), Some(Reaction::Error)),
                };
                self.reply(reply);
            }
            Command::Cancel { context } => {
                let reply = match self.cancel(context.user) {
                    CancelResult::InProgress => {
                        Reply::text(&context, CANCELLED_IN_PROGRESS, Some(Reaction::Ok))
                    }
                    CancelResult::Queued => {
                        Reply::text(&context, CANCELLED_QUEUED, Some(Reaction::Ok))
                    }
                    CancelResult::NotFound => {
                        Reply::text(&context, NOTHING_TO_CANCEL, Some(Reaction::Error))
                    }
                };
                self.reply(reply);
            }
            Command::ListQueue { context } => {
                let reply = if self.active.is_empty() {
                    Reply::text(&context, QUEUE_EMPTY, None)
                } else {
                    Reply::Queue {
                        context,
                        listing: self.listing(),
                    }
                };
                self.reply(reply);
            }
            Command::ClearQueue { context } => {
                let cleared = self.clear();
                info!("{} cleared {cleared} queued requests", context.user_name);
                self.reply(Reply::ok(&context));
            }
            Command::Pause { context } => {
                if self.paused {
                    self.resume();
                } else {
                    self.pause();
                }
                self.reply(Reply::ok(&context));
            }
            Command::Resume { context } => {
                if self.paused {
                    self.resume();
                    self.reply(Reply::ok(&context));
                } else {
                    self.reply(Reply::text(&context, "The queue is not paused.", Some(Reaction::Error)));
                }
            }
            Command::ScreenCapture { context } => {
                if self
                    .channels
                    .intake
                    .send(WorkItem::ScreenCapture(context.clone()))
                    .is_err()
                {
                    warn!("worker intake closed; dropping screen capture");
                    self.reply(Reply::text(&context, "The trade worker is not running.", Some(Reaction::Error)));
                }
            }
            Command::TradeCount { context } => {
                let stats = StatsReply::TradeCount {
                    trades: self.stats.total_trades(),
                    users: self.stats.total_users(),
                };
                self.reply(Reply::Stats { context, stats });
            }
            Command::TopTrades { context, limit } => {
                let stats = StatsReply::TopTrades(self.stats.top_trades(limit));
                self.reply(Reply::Stats { context, stats });
            }
            Command::TopUsers { context, limit } => {
                let stats = StatsReply::TopUsers(self.stats.top_users(limit));
                self.reply(Reply::Stats { context, stats });
            }
            Command::UserTrades { context, user, limit } => {
                let stats = StatsReply::UserTrades {
                    user,
                    trades: self.stats.user_trades(user, limit),
                };
                self.reply(Reply::Stats { context, stats });
            }
            Command::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    /// Admits a request and hands it to the Worker. Returns its sequence
    /// number.
    pub fn enqueue(&mut self, context: ReplyContext, item: TradeItem) -> Result<u64, AdmissionError> {
        if self.paused {
            return Err(AdmissionError::Paused);
        }
        let user = context.user;
        if let Some(seq) = self.by_user.get(&user) {
            let pending = self
                .active
                .get(seq)
                .map(|request| request.item.to_string())
                .unwrap_or_default();
            return Err(AdmissionError::Duplicate { item: pending });
        }
        let name = item.to_string();
        if self.active.len() > self.config.common_item_depth && self.common.contains(&name) {
            return Err(AdmissionError::DepthPolicy {
                item: name,
                depth: self.config.common_item_depth,
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        debug!("admitting #{seq} for {user}: {name}");
        self.admit(TradeRequest { context, item, seq });
        self.persist();
        self.broadcast_depth();
        Ok(seq)
    }

    fn admit(&mut self, request: TradeRequest) {
        let seq = request.seq;
        self.by_user.insert(request.user(), seq);
        if self.channels.intake.send(WorkItem::Trade(request.clone())).is_err() {
            warn!("worker intake closed; request #{seq} kept for the next run");
        }
        self.active.insert(seq, request);
    }

    /// Cancels `user`'s request. Blocks until the Worker has resolved the
    /// cancel target, draining completions meanwhile.
    ///
    /// This runs on the Manager's own loop: other commands, ListQueue and
    /// Enqueue included, wait until the Worker reaches its next checkpoint,
    /// which can take several seconds during menu navigation.
    pub fn cancel(&mut self, user: UserId) -> CancelResult {
        // The Worker sends `Finished` before clearing its in-progress mark,
        // so draining after this read sees any trade that already ended.
        let in_progress = self.cancel.in_progress_seq();
        self.drain_events();
        let mut removed_queued = false;
        if let Some(&seq) = self.by_user.get(&user) {
            if in_progress != Some(seq) {
                self.remove(user, seq);
                self.notify_worker(user, seq);
                removed_queued = true;
            }
        }

        self.cancel.request(user);
        loop {
            match self.cancel.wait_resolved(CANCEL_SLICE) {
                Ok(true) => break,
                Ok(false) => {}
                Err(err) => warn!("cancel wait failed: {err}"),
            }
            if !self.drain_events() {
                warn!("worker gone while cancelling for {user}");
                break;
            }
        }
        let interrupted = self.cancel.finish();

        if removed_queued {
            self.persist();
            self.broadcast_depth();
        }
        if interrupted {
            CancelResult::InProgress
        } else if removed_queued {
            CancelResult::Queued
        } else {
            CancelResult::NotFound
        }
    }

    /// Drops every queued request that has not started. Returns how many.
    pub fn clear(&mut self) -> usize {
        let in_progress = self.cancel.in_progress_seq();
        self.drain_events();
        let queued: Vec<(UserId, u64)> = self
            .active
            .values()
            .filter(|request| Some(request.seq) != in_progress)
            .map(|request| (request.user(), request.seq))
            .collect();
        for &(user, seq) in &queued {
            self.remove(user, seq);
            self.notify_worker(user, seq);
        }
        if !queued.is_empty() {
            self.persist();
            self.broadcast_depth();
        }
        queued.len()
    }

    pub fn pause(&mut self) {
        info!("queue paused with {} active requests", self.active.len());
        self.paused = true;
        self.persist();
    }

    pub fn resume(&mut self) {
        info!("queue resumed");
        self.paused = false;
    }

    pub fn listing(&self) -> QueueListing {
        let in_progress = self.cancel.in_progress_seq();
        let entry = |request: &TradeRequest| QueueEntry {
            user: request.user(),
            user_name: request.context.user_name.clone(),
            item: request.item.to_string(),
        };
        QueueListing {
            in_progress: in_progress
                .and_then(|seq| self.active.get(&seq))
                .map(entry),
            queued: self
                .active
                .values()
                .filter(|request| Some(request.seq) != in_progress)
                .take(self.config.list_limit)
                .map(entry)
                .collect(),
            total: self.active.len(),
        }
    }

    /// Applies pending Worker events. Returns false once the Worker is gone.
    pub fn drain_events(&mut self) -> bool {
        loop {
            match self.channels.events.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Finished { user, seq, finish } => {
                let Some(request) = self.remove(user, seq) else {
                    debug!("completion for #{seq} ({user}) after removal");
                    return;
                };
                debug!("#{seq} for {user} finished: {finish:?}");
                if finish == Finish::Completed {
                    self.stats.record(user, &request.item);
                    if let Err(err) = self.stats_store.save(&self.stats) {
                        warn!(
                            "failed to save stats {}: {err}",
                            self.stats_store.path().display()
                        );
                    }
                }
                self.persist();
                self.broadcast_depth();
            }
            WorkerEvent::Requeued { user, seq, attempt } => {
                info!("#{seq} for {user} hit a communication error; retry {attempt}");
            }
        }
    }

    fn remove(&mut self, user: UserId, seq: u64) -> Option<TradeRequest> {
        let request = self.active.remove(&seq)?;
        if self.by_user.get(&user) == Some(&seq) {
            self.by_user.remove(&user);
        }
        Some(request)
    }

    fn notify_worker(&self, user: UserId, seq: u64) {
        if self
            .channels
            .cancel_notices
            .send(CancelNotice { user, seq })
            .is_err()
        {
            debug!("worker gone; cancel notice for #{seq} dropped");
        }
    }

    fn persist(&self) {
        let result = if self.active.is_empty() {
            self.snapshots.remove()
        } else {
            let requests: Vec<TradeRequest> = self.active.values().cloned().collect();
            self.snapshots.save(&requests)
        };
        if let Err(err) = result {
            warn!(
                "failed to persist queue {}: {err}",
                self.snapshots.path().display()
            );
        }
    }

    fn shutdown(&mut self) {
        self.persist();
        if self.channels.intake.send(WorkItem::Shutdown).is_err() {
            debug!("worker already stopped");
        }
    }

    fn broadcast_depth(&self) {
        self.reply(Reply::QueueChanged {
            depth: self.active.len(),
        });
    }

    fn reply(&self, reply: Reply) {
        if self.channels.replies.send(reply).is_err() {
            debug!("reply channel closed");
        }
    }
}
