//! Channel wiring between the chat front-end, the Manager and the Worker.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use super::cancel::CancellationSignal;
use super::message::{CancelNotice, Command, Reply, WorkItem, WorkerEvent};

/// Manager's ends.
pub struct ManagerChannels {
    pub commands: Receiver<Command>,
    pub replies: Sender<Reply>,
    pub intake: Sender<WorkItem>,
    pub cancel_notices: Sender<CancelNotice>,
    pub events: Receiver<WorkerEvent>,
}

/// Worker's ends.
pub struct WorkerChannels {
    pub intake: Receiver<WorkItem>,
    pub cancel_notices: Receiver<CancelNotice>,
    pub events: Sender<WorkerEvent>,
    pub replies: Sender<Reply>,
}

/// Everything the two tasks share, plus the front-end's ends.
pub struct Wiring {
    pub commands: Sender<Command>,
    pub replies: Receiver<Reply>,
    pub manager: ManagerChannels,
    pub worker: WorkerChannels,
    pub cancel: Arc<CancellationSignal>,
}

impl Wiring {
    pub fn new() -> Self {
        let (command_tx, command_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        let (intake_tx, intake_rx) = mpsc::channel();
        let (notice_tx, notice_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        Self {
            commands: command_tx,
            replies: reply_rx,
            manager: ManagerChannels {
                commands: command_rx,
                replies: reply_tx.clone(),
                intake: intake_tx,
                cancel_notices: notice_tx,
                events: event_rx,
            },
            worker: WorkerChannels {
                intake: intake_rx,
                cancel_notices: notice_rx,
                events: event_tx,
                replies: reply_tx,
            },
            cancel: Arc::new(CancellationSignal::new()),
        }
    }
}

impl Default for Wiring {
    fn default() -> Self {
        Self::new()
    }
}
