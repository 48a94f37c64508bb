//! Runs the Queue Manager and the Trade Worker on their own threads.
//!
//! ```text
//!   TradeService::start
//!     ├─ Router::for_chips / for_parts   (built once, validated, shared)
//!     ├─ thread "queue-manager"  ── QueueManager::run
//!     └─ thread "trade-worker"   ── TradeWorker::run
//! ```

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{info, warn};

use crate::catalog::{Catalog, TradeItem};
use crate::clock::Clock;
use crate::config::BotConfig;
use crate::error::{Error, Result};
use crate::link::{ControllerSink, LinkError};
use crate::queue::{CancellationSignal, Command, QueueManager, Reply, Wiring};
use crate::router::Router;
use crate::script::{ScriptRunner, Timing, Vision};
use crate::worker::TradeWorker;

/// Builds both routers and checks every catalogue item is reachable.
pub fn build_routers(catalog: &Catalog) -> Result<(Router, Router)> {
    let chips = Router::for_chips(catalog)?;
    let parts = Router::for_parts(catalog)?;
    let chip_items: Vec<TradeItem> = catalog
        .tradable_chips()
        .iter()
        .cloned()
        .map(TradeItem::Chip)
        .collect();
    let part_items: Vec<TradeItem> = catalog
        .parts()
        .iter()
        .cloned()
        .map(TradeItem::Part)
        .collect();
    let checked = chips.validate(&chip_items)? + parts.validate(&part_items)?;
    info!("validated routes to {checked} items");
    Ok((chips, parts))
}

pub struct TradeService {
    commands: Sender<Command>,
    replies: Receiver<Reply>,
    cancel: Arc<CancellationSignal>,
    manager: JoinHandle<()>,
    worker: JoinHandle<std::result::Result<(), LinkError>>,
}

impl TradeService {
    pub fn start<S, V, C>(
        config: &BotConfig,
        catalog: &Catalog,
        sink: S,
        vision: V,
        clock: C,
    ) -> Result<Self>
    where
        S: ControllerSink + 'static,
        V: Vision + 'static,
        C: Clock,
    {
        let (chips, parts) = build_routers(catalog)?;
        let wiring = Wiring::new();

        let manager = QueueManager::new(
            config.queue.clone(),
            catalog.common_items().clone(),
            wiring.manager,
            Arc::clone(&wiring.cancel),
        );
        let runner = ScriptRunner::new(sink, vision, clock, Timing::from(&config.script));
        let mut worker = TradeWorker::new(
            runner,
            chips,
            parts,
            config.worker.clone(),
            wiring.worker,
            Arc::clone(&wiring.cancel),
        );

        let manager = thread::Builder::new()
            .name("queue-manager".to_string())
            .spawn(move || manager.run())?;
        let worker = thread::Builder::new()
            .name("trade-worker".to_string())
            .spawn(move || {
                let result = worker.run();
                if let Err(err) = &result {
                    warn!("trade worker exited: {err}");
                }
                result
            })?;

        Ok(Self {
            commands: wiring.commands,
            replies: wiring.replies,
            cancel: wiring.cancel,
            manager,
            worker,
        })
    }

    /// A new handle for submitting commands.
    pub fn commands(&self) -> Sender<Command> {
        self.commands.clone()
    }

    pub fn submit(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::Panicked("queue-manager"))
    }

    pub fn replies(&self) -> &Receiver<Reply> {
        &self.replies
    }

    pub fn cancellation(&self) -> &Arc<CancellationSignal> {
        &self.cancel
    }

    /// Stops both tasks and waits for them. A worker that died on its link
    /// reports that error here.
    pub fn shutdown(self) -> Result<()> {
        if self.commands.send(Command::Shutdown).is_err() {
            warn!("queue manager already stopped");
        }
        drop(self.commands);
        self.manager
            .join()
            .map_err(|_| Error::Panicked("queue-manager"))?;
        self.worker
            .join()
            .map_err(|_| Error::Panicked("trade-worker"))??;
        info!("trade service stopped");
        Ok(())
    }
}
