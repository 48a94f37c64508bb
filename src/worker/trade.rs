use std::collections::HashSet;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::catalog::TradeItem;
use crate::clock::Clock;
use crate::config::WorkerConfig;
use crate::link::{Buttons, ControllerCommand, ControllerSink, LinkError};
use crate::queue::{
    CancellationSignal, Reaction, Reply, ReplyContext, TradeRequest, WorkItem, WorkerChannels,
    WorkerEvent,
};
use crate::router::{Input, Router};
use crate::script::{ScriptError, ScriptRunner, Vision};

use super::screens::*;
use super::{
    TradeOutcome, MSG_NO_ROOM_CODE, MSG_NO_ROUTE, MSG_NO_MAIN_MENU, MSG_NO_TRADE_SCREEN,
    MSG_RETRIES_EXHAUSTED, MSG_UNEXPECTED_STATE,
};

const SCREEN_TIMEOUT: Duration = Duration::from_secs(10);
const ROOM_CODE_TIMEOUT: Duration = Duration::from_secs(15);
const TRADE_COMPLETE_TIMEOUT: Duration = Duration::from_secs(20);

/// Serves the intake one request at a time on the physical controller.
pub struct TradeWorker<S, V, C> {
    runner: ScriptRunner<S, V, C>,
    chips: Router,
    parts: Router,
    config: WorkerConfig,
    channels: WorkerChannels,
    cancel: Arc<CancellationSignal>,
    /// Sequence numbers to drop on dequeue.
    cancelled: HashSet<u64>,
}

impl<S: ControllerSink, V: Vision, C: Clock> TradeWorker<S, V, C> {
    pub fn new(
        runner: ScriptRunner<S, V, C>,
        chips: Router,
        parts: Router,
        config: WorkerConfig,
        channels: WorkerChannels,
        cancel: Arc<CancellationSignal>,
    ) -> Self {
        Self {
            runner,
            chips,
            parts,
            config,
            channels,
            cancel,
            cancelled: HashSet::new(),
        }
    }

    pub fn runner_mut(&mut self) -> &mut ScriptRunner<S, V, C> {
        &mut self.runner
    }

    /// Runs until `Shutdown` or a closed intake. Only a broken controller
    /// link ends the loop with an error.
    pub fn run(&mut self) -> Result<(), LinkError> {
        if let Err(err) = self.pair_controller() {
            link_fatal(err, "pairing check")?;
        }
        while let Some(request) = self.next_request()? {
            self.serve(request)?;
        }
        info!("trade worker stopped");
        Ok(())
    }

    fn pair_controller(&mut self) -> Result<(), ScriptError> {
        let hold = self.runner.timing().hold;
        self.runner
            .tap(ControllerCommand::neutral(), hold, Duration::from_millis(2000))?;
        if self.runner.read_text(PAIRING_PROMPT, true)? == PAIRING_PROMPT_TEXT {
            info!("controller pairing screen found; pairing");
            let quick = Duration::from_millis(100);
            let settle = Duration::from_millis(2000);
            self.runner
                .tap(ControllerCommand::neutral().press(Buttons::L | Buttons::R), quick, settle)?;
            self.runner
                .tap(ControllerCommand::neutral().press(Buttons::A), quick, settle)?;
        }
        Ok(())
    }

    fn next_request(&mut self) -> Result<Option<TradeRequest>, LinkError> {
        let keepalive = Duration::from_millis(self.config.keepalive_interval_ms.max(1));
        loop {
            let item = match self.channels.intake.recv_timeout(keepalive) {
                Ok(item) => item,
                Err(RecvTimeoutError::Timeout) => {
                    self.idle()?;
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("intake closed");
                    return Ok(None);
                }
            };
            match item {
                WorkItem::Shutdown => {
                    info!("shutdown requested");
                    return Ok(None);
                }
                WorkItem::ScreenCapture(context) => self.publish_screen(context)?,
                WorkItem::Trade(request) => {
                    self.drain_notices();
                    let dropped = self.cancelled.remove(&request.seq);
                    // Intake is FIFO by seq; older notices can never match again.
                    self.cancelled.retain(|&seq| seq > request.seq);
                    if dropped {
                        debug!("dropping cancelled request #{}", request.seq);
                        continue;
                    }
                    return Ok(Some(request));
                }
            }
        }
    }

    /// Idle wake: resolve any pending cancel and keep the console awake.
    fn idle(&mut self) -> Result<(), LinkError> {
        self.checkpoint();
        match self.runner.x() {
            Ok(()) => Ok(()),
            Err(err) => link_fatal(err, "keepalive"),
        }
    }

    fn drain_notices(&mut self) {
        while let Ok(notice) = self.channels.cancel_notices.try_recv() {
            self.cancelled.insert(notice.seq);
        }
    }

    /// True when the in-progress trade must be abandoned.
    fn checkpoint(&mut self) -> bool {
        self.drain_notices();
        let noticed = self
            .cancel
            .in_progress_seq()
            .is_some_and(|seq| self.cancelled.remove(&seq));
        let targeted = self.cancel.checkpoint().unwrap_or_else(|err| {
            warn!("failed to signal cancel resolution: {err}");
            false
        });
        noticed || targeted
    }

    fn serve(&mut self, request: TradeRequest) -> Result<(), LinkError> {
        let user = request.user();
        let seq = request.seq;
        info!(
            "trading {} to {} (#{seq})",
            request.item, request.context.user_name
        );
        self.cancel.begin(user, seq);
        let outcome = match self.settle(&request) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.cancel.end();
                return Err(err);
            }
        };

        self.report(&request, outcome);
        // The Manager must see the completion before the request stops
        // looking in progress.
        self.event(WorkerEvent::Finished {
            user,
            seq,
            finish: outcome.finish(),
        });
        self.cancel.end();
        Ok(())
    }

    /// Attempts the trade until it reaches a terminal outcome.
    fn settle(&mut self, request: &TradeRequest) -> Result<TradeOutcome, LinkError> {
        let mut attempt = 0u32;
        loop {
            let outcome = self.attempt(request)?;
            if outcome != TradeOutcome::CommunicationError {
                return Ok(outcome);
            }
            attempt += 1;
            self.reply(Reply::text(&request.context, outcome.message(), None));
            if self
                .config
                .max_communication_retries
                .is_some_and(|max| attempt > max)
            {
                warn!("#{} gave up after {attempt} communication errors", request.seq);
                return Ok(TradeOutcome::UnexpectedState {
                    message: MSG_RETRIES_EXHAUSTED,
                });
            }
            self.event(WorkerEvent::Requeued {
                user: request.user(),
                seq: request.seq,
                attempt,
            });
        }
    }

    fn attempt(&mut self, request: &TradeRequest) -> Result<TradeOutcome, LinkError> {
        match self.trade(request) {
            Ok(outcome) => Ok(outcome),
            Err(ScriptError::Link(err)) => Err(err),
            Err(ScriptError::Vision(err)) => {
                warn!("vision failed during #{}: {err}", request.seq);
                Ok(TradeOutcome::UnexpectedState {
                    message: MSG_UNEXPECTED_STATE,
                })
            }
        }
    }

    fn trade(&mut self, request: &TradeRequest) -> Result<TradeOutcome, ScriptError> {
        self.runner.clear_trace();

        let opened = match &request.item {
            TradeItem::Chip(_) => self.open_chip_trade()?,
            TradeItem::Part(_) => self.open_part_trade()?,
        };
        if !opened {
            return Ok(TradeOutcome::UnexpectedState {
                message: MSG_NO_TRADE_SCREEN,
            });
        }

        if self.checkpoint() {
            self.back_out_of_selection()?;
            return Ok(TradeOutcome::Cancelled);
        }

        let router = match &request.item {
            TradeItem::Chip(_) => &self.chips,
            TradeItem::Part(_) => &self.parts,
        };
        let inputs = match router.inputs(&request.item) {
            Ok(inputs) => inputs,
            Err(err) => {
                error!("{err}");
                self.back_out_of_selection()?;
                return Ok(TradeOutcome::UnexpectedState {
                    message: MSG_NO_ROUTE,
                });
            }
        };
        debug!("{} inputs to {}", inputs.len(), request.item);
        for input in inputs {
            self.apply(input)?;
        }

        if self.checkpoint() {
            self.back_out_of_selection()?;
            return Ok(TradeOutcome::Cancelled);
        }

        self.runner.a()?;
        self.runner.press_then_wait(Buttons::A, 3000)?;

        let has_code = self.runner.wait_for_text(ROOM_CODE_TEXT, true, ROOM_CODE_TIMEOUT, |text| {
            text.starts_with(ROOM_CODE_PREFIX)
        })?;
        if !has_code {
            return Ok(TradeOutcome::UnexpectedState {
                message: MSG_NO_ROOM_CODE,
            });
        }
        let png = self.runner.snapshot_png(ROOM_CODE_IMAGE, true)?;
        self.reply(Reply::RoomCode {
            context: request.context.clone(),
            item: request.item.to_string(),
            png,
        });

        self.await_counterparty()
    }

    fn open_chip_trade(&mut self) -> Result<bool, ScriptError> {
        // Trade, Private Trade, Create Room, Chip Trade, Next
        self.runner.down()?;
        self.runner.a()?;
        self.runner.down()?;
        self.runner.a()?;
        self.runner.a()?;
        self.runner.a()?;
        self.runner.a()?;
        self.runner
            .wait_for_text(CHIP_SORT_HEADER, true, SCREEN_TIMEOUT, |text| text == CHIP_SORT_TEXT)
    }

    fn open_part_trade(&mut self) -> Result<bool, ScriptError> {
        // Trade, Private Trade, Create Room, Program Trade, Next
        self.runner.down()?;
        self.runner.a()?;
        self.runner.down()?;
        self.runner.a()?;
        self.runner.a()?;
        self.runner.down()?;
        self.runner.a()?;
        self.runner.a()?;
        self.runner
            .wait_for_text(PART_FIRST_ROW, false, SCREEN_TIMEOUT, |text| text == PART_FIRST_TEXT)
    }

    fn back_out_of_selection(&mut self) -> Result<(), ScriptError> {
        for _ in 0..5 {
            self.runner.press_then_wait(Buttons::B, 200)?;
        }
        self.runner.up()
    }

    fn apply(&mut self, input: Input) -> Result<(), ScriptError> {
        match input {
            Input::PageForward => self.runner.press(Buttons::R),
            Input::PageBackward => self.runner.press(Buttons::L),
            Input::LineDown => self.runner.down(),
            Input::LineUp => self.runner.up(),
            Input::NextOrdering => self.runner.press(Buttons::PLUS),
        }
    }

    fn await_counterparty(&mut self) -> Result<TradeOutcome, ScriptError> {
        let deadline =
            self.runner.clock().now() + Duration::from_secs(self.config.trade_timeout_secs);
        while self.runner.clock().now() < deadline {
            if self.checkpoint() {
                self.runner.press_then_wait(Buttons::B, 1000)?;
                self.runner.press_then_wait(Buttons::A, 1000)?;
                return Ok(TradeOutcome::Cancelled);
            }
            if self.runner.read_text(COMMUNICATION_ERROR, true)? == COMMUNICATION_ERROR_TEXT {
                self.runner.press_then_wait(Buttons::A, 1000)?;
                return Ok(TradeOutcome::CommunicationError);
            }
            if self.runner.read_text(LOBBY_COUNT, true)? == LOBBY_JOINED_TEXT {
                return self.complete_trade();
            }
            let poll = self.runner.timing().poll_interval;
            self.runner.clock().sleep(poll);
        }

        self.runner.press_then_wait(Buttons::B, 1000)?;
        self.runner.press_then_wait(Buttons::A, 1000)?;
        Ok(TradeOutcome::TimedOut)
    }

    fn complete_trade(&mut self) -> Result<TradeOutcome, ScriptError> {
        debug!("counterparty joined");
        self.runner.wait_ms(500);
        self.runner.press_then_wait(Buttons::A, 1000)?;
        self.runner.a()?;
        let complete = self
            .runner
            .wait_for_text(TRADE_COMPLETE, true, TRADE_COMPLETE_TIMEOUT, |text| {
                text == TRADE_COMPLETE_TEXT
            })?;
        if !complete {
            return Ok(TradeOutcome::UnexpectedState {
                message: MSG_UNEXPECTED_STATE,
            });
        }
        self.runner.press_then_wait(Buttons::A, 1000)?;
        let home = self
            .runner
            .wait_for_text(MAIN_MENU, true, SCREEN_TIMEOUT, |text| text == MAIN_MENU_TEXT)?;
        if !home {
            return Ok(TradeOutcome::UnexpectedState {
                message: MSG_NO_MAIN_MENU,
            });
        }
        self.runner.wait_ms(2000);
        Ok(TradeOutcome::Completed)
    }

    fn report(&mut self, request: &TradeRequest, outcome: TradeOutcome) {
        let context = &request.context;
        match outcome {
            TradeOutcome::Completed => {
                info!("#{} completed", request.seq);
                self.reply(Reply::text(context, outcome.message(), Some(Reaction::Ok)));
            }
            // The Manager answers the Cancel command itself.
            TradeOutcome::Cancelled => info!("#{} cancelled", request.seq),
            TradeOutcome::TimedOut | TradeOutcome::CommunicationError => {
                info!("#{} ended: {}", request.seq, outcome.message());
                self.reply(Reply::text(context, outcome.message(), None));
            }
            TradeOutcome::UnexpectedState { message } => {
                warn!("#{} failed: {message}", request.seq);
                let screen_png = match self.runner.screen_png() {
                    Ok(png) => Some(png),
                    Err(err) => {
                        warn!("no failure screenshot: {err}");
                        None
                    }
                };
                self.reply(Reply::TradeFailed {
                    context: context.clone(),
                    message: message.to_string(),
                    recent_inputs: self.runner.trace(),
                    screen_png,
                });
            }
        }
    }

    fn publish_screen(&mut self, context: ReplyContext) -> Result<(), LinkError> {
        match self.runner.screen_png() {
            Ok(png) => self.reply(Reply::Screen { context, png }),
            Err(ScriptError::Link(err)) => return Err(err),
            Err(ScriptError::Vision(err)) => {
                warn!("screen capture failed: {err}");
                self.reply(Reply::text(
                    &context,
                    "Unable to capture the screen.",
                    Some(Reaction::Error),
                ));
            }
        }
        Ok(())
    }

    fn reply(&self, reply: Reply) {
        if self.channels.replies.send(reply).is_err() {
            debug!("reply channel closed");
        }
    }

    fn event(&self, event: WorkerEvent) {
        if self.channels.events.send(event).is_err() {
            debug!("manager gone; event dropped");
        }
    }
}

/// Link failures end the Worker; vision failures outside a trade are logged.
fn link_fatal(err: ScriptError, during: &str) -> Result<(), LinkError> {
    match err {
        ScriptError::Link(err) => {
            error!("controller link failed during {during}: {err}");
            Err(err)
        }
        ScriptError::Vision(err) => {
            warn!("vision failed during {during}: {err}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Chip, ChipKind, Color, NaviCustPart};
    use crate::clock::ManualClock;
    use crate::link::DPad;
    use crate::queue::{CancelNotice, Finish, UserId, Wiring};
    use crate::script::{Frame, Region, Timing};
    use std::collections::{HashMap, VecDeque};
    use std::io;
    use std::sync::mpsc::{Receiver, Sender};

    #[derive(Default)]
    struct RecordingSink {
        sent: Vec<ControllerCommand>,
        broken: bool,
    }

    impl ControllerSink for RecordingSink {
        fn send(&mut self, command: &ControllerCommand) -> Result<(), LinkError> {
            if self.broken {
                return Err(LinkError::Closed);
            }
            self.sent.push(*command);
            Ok(())
        }
    }

    /// Per-region text; each region yields its queue, then repeats the last.
    #[derive(Default)]
    struct Screens {
        lines: HashMap<Region, VecDeque<String>>,
        on_read: Option<(Region, Box<dyn FnMut() + Send>)>,
    }

    impl Screens {
        fn show(mut self, region: Region, lines: &[&str]) -> Self {
            self.lines
                .insert(region, lines.iter().map(|s| s.to_string()).collect());
            self
        }

        fn when_read(mut self, region: Region, hook: impl FnMut() + Send + 'static) -> Self {
            self.on_read = Some((region, Box::new(hook)));
            self
        }

        fn happy_path() -> Self {
            Screens::default()
                .show(CHIP_SORT_HEADER, &[CHIP_SORT_TEXT])
                .show(PART_FIRST_ROW, &[PART_FIRST_TEXT])
                .show(ROOM_CODE_TEXT, &["", "Room Code: 0427"])
                .show(LOBBY_COUNT, &["0/15", "1/15"])
                .show(TRADE_COMPLETE, &[TRADE_COMPLETE_TEXT])
                .show(MAIN_MENU, &[MAIN_MENU_TEXT])
        }
    }

    impl Vision for Screens {
        fn capture(&mut self) -> io::Result<Frame> {
            Ok(Frame::new(4, 4, vec![0u8; 16]))
        }

        fn recognize_line(&mut self, _: &Frame, region: Region, _: bool) -> io::Result<String> {
            if let Some((watched, hook)) = self.on_read.as_mut() {
                if *watched == region {
                    hook();
                }
            }
            let Some(lines) = self.lines.get_mut(&region) else {
                return Ok(String::new());
            };
            if lines.len() > 1 {
                Ok(lines.pop_front().unwrap_or_default())
            } else {
                Ok(lines.front().cloned().unwrap_or_default())
            }
        }

        fn encode_png(&mut self, _: &Frame, region: Region, _: bool) -> io::Result<Vec<u8>> {
            Ok(format!("png {}x{}", region.width, region.height).into_bytes())
        }
    }

    fn chip(name: &str) -> TradeItem {
        let mut chip = Chip::nothing();
        chip.name = name.to_string();
        chip.kind = ChipKind::Standard;
        TradeItem::Chip(chip)
    }

    fn part(name: &str) -> TradeItem {
        let mut part = NaviCustPart::nothing();
        part.name = name.to_string();
        part.color = Color::White;
        TradeItem::Part(part)
    }

    struct Bench {
        worker: TradeWorker<RecordingSink, Screens, ManualClock>,
        intake: Sender<WorkItem>,
        notices: Sender<CancelNotice>,
        events: Receiver<WorkerEvent>,
        replies: Receiver<Reply>,
        cancel: Arc<CancellationSignal>,
    }

    fn bench(screens: Screens, config: WorkerConfig) -> Bench {
        bench_with(screens, config, Arc::new(CancellationSignal::new()))
    }

    fn bench_with(screens: Screens, config: WorkerConfig, cancel: Arc<CancellationSignal>) -> Bench {
        let chips = Router::new(vec![vec![
            chip("Cannon"),
            chip("Sword"),
            chip("Recov10"),
            TradeItem::Chip(Chip::nothing()),
        ]])
        .unwrap();
        let parts = Router::new(vec![vec![
            part("SuprArmr"),
            part("Collect"),
            TradeItem::Part(NaviCustPart::nothing()),
        ]])
        .unwrap();
        let wiring = Wiring::new();
        let runner = ScriptRunner::new(
            RecordingSink::default(),
            screens,
            ManualClock::new(),
            Timing::default(),
        );
        let worker = TradeWorker::new(
            runner,
            chips,
            parts,
            config,
            wiring.worker,
            Arc::clone(&cancel),
        );
        Bench {
            worker,
            intake: wiring.manager.intake,
            notices: wiring.manager.cancel_notices,
            events: wiring.manager.events,
            replies: wiring.replies,
            cancel,
        }
    }

    fn request(user: u64, seq: u64, item: TradeItem) -> WorkItem {
        WorkItem::Trade(TradeRequest {
            context: ReplyContext::new(UserId(user), format!("user{user}")),
            item,
            seq,
        })
    }

    fn texts(replies: &[Reply]) -> Vec<String> {
        replies
            .iter()
            .filter_map(|reply| match reply {
                Reply::Message { text, .. } => text.clone(),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn completed_trade_publishes_room_code() {
        let mut b = bench(Screens::happy_path(), WorkerConfig::default());
        b.intake.send(request(1, 1, chip("Recov10"))).unwrap();
        b.intake.send(WorkItem::Shutdown).unwrap();
        b.worker.run().unwrap();

        let replies: Vec<Reply> = b.replies.try_iter().collect();
        assert!(matches!(
            &replies[0],
            Reply::RoomCode { png, .. } if png == b"png 400x80"
        ));
        assert_eq!(texts(&replies), vec![crate::worker::MSG_SUCCESS]);
        assert_eq!(
            b.events.try_recv().unwrap(),
            WorkerEvent::Finished {
                user: UserId(1),
                seq: 1,
                finish: Finish::Completed
            }
        );
        assert_eq!(b.cancel.in_progress(), None);

        // Navigation presses Down twice; the route to the third row adds two more.
        let downs = b
            .worker
            .runner_mut()
            .sink_mut()
            .sent
            .iter()
            .filter(|command| command.dpad == DPad::Down)
            .count();
        assert_eq!(downs, 4);
    }

    #[test]
    fn part_trade_uses_program_menu() {
        let mut b = bench(Screens::happy_path(), WorkerConfig::default());
        b.intake.send(request(2, 1, part("Collect"))).unwrap();
        b.intake.send(WorkItem::Shutdown).unwrap();
        b.worker.run().unwrap();
        assert!(matches!(
            b.events.try_recv().unwrap(),
            WorkerEvent::Finished {
                finish: Finish::Completed,
                ..
            }
        ));
    }

    #[test]
    fn communication_error_retries_same_request() {
        let screens = Screens::happy_path()
            .show(COMMUNICATION_ERROR, &[COMMUNICATION_ERROR_TEXT, ""])
            .show(LOBBY_COUNT, &["1/15"]);
        let mut b = bench(screens, WorkerConfig::default());
        b.intake.send(request(1, 7, chip("Sword"))).unwrap();
        b.intake.send(WorkItem::Shutdown).unwrap();
        b.worker.run().unwrap();

        let events: Vec<WorkerEvent> = b.events.try_iter().collect();
        assert_eq!(
            events,
            vec![
                WorkerEvent::Requeued {
                    user: UserId(1),
                    seq: 7,
                    attempt: 1
                },
                WorkerEvent::Finished {
                    user: UserId(1),
                    seq: 7,
                    finish: Finish::Completed
                },
            ]
        );
        let replies: Vec<Reply> = b.replies.try_iter().collect();
        assert_eq!(
            texts(&replies),
            vec![crate::worker::MSG_COMMUNICATION_ERROR, crate::worker::MSG_SUCCESS]
        );
        let codes = replies
            .iter()
            .filter(|reply| matches!(reply, Reply::RoomCode { .. }))
            .count();
        assert_eq!(codes, 2);
    }

    #[test]
    fn bounded_retries_give_up() {
        let screens = Screens::happy_path().show(COMMUNICATION_ERROR, &[COMMUNICATION_ERROR_TEXT]);
        let config = WorkerConfig {
            max_communication_retries: Some(1),
            ..WorkerConfig::default()
        };
        let mut b = bench(screens, config);
        b.intake.send(request(1, 1, chip("Sword"))).unwrap();
        b.intake.send(WorkItem::Shutdown).unwrap();
        b.worker.run().unwrap();

        let events: Vec<WorkerEvent> = b.events.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], WorkerEvent::Requeued { attempt: 1, .. }));
        assert!(matches!(
            events[1],
            WorkerEvent::Finished {
                finish: Finish::Failed,
                ..
            }
        ));
        let failure = b
            .replies
            .try_iter()
            .find_map(|reply| match reply {
                Reply::TradeFailed {
                    message,
                    recent_inputs,
                    screen_png,
                    ..
                } => Some((message, recent_inputs, screen_png)),
                _ => None,
            })
            .unwrap();
        assert_eq!(failure.0, MSG_RETRIES_EXHAUSTED);
        assert!(!failure.1.is_empty());
        assert_eq!(failure.2.as_deref(), Some(&b"png 4x4"[..]));
    }

    #[test]
    fn cancel_target_is_honoured_before_routing() {
        let mut b = bench(Screens::happy_path(), WorkerConfig::default());
        b.cancel.request(UserId(3));
        b.intake.send(request(3, 1, chip("Sword"))).unwrap();
        b.intake.send(WorkItem::Shutdown).unwrap();
        b.worker.run().unwrap();

        assert_eq!(
            b.events.try_recv().unwrap(),
            WorkerEvent::Finished {
                user: UserId(3),
                seq: 1,
                finish: Finish::Cancelled
            }
        );
        assert!(b.cancel.wait_resolved(Duration::ZERO).unwrap());
        assert!(b.cancel.finish());
        assert!(b.replies.try_iter().all(|reply| !matches!(reply, Reply::RoomCode { .. })));

        let sent = &b.worker.runner_mut().sink_mut().sent;
        let backs = sent.iter().filter(|c| c.buttons == Buttons::B).count();
        assert_eq!(backs, 5);
    }

    #[test]
    fn cancel_during_wait_backs_out() {
        let signal = Arc::new(CancellationSignal::new());
        let requester = Arc::clone(&signal);
        let screens = Screens::happy_path()
            .show(LOBBY_COUNT, &["0/15"])
            .when_read(LOBBY_COUNT, move || requester.request(UserId(4)));
        let mut b = bench_with(screens, WorkerConfig::default(), signal);
        b.intake.send(request(4, 1, chip("Sword"))).unwrap();
        b.intake.send(WorkItem::Shutdown).unwrap();
        b.worker.run().unwrap();

        assert!(matches!(
            b.events.try_recv().unwrap(),
            WorkerEvent::Finished {
                finish: Finish::Cancelled,
                ..
            }
        ));
        let replies: Vec<Reply> = b.replies.try_iter().collect();
        assert!(matches!(replies[0], Reply::RoomCode { .. }));
        assert!(texts(&replies).is_empty());
        assert!(b.cancel.finish());
    }

    #[test]
    fn queued_cancel_notice_skips_request() {
        let mut b = bench(Screens::happy_path(), WorkerConfig::default());
        b.intake.send(request(1, 1, chip("Sword"))).unwrap();
        b.intake.send(request(2, 2, chip("Cannon"))).unwrap();
        b.intake.send(WorkItem::Shutdown).unwrap();
        b.notices.send(CancelNotice { user: UserId(1), seq: 1 }).unwrap();
        b.worker.run().unwrap();

        let events: Vec<WorkerEvent> = b.events.try_iter().collect();
        assert_eq!(
            events,
            vec![WorkerEvent::Finished {
                user: UserId(2),
                seq: 2,
                finish: Finish::Completed
            }]
        );
    }

    #[test]
    fn served_notices_do_not_accumulate() {
        let mut b = bench(Screens::happy_path(), WorkerConfig::default());
        // #1 was served long ago; #5 is still waiting in the intake.
        b.notices.send(CancelNotice { user: UserId(1), seq: 1 }).unwrap();
        b.notices.send(CancelNotice { user: UserId(5), seq: 5 }).unwrap();
        b.intake.send(request(3, 3, chip("Sword"))).unwrap();
        b.intake.send(WorkItem::Shutdown).unwrap();
        b.worker.run().unwrap();

        assert_eq!(b.worker.cancelled, HashSet::from([5]));
        assert_eq!(
            b.events.try_recv().unwrap(),
            WorkerEvent::Finished {
                user: UserId(3),
                seq: 3,
                finish: Finish::Completed
            }
        );
    }

    #[test]
    fn counterparty_timeout() {
        let screens = Screens::happy_path().show(LOBBY_COUNT, &["0/15"]);
        let config = WorkerConfig {
            trade_timeout_secs: 2,
            ..WorkerConfig::default()
        };
        let mut b = bench(screens, config);
        b.intake.send(request(1, 1, chip("Sword"))).unwrap();
        b.intake.send(WorkItem::Shutdown).unwrap();
        b.worker.run().unwrap();

        let replies: Vec<Reply> = b.replies.try_iter().collect();
        assert_eq!(texts(&replies), vec![crate::worker::MSG_TIMED_OUT]);
        assert!(matches!(
            b.events.try_recv().unwrap(),
            WorkerEvent::Finished {
                finish: Finish::TimedOut,
                ..
            }
        ));
    }

    #[test]
    fn missing_room_code_is_unexpected_state() {
        let screens = Screens::happy_path().show(ROOM_CODE_TEXT, &["Connecting..."]);
        let mut b = bench(screens, WorkerConfig::default());
        b.intake.send(request(1, 1, chip("Sword"))).unwrap();
        b.intake.send(WorkItem::Shutdown).unwrap();
        b.worker.run().unwrap();

        let failed = b.replies.try_iter().any(|reply| {
            matches!(reply, Reply::TradeFailed { message, .. } if message == MSG_NO_ROOM_CODE)
        });
        assert!(failed);
        assert!(matches!(
            b.events.try_recv().unwrap(),
            WorkerEvent::Finished {
                finish: Finish::Failed,
                ..
            }
        ));
    }

    #[test]
    fn pairing_prompt_is_answered() {
        let screens = Screens::default().show(PAIRING_PROMPT, &[PAIRING_PROMPT_TEXT]);
        let mut b = bench(screens, WorkerConfig::default());
        b.intake.send(WorkItem::Shutdown).unwrap();
        b.worker.run().unwrap();

        let sent = &b.worker.runner_mut().sink_mut().sent;
        assert!(sent.iter().any(|c| c.buttons == (Buttons::L | Buttons::R)
            && c.hold == Some(Duration::from_millis(100))));
        assert!(sent.iter().any(|c| c.buttons == Buttons::A));
    }

    #[test]
    fn screen_capture_is_published() {
        let mut b = bench(Screens::default(), WorkerConfig::default());
        let context = ReplyContext::new(UserId(8), "admin");
        b.intake.send(WorkItem::ScreenCapture(context.clone())).unwrap();
        b.intake.send(WorkItem::Shutdown).unwrap();
        b.worker.run().unwrap();
        assert_eq!(
            b.replies.try_recv().unwrap(),
            Reply::Screen {
                context,
                png: b"png 4x4".to_vec()
            }
        );
    }

    #[test]
    fn broken_link_stops_worker() {
        let mut b = bench(Screens::happy_path(), WorkerConfig::default());
        b.worker.runner_mut().sink_mut().broken = true;
        b.intake.send(request(1, 1, chip("Sword"))).unwrap();
        assert!(matches!(b.worker.run(), Err(LinkError::Closed)));
        assert!(b.events.try_recv().is_err());
    }
}
