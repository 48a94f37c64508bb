//! Device endpoint.
//!
//! Runs next to the emulated controller. One automation client is served at
//! a time over TCP; a live gamepad feeds [`Arbiter::human_button`] and
//! [`Arbiter::human_report`]; a report pump drains [`Arbiter::next_report`]
//! into a [`ReportSink`] once per report period.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};

use crate::clock::Clock;

use super::protocol::{Buttons, Report, Request, Response, NEUTRAL_REPORT};
use super::LinkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Automated,
    HumanOverride,
}

/// Pending automated reports and the one currently being emitted.
///
/// A report without a repeat count is emitted until something else is
/// queued. A report with count `n` is emitted `n + 1` times and then gives
/// way to the queue, or to the neutral report if the queue is empty.
#[derive(Debug)]
pub struct ReportQueue {
    pending: VecDeque<(Report, Option<u16>)>,
    current: Report,
    // None: sticky; Some(n): n more emissions after this one
    remaining: Option<i32>,
}

impl Default for ReportQueue {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            current: NEUTRAL_REPORT,
            remaining: None,
        }
    }
}

impl ReportQueue {
    pub fn push(&mut self, report: Report, repeat: Option<u16>) {
        self.pending.push_back((report, repeat));
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Replaces the current report with a sticky one, leaving the queue alone.
    pub fn set_current(&mut self, report: Report) {
        self.current = report;
        self.remaining = None;
    }

    pub fn next(&mut self) -> Report {
        let exhausted = matches!(self.remaining, Some(n) if n < 0);
        if self.remaining.is_none() || exhausted {
            if let Some((report, repeat)) = self.pending.pop_front() {
                self.current = report;
                self.remaining = repeat.map(i32::from);
            } else if exhausted {
                self.current = NEUTRAL_REPORT;
                self.remaining = None;
            }
        }
        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
        }
        self.current
    }
}

/// Outcome of an automated write offered to the [`Arbiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    Queued,
    Overridden,
}

#[derive(Debug)]
struct HostState {
    mode: Mode,
    enabled: bool,
    stopped: bool,
    queue: ReportQueue,
    gamepad: Report,
}

/// Mutual exclusion between automated and human input.
#[derive(Debug)]
pub struct Arbiter {
    state: Mutex<HostState>,
    changed: Condvar,
}

impl Default for Arbiter {
    fn default() -> Self {
        Self {
            state: Mutex::new(HostState {
                mode: Mode::Automated,
                enabled: false,
                stopped: false,
                queue: ReportQueue::default(),
                gamepad: NEUTRAL_REPORT,
            }),
            changed: Condvar::new(),
        }
    }
}

impl Arbiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn mode(&self) -> Mode {
        self.lock().mode
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Marks the device as enumerated by the console.
    pub fn set_enabled(&self) {
        self.lock().enabled = true;
        self.changed.notify_all();
    }

    pub fn stop(&self) {
        self.lock().stopped = true;
        self.changed.notify_all();
    }

    /// Blocks until the device is enabled. Returns false if stopped first.
    pub fn wait_enabled(&self) -> bool {
        let mut state = self.lock();
        while !state.enabled && !state.stopped {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        !state.stopped
    }

    /// Blocks until automation owns the controller again. Returns false if
    /// stopped first.
    pub fn wait_automated(&self) -> bool {
        let mut state = self.lock();
        while state.mode == Mode::HumanOverride && !state.stopped {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        !state.stopped
    }

    pub fn submit(&self, report: Report, repeat: Option<u16>) -> Submit {
        let mut state = self.lock();
        if state.mode == Mode::HumanOverride {
            return Submit::Overridden;
        }
        state.queue.push(report, repeat);
        Submit::Queued
    }

    /// Button edge from the live gamepad. Releasing Home toggles the mode and
    /// drops queued automated reports.
    pub fn human_button(&self, button: Buttons, pressed: bool) {
        let mut state = self.lock();
        if button == Buttons::HOME {
            if pressed {
                return;
            }
            state.queue.clear();
            state.mode = match state.mode {
                Mode::Automated => Mode::HumanOverride,
                Mode::HumanOverride => Mode::Automated,
            };
            info!("controller mode now {:?}", state.mode);
            let current = match state.mode {
                Mode::Automated => NEUTRAL_REPORT,
                Mode::HumanOverride => state.gamepad,
            };
            state.queue.set_current(current);
            drop(state);
            self.changed.notify_all();
            return;
        }

        let mut bits = Buttons::from_bits(u16::from_le_bytes([state.gamepad[0], state.gamepad[1]]));
        if pressed {
            bits.insert(button);
        } else {
            bits.remove(button);
        }
        let [lo, hi] = bits.bits().to_le_bytes();
        state.gamepad[0] = lo;
        state.gamepad[1] = hi;
        if state.mode == Mode::HumanOverride {
            let gamepad = state.gamepad;
            state.queue.set_current(gamepad);
        }
    }

    /// Full gamepad state (sticks, hat). Only reaches the device while the
    /// human holds the controller.
    pub fn human_report(&self, report: Report) {
        let mut state = self.lock();
        state.gamepad = report;
        if state.mode == Mode::HumanOverride {
            state.queue.set_current(report);
        }
    }

    pub fn next_report(&self) -> Report {
        self.lock().queue.next()
    }

    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }
}

/// Destination of emitted reports.
pub trait ReportSink: Send {
    fn write_report(&mut self, report: &Report) -> io::Result<()>;
}

/// Writes reports to a HID gadget character device such as `/dev/hidg0`.
pub struct HidGadgetSink {
    path: PathBuf,
    device: File,
}

impl HidGadgetSink {
    pub fn open(path: &Path) -> io::Result<Self> {
        let device = OpenOptions::new().read(true).write(true).open(path)?;
        info!("opened hid gadget {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            device,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for HidGadgetSink {
    fn write_report(&mut self, report: &Report) -> io::Result<()> {
        self.device.write_all(report)
    }
}

/// Emits one report per `interval` until the arbiter is stopped. Marks the
/// device enabled once the first report is accepted by the sink.
pub fn pump_reports<S: ReportSink, C: Clock>(
    arbiter: &Arbiter,
    sink: &mut S,
    clock: &C,
    interval: Duration,
) -> io::Result<()> {
    let mut enabled = false;
    while !arbiter.is_stopped() {
        let report = arbiter.next_report();
        sink.write_report(&report)?;
        if !enabled {
            arbiter.set_enabled();
            enabled = true;
        }
        clock.sleep(interval);
    }
    Ok(())
}

/// Accepts automation clients one at a time until a STOP request arrives.
pub fn serve(listener: TcpListener, arbiter: Arc<Arbiter>) -> Result<(), LinkError> {
    info!("controller endpoint listening on {}", listener.local_addr()?);
    loop {
        let (stream, peer) = listener.accept()?;
        info!("accepted controller client {peer}");
        match serve_client(stream, &arbiter) {
            Ok(ClientEnd::Stop) => {
                info!("stop requested by {peer}");
                arbiter.stop();
                return Ok(());
            }
            Ok(ClientEnd::Disconnected) => info!("controller client {peer} disconnected"),
            Err(err) => warn!("controller client {peer} failed: {err}"),
        }
        if arbiter.is_stopped() {
            return Ok(());
        }
    }
}

enum ClientEnd {
    Stop,
    Disconnected,
}

fn serve_client(mut stream: TcpStream, arbiter: &Arbiter) -> Result<ClientEnd, LinkError> {
    stream.set_nodelay(true)?;
    if !arbiter.wait_enabled() {
        return Err(LinkError::Stopped);
    }
    debug!("device enabled, releasing client");
    respond(&mut stream, Response::HostEnabled)?;

    loop {
        let request = match Request::decode(&mut stream) {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(ClientEnd::Disconnected),
            Err(LinkError::UnknownOpcode(op)) => {
                respond(&mut stream, Response::UnknownError)?;
                return Err(LinkError::UnknownOpcode(op));
            }
            Err(err) => return Err(err),
        };

        let (report, repeat) = match request {
            Request::UpdateReport(report) => (report, None),
            Request::UpdateReportNTimes(report, repeat) => (report, Some(repeat)),
            Request::Stop => {
                respond(&mut stream, Response::Ack)?;
                return Ok(ClientEnd::Stop);
            }
        };

        match arbiter.submit(report, repeat) {
            Submit::Queued => respond(&mut stream, Response::Ack)?,
            Submit::Overridden => {
                debug!("holding client during human override");
                respond(&mut stream, Response::UserOverride)?;
                if !arbiter.wait_automated() {
                    return Err(LinkError::Stopped);
                }
                respond(&mut stream, Response::HostEnabled)?;
            }
        }
    }
}

fn respond(stream: &mut TcpStream, response: Response) -> Result<(), LinkError> {
    stream.write_all(&[response.as_u8()])?;
    Ok(())
}
