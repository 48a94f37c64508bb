use std::time::Duration;

use log::{debug, trace};

use crate::clock::Clock;
use crate::config::ScriptConfig;
use crate::link::{Buttons, ControllerCommand, ControllerSink, DPad};

use super::trace::{InputTrace, TraceEntry};
use super::vision::{Frame, Region, Vision};
use super::ScriptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub hold: Duration,
    pub poll_interval: Duration,
    pub trace_capacity: usize,
}

impl Default for Timing {
    fn default() -> Self {
        Self::from(&ScriptConfig::default())
    }
}

impl From<&ScriptConfig> for Timing {
    fn from(config: &ScriptConfig) -> Self {
        Self {
            hold: Duration::from_millis(config.hold_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            trace_capacity: config.trace_capacity,
        }
    }
}

/// Drives the controller and polls the screen.
///
/// Every press is a held state followed by a neutral settle period; the
/// runner sleeps through both so the next input never overlaps.
pub struct ScriptRunner<S, V, C> {
    sink: S,
    vision: V,
    clock: C,
    timing: Timing,
    trace: InputTrace,
}

impl<S: ControllerSink, V: Vision, C: Clock> ScriptRunner<S, V, C> {
    pub fn new(sink: S, vision: V, clock: C, timing: Timing) -> Self {
        Self {
            sink,
            vision,
            clock,
            trace: InputTrace::new(timing.trace_capacity),
            timing,
        }
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn vision_mut(&mut self) -> &mut V {
        &mut self.vision
    }

    /// Sends one command as-is, recording it in the trace.
    pub fn send(&mut self, command: ControllerCommand) -> Result<(), ScriptError> {
        self.trace.push(TraceEntry::Command(command));
        trace!("send {}", TraceEntry::Command(command));
        self.sink.send(&command)?;
        Ok(())
    }

    /// Holds `command` for `hold`, then a neutral state for `settle`.
    pub fn tap(
        &mut self,
        command: ControllerCommand,
        hold: Duration,
        settle: Duration,
    ) -> Result<(), ScriptError> {
        self.send(command.hold(hold))?;
        self.send(ControllerCommand::neutral().hold(settle))?;
        self.clock.sleep(hold + settle);
        Ok(())
    }

    /// Presses `buttons` with the default hold and settle.
    pub fn press(&mut self, buttons: Buttons) -> Result<(), ScriptError> {
        let hold = self.timing.hold;
        self.tap(ControllerCommand::neutral().press(buttons), hold, hold)
    }

    /// Presses `buttons` with the default hold and a custom settle.
    pub fn press_then_wait(&mut self, buttons: Buttons, settle_ms: u64) -> Result<(), ScriptError> {
        let hold = self.timing.hold;
        self.tap(
            ControllerCommand::neutral().press(buttons),
            hold,
            Duration::from_millis(settle_ms),
        )
    }

    pub fn direction(&mut self, dpad: DPad) -> Result<(), ScriptError> {
        let hold = self.timing.hold;
        self.tap(ControllerCommand::neutral().dpad(dpad), hold, hold)
    }

    pub fn stick(&mut self, angle: u16, intensity: u8, hold: Duration) -> Result<(), ScriptError> {
        let settle = self.timing.hold;
        self.tap(ControllerCommand::neutral().left_stick(angle, intensity), hold, settle)
    }

    pub fn a(&mut self) -> Result<(), ScriptError> {
        self.press(Buttons::A)
    }

    pub fn b(&mut self) -> Result<(), ScriptError> {
        self.press(Buttons::B)
    }

    pub fn x(&mut self) -> Result<(), ScriptError> {
        self.press(Buttons::X)
    }

    pub fn up(&mut self) -> Result<(), ScriptError> {
        self.direction(DPad::Up)
    }

    pub fn down(&mut self) -> Result<(), ScriptError> {
        self.direction(DPad::Down)
    }

    pub fn wait(&mut self, duration: Duration) {
        self.trace.push(TraceEntry::Wait(duration));
        self.clock.sleep(duration);
    }

    pub fn wait_ms(&mut self, millis: u64) {
        self.wait(Duration::from_millis(millis));
    }

    pub fn capture(&mut self) -> Result<Frame, ScriptError> {
        Ok(self.vision.capture()?)
    }

    /// Captures a frame and reads the line in `region`.
    pub fn read_text(&mut self, region: Region, invert: bool) -> Result<String, ScriptError> {
        let frame = self.vision.capture()?;
        Ok(self.vision.recognize_line(&frame, region, invert)?)
    }

    /// Polls `region` until `matches` accepts its text or `timeout` passes.
    /// Returns whether the predicate was satisfied.
    pub fn wait_for_text<F>(
        &mut self,
        region: Region,
        invert: bool,
        timeout: Duration,
        matches: F,
    ) -> Result<bool, ScriptError>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = self.clock.now() + timeout;
        loop {
            let text = self.read_text(region, invert)?;
            if matches(&text) {
                debug!("matched screen text {text:?}");
                return Ok(true);
            }
            if self.clock.now() >= deadline {
                debug!("gave up waiting on {region:?}, last text {text:?}");
                return Ok(false);
            }
            self.clock.sleep(self.timing.poll_interval);
        }
    }

    /// PNG of `region` in a fresh capture.
    pub fn snapshot_png(&mut self, region: Region, invert: bool) -> Result<Vec<u8>, ScriptError> {
        let frame = self.vision.capture()?;
        Ok(self.vision.encode_png(&frame, region, invert)?)
    }

    /// PNG of a whole fresh capture.
    pub fn screen_png(&mut self) -> Result<Vec<u8>, ScriptError> {
        let frame = self.vision.capture()?;
        let region = Region::new(0, 0, frame.width, frame.height);
        Ok(self.vision.encode_png(&frame, region, false)?)
    }

    /// Recent inputs, oldest first.
    pub fn trace(&self) -> Vec<String> {
        self.trace.render()
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::link::LinkError;
    use std::collections::VecDeque;
    use std::io;

    #[derive(Default)]
    struct RecordingSink(Vec<ControllerCommand>);

    impl ControllerSink for RecordingSink {
        fn send(&mut self, command: &ControllerCommand) -> Result<(), LinkError> {
            self.0.push(*command);
            Ok(())
        }
    }

    /// Returns queued lines, then repeats the last one.
    struct Lines(VecDeque<String>);

    impl Vision for Lines {
        fn capture(&mut self) -> io::Result<Frame> {
            Ok(Frame::empty())
        }

        fn recognize_line(&mut self, _: &Frame, _: Region, _: bool) -> io::Result<String> {
            if self.0.len() > 1 {
                Ok(self.0.pop_front().unwrap_or_default())
            } else {
                Ok(self.0.front().cloned().unwrap_or_default())
            }
        }

        fn encode_png(&mut self, _: &Frame, _: Region, _: bool) -> io::Result<Vec<u8>> {
            Ok(b"\x89PNG".to_vec())
        }
    }

    fn runner(lines: &[&str]) -> ScriptRunner<RecordingSink, Lines, ManualClock> {
        let lines = Lines(lines.iter().map(|s| s.to_string()).collect());
        ScriptRunner::new(RecordingSink::default(), lines, ManualClock::new(), Timing::default())
    }

    const REGION: Region = Region::new(0, 0, 10, 10);

    #[test]
    fn press_holds_then_settles() {
        let mut runner = runner(&[""]);
        runner.a().unwrap();
        let sent = &runner.sink_mut().0;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].buttons, Buttons::A);
        assert_eq!(sent[0].hold, Some(Duration::from_millis(160)));
        assert!(sent[1].is_neutral());
        assert_eq!(runner.clock().now(), Duration::from_millis(320));
        assert_eq!(runner.trace(), vec!["A 160ms", "nothing 160ms"]);
    }

    #[test]
    fn wait_for_text_matches_after_polls() {
        let mut runner = runner(&["", "Loading", "Sort : ID"]);
        let found = runner
            .wait_for_text(REGION, true, Duration::from_secs(10), |t| t == "Sort : ID")
            .unwrap();
        assert!(found);
        assert_eq!(runner.clock().now(), Duration::from_millis(200));
    }

    #[test]
    fn wait_for_text_times_out() {
        let mut runner = runner(&["nope"]);
        let found = runner
            .wait_for_text(REGION, true, Duration::from_secs(1), |t| t == "yes")
            .unwrap();
        assert!(!found);
        assert!(runner.clock().now() >= Duration::from_secs(1));
    }

    #[test]
    fn trace_is_bounded() {
        let mut runner = runner(&[""]);
        for _ in 0..40 {
            runner.wait_ms(1);
        }
        assert_eq!(runner.trace().len(), 32);
    }
}
