use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::link::{repeat_count, ControllerCommand, DPad, REPORT_PERIOD};

/// One recently issued input, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEntry {
    Command(ControllerCommand),
    Wait(Duration),
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEntry::Wait(duration) => write!(f, "Wait {}ms", duration.as_millis()),
            TraceEntry::Command(cmd) => {
                let mut parts: Vec<String> = Vec::new();
                if !cmd.buttons.is_empty() {
                    parts.push(cmd.buttons.names().join(" | "));
                }
                if cmd.dpad != DPad::Center {
                    parts.push(format!("{:?}", cmd.dpad));
                }
                if !cmd.left.is_centered() {
                    parts.push(format!("LS {} {}", cmd.left.angle, cmd.left.intensity));
                }
                if !cmd.right.is_centered() {
                    parts.push(format!("RS {} {}", cmd.right.angle, cmd.right.intensity));
                }
                if parts.is_empty() {
                    parts.push("nothing".to_string());
                }
                f.write_str(&parts.join(", "))?;
                if let Some(hold) = cmd.hold {
                    // what the device actually holds, in whole report periods
                    let held = u128::from(repeat_count(hold)) * REPORT_PERIOD.as_millis();
                    write!(f, " {held}ms")?;
                }
                Ok(())
            }
        }
    }
}

/// Bounded ring of the most recent inputs.
#[derive(Debug, Clone)]
pub struct InputTrace {
    entries: VecDeque<TraceEntry>,
    capacity: usize,
}

impl InputTrace {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: TraceEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest first.
    pub fn render(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}
