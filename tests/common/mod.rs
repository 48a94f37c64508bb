#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use tradebot::catalog::{Bug, Chip, ChipKind, Code, Color, Element, NaviCustPart};
use tradebot::link::{ControllerCommand, ControllerSink, LinkError};
use tradebot::queue::Reply;
use tradebot::script::{Frame, Region, Vision};
use tradebot::worker::screens::{
    CHIP_SORT_HEADER, CHIP_SORT_TEXT, LOBBY_COUNT, LOBBY_JOINED_TEXT, MAIN_MENU, MAIN_MENU_TEXT,
    ROOM_CODE_TEXT, TRADE_COMPLETE, TRADE_COMPLETE_TEXT,
};
use tradebot::{BotConfig, Catalog};

/// Accepts every command.
pub struct NullSink;

impl ControllerSink for NullSink {
    fn send(&mut self, _: &ControllerCommand) -> Result<(), LinkError> {
        Ok(())
    }
}

/// Fixed text per region. The lobby reads empty until the gate opens, or
/// forever when there is no gate.
pub struct GameScreen {
    text: HashMap<Region, String>,
    gate: Option<Receiver<()>>,
    joined: bool,
}

impl GameScreen {
    pub fn new(gate: Option<Receiver<()>>) -> Self {
        let text = [
            (CHIP_SORT_HEADER, CHIP_SORT_TEXT.to_string()),
            (ROOM_CODE_TEXT, "Room Code: 3141".to_string()),
            (TRADE_COMPLETE, TRADE_COMPLETE_TEXT.to_string()),
            (MAIN_MENU, MAIN_MENU_TEXT.to_string()),
        ]
        .into_iter()
        .collect();
        Self {
            text,
            gate,
            joined: false,
        }
    }

    /// A counterparty is already waiting whenever the lobby opens.
    pub fn joined() -> Self {
        let mut screen = Self::new(None);
        screen.joined = true;
        screen
    }
}

impl Vision for GameScreen {
    fn capture(&mut self) -> io::Result<Frame> {
        Ok(Frame::new(2, 2, vec![0u8; 4]))
    }

    fn recognize_line(&mut self, _: &Frame, region: Region, _: bool) -> io::Result<String> {
        if region == LOBBY_COUNT {
            if !self.joined {
                match &self.gate {
                    Some(gate) => {
                        let _ = gate.recv();
                        self.joined = true;
                    }
                    None => return Ok("0/15".to_string()),
                }
            }
            return Ok(LOBBY_JOINED_TEXT.to_string());
        }
        Ok(self.text.get(&region).cloned().unwrap_or_default())
    }

    fn encode_png(&mut self, _: &Frame, region: Region, _: bool) -> io::Result<Vec<u8>> {
        Ok(format!("png {}x{}", region.width, region.height).into_bytes())
    }
}

pub fn standard_chip(id: &str, name: &str, code: Code) -> Chip {
    Chip {
        name: name.to_string(),
        id: id.to_string(),
        code,
        attack: 40,
        element: Element::Null,
        megabytes: 8,
        kind: ChipKind::Standard,
    }
}

pub fn part(name: &str, internal_id: u32) -> NaviCustPart {
    NaviCustPart {
        name: name.to_string(),
        color: Color::White,
        description: String::new(),
        compression: String::new(),
        bug: Bug::Nothing,
        layout: vec!["     ".to_string(); 5],
        internal_id,
    }
}

pub fn small_catalog() -> Catalog {
    Catalog::new(
        vec![
            standard_chip("001", "Cannon", Code::A),
            standard_chip("002", "HiCannon", Code::B),
            standard_chip("003", "MCannon", Code::C),
        ],
        Vec::new(),
        &[],
        vec![part("SuprArmr", 0), part("Collect", 1)],
        HashSet::new(),
    )
}

pub fn config_in(dir: &Path) -> BotConfig {
    let mut config = BotConfig::default();
    config.queue.snapshot_path = dir.join("queue.json");
    config.queue.stats_path = dir.join("stats.json");
    config.queue.poll_interval_ms = 10;
    config.worker.keepalive_interval_ms = 20;
    config
}

/// Receives until `found` matches, returning everything seen on the way.
pub fn replies_until(
    replies: &Receiver<Reply>,
    timeout: Duration,
    mut found: impl FnMut(&Reply) -> bool,
) -> Vec<Reply> {
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match replies.recv_timeout(left) {
            Ok(reply) => {
                let done = found(&reply);
                seen.push(reply);
                if done {
                    return seen;
                }
            }
            Err(RecvTimeoutError::Timeout) => panic!("timed out; saw {seen:#?}"),
            Err(RecvTimeoutError::Disconnected) => panic!("replies closed; saw {seen:#?}"),
        }
    }
}

pub fn message_text(reply: &Reply) -> Option<&str> {
    match reply {
        Reply::Message { text, .. } => text.as_deref(),
        _ => None,
    }
}
