#![allow(clippy::upper_case_acronyms)]

//! Controller link wire format.
//!
//! ```text
//! request:  [opcode u8][report 8 bytes][repeat u16 LE]   (repeat only for 0x01)
//! response: [code u8]                                     (one per request)
//!
//! report:   [buttons lo][buttons hi][dpad hat][lx][ly][rx][ry][0]
//! ```

use std::fmt;
use std::io::{self, Read};
use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

use super::LinkError;

pub const REPORT_LEN: usize = 8;

/// Length of one device report period.
pub const REPORT_PERIOD: Duration = Duration::from_millis(8);

pub type Report = [u8; REPORT_LEN];

/// Report with nothing pressed and both sticks centred.
pub const NEUTRAL_REPORT: Report = [0x00, 0x00, 0x08, 0x80, 0x80, 0x80, 0x80, 0x00];

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    UpdateReport = 0x00,
    UpdateReportNTimes = 0x01,
    Stop = 0xFF,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Opcode::UpdateReport),
            0x01 => Some(Opcode::UpdateReportNTimes),
            0xFF => Some(Opcode::Stop),
            _ => None,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Response {
    HostEnabled = 0x00,
    Ack = 0x01,
    Nack = 0x02,
    UserOverride = 0x03,
    UnknownError = 0xFF,
}

impl Response {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Response::HostEnabled),
            0x01 => Some(Response::Ack),
            0x02 => Some(Response::Nack),
            0x03 => Some(Response::UserOverride),
            0xFF => Some(Response::UnknownError),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Replace the current report; it repeats until replaced.
    UpdateReport(Report),
    /// Emit the report `repeat + 1` times, then fall through to what is queued.
    UpdateReportNTimes(Report, u16),
    Stop,
}

impl Request {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::UpdateReport(_) => Opcode::UpdateReport,
            Request::UpdateReportNTimes(..) => Opcode::UpdateReportNTimes,
            Request::Stop => Opcode::Stop,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode() as u8);
        match self {
            Request::UpdateReport(report) => out.extend_from_slice(report),
            Request::UpdateReportNTimes(report, repeat) => {
                out.extend_from_slice(report);
                out.extend_from_slice(&repeat.to_le_bytes());
            }
            Request::Stop => {}
        }
    }

    /// Reads one request. `Ok(None)` on a clean end of stream before the opcode.
    pub fn decode<R: Read>(reader: &mut R) -> Result<Option<Self>, LinkError> {
        let mut opcode = [0u8; 1];
        match reader.read_exact(&mut opcode) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        let opcode = Opcode::from_byte(opcode[0]).ok_or(LinkError::UnknownOpcode(opcode[0]))?;
        let request = match opcode {
            Opcode::UpdateReport => Request::UpdateReport(read_report(reader)?),
            Opcode::UpdateReportNTimes => {
                let report = read_report(reader)?;
                let mut repeat = [0u8; 2];
                read_body(reader, &mut repeat)?;
                Request::UpdateReportNTimes(report, u16::from_le_bytes(repeat))
            }
            Opcode::Stop => Request::Stop,
        };
        Ok(Some(request))
    }
}

fn read_report<R: Read>(reader: &mut R) -> Result<Report, LinkError> {
    let mut report = [0u8; REPORT_LEN];
    read_body(reader, &mut report)?;
    Ok(report)
}

fn read_body<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), LinkError> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => LinkError::Closed,
        _ => LinkError::Io(err),
    })
}

/// Number of report periods covering `hold`, rounded up.
pub fn repeat_count(hold: Duration) -> u16 {
    let period = REPORT_PERIOD.as_nanos();
    let periods = hold.as_nanos().div_ceil(period);
    u16::try_from(periods).unwrap_or(u16::MAX)
}

/// Button bit set, as laid out in the first two report bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Buttons(u16);

impl Buttons {
    pub const NONE: Buttons = Buttons(0);
    pub const Y: Buttons = Buttons(0x0001);
    pub const B: Buttons = Buttons(0x0002);
    pub const A: Buttons = Buttons(0x0004);
    pub const X: Buttons = Buttons(0x0008);
    pub const L: Buttons = Buttons(0x0010);
    pub const R: Buttons = Buttons(0x0020);
    pub const ZL: Buttons = Buttons(0x0040);
    pub const ZR: Buttons = Buttons(0x0080);
    pub const MINUS: Buttons = Buttons(0x0100);
    pub const PLUS: Buttons = Buttons(0x0200);
    pub const L3: Buttons = Buttons(0x0400);
    pub const R3: Buttons = Buttons(0x0800);
    pub const HOME: Buttons = Buttons(0x1000);
    pub const CAPTURE: Buttons = Buttons(0x2000);

    const NAMES: [(Buttons, &'static str); 14] = [
        (Buttons::Y, "Y"),
        (Buttons::B, "B"),
        (Buttons::A, "A"),
        (Buttons::X, "X"),
        (Buttons::L, "L"),
        (Buttons::R, "R"),
        (Buttons::ZL, "ZL"),
        (Buttons::ZR, "ZR"),
        (Buttons::MINUS, "Minus"),
        (Buttons::PLUS, "Plus"),
        (Buttons::L3, "L3"),
        (Buttons::R3, "R3"),
        (Buttons::HOME, "Home"),
        (Buttons::CAPTURE, "Capture"),
    ];

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        Buttons(bits)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, other: Buttons) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Buttons) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Buttons) {
        self.0 &= !other.0;
    }

    /// Names of the set buttons, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(b, _)| self.contains(*b))
            .map(|(_, n)| *n)
            .collect()
    }

    /// Looks up a single button by its display name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(b, _)| *b)
    }
}

impl BitOr for Buttons {
    type Output = Buttons;

    fn bitor(self, rhs: Self) -> Self::Output {
        Buttons(self.0 | rhs.0)
    }
}

impl BitOrAssign for Buttons {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Buttons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("nothing");
        }
        f.write_str(&self.names().join("+"))
    }
}

/// Hat switch position.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DPad {
    Up = 0,
    UpRight = 1,
    Right = 2,
    DownRight = 3,
    Down = 4,
    DownLeft = 5,
    Left = 6,
    UpLeft = 7,
    #[default]
    Center = 8,
}

impl DPad {
    /// Hat position from axis signs; `y` is positive downwards.
    pub fn from_axes(x: i8, y: i8) -> Self {
        match (x.signum(), y.signum()) {
            (-1, -1) => DPad::UpLeft,
            (-1, 0) => DPad::Left,
            (-1, 1) => DPad::DownLeft,
            (0, -1) => DPad::Up,
            (0, 1) => DPad::Down,
            (1, -1) => DPad::UpRight,
            (1, 0) => DPad::Right,
            (1, 1) => DPad::DownRight,
            _ => DPad::Center,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let dpad = match name.to_ascii_lowercase().as_str() {
            "up" => DPad::Up,
            "upright" => DPad::UpRight,
            "right" => DPad::Right,
            "downright" => DPad::DownRight,
            "down" => DPad::Down,
            "downleft" => DPad::DownLeft,
            "left" => DPad::Left,
            "upleft" => DPad::UpLeft,
            "center" => DPad::Center,
            _ => return None,
        };
        Some(dpad)
    }
}

/// Analog stick as direction in degrees (0 = right, 90 = up) and deflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Stick {
    pub angle: u16,
    pub intensity: u8,
}

impl Stick {
    pub const CENTER: Stick = Stick {
        angle: 0,
        intensity: 0,
    };

    pub fn new(angle: u16, intensity: u8) -> Self {
        Self { angle, intensity }
    }

    pub fn is_centered(&self) -> bool {
        self.intensity == 0
    }

    /// Axis bytes; y grows downwards on the wire.
    pub fn axes(&self) -> (u8, u8) {
        let radians = f64::from(self.angle).to_radians();
        let scale = f64::from(self.intensity) / 255.0;
        let dx = (radians.cos() * 127.0 * scale) as i32;
        let dy = (radians.sin() * 127.0 * scale) as i32;
        (axis_byte(dx), axis_byte(-dy))
    }
}

fn axis_byte(delta: i32) -> u8 {
    (delta + 0x80).clamp(0, 0xFF) as u8
}

/// One controller state plus how long to hold it.
///
/// A command without a hold is sticky: the device keeps emitting it until the
/// next one arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ControllerCommand {
    pub buttons: Buttons,
    pub dpad: DPad,
    pub left: Stick,
    pub right: Stick,
    pub hold: Option<Duration>,
}

impl ControllerCommand {
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn press(mut self, buttons: Buttons) -> Self {
        self.buttons |= buttons;
        self
    }

    pub fn dpad(mut self, dpad: DPad) -> Self {
        self.dpad = dpad;
        self
    }

    pub fn left_stick(mut self, angle: u16, intensity: u8) -> Self {
        self.left = Stick::new(angle, intensity);
        self
    }

    pub fn right_stick(mut self, angle: u16, intensity: u8) -> Self {
        self.right = Stick::new(angle, intensity);
        self
    }

    pub fn hold(mut self, hold: Duration) -> Self {
        self.hold = Some(hold);
        self
    }

    pub fn is_neutral(&self) -> bool {
        self.buttons.is_empty()
            && self.dpad == DPad::Center
            && self.left.is_centered()
            && self.right.is_centered()
    }

    pub fn to_report(&self) -> Report {
        let [lo, hi] = self.buttons.bits().to_le_bytes();
        let (lx, ly) = self.left.axes();
        let (rx, ry) = self.right.axes();
        [lo, hi, self.dpad as u8, lx, ly, rx, ry, 0x00]
    }

    /// Wire request: timed commands become a counted report.
    pub fn to_request(&self) -> Request {
        match self.hold {
            Some(hold) if !hold.is_zero() => {
                Request::UpdateReportNTimes(self.to_report(), repeat_count(hold))
            }
            _ => Request::UpdateReport(self.to_report()),
        }
    }
}
