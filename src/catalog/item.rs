use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Code {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    #[serde(rename = "*", alias = "Star")]
    Star,
}

impl Code {
    /// Parses a user-facing code letter; `*` is the wildcard code.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw == "*" {
            return Some(Code::Star);
        }
        let mut chars = raw.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        if chars.next().is_some() || !letter.is_ascii_uppercase() {
            return None;
        }
        const LETTERS: [Code; 26] = [
            Code::A,
            Code::B,
            Code::C,
            Code::D,
            Code::E,
            Code::F,
            Code::G,
            Code::H,
            Code::I,
            Code::J,
            Code::K,
            Code::L,
            Code::M,
            Code::N,
            Code::O,
            Code::P,
            Code::Q,
            Code::R,
            Code::S,
            Code::T,
            Code::U,
            Code::V,
            Code::W,
            Code::X,
            Code::Y,
            Code::Z,
        ];
        Some(LETTERS[(letter as u8 - b'A') as usize])
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Star => f.write_str("*"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Element {
    Fire,
    Water,
    Elec,
    Wood,
    Sword,
    Wind,
    Cursor,
    Object,
    Plus,
    Break,
    Null,
}

/// Chip class; declaration order is the in-game grouping order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChipKind {
    Standard,
    Mega,
    Giga,
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chip {
    pub name: String,
    pub id: String,
    pub code: Code,
    pub attack: u16,
    pub element: Element,
    pub megabytes: u16,
    pub kind: ChipKind,
}

impl Chip {
    /// Id used for ID-order sorting. Link navi chips ("C..." ids) sort as if
    /// they were numbered after chip 007.
    pub fn sorting_id(&self) -> String {
        if self.is_link_navi_chip() {
            format!("007 {}", self.id)
        } else {
            self.id.clone()
        }
    }

    pub fn is_link_navi_chip(&self) -> bool {
        self.id.starts_with('C')
    }

    /// Terminal sentinel row at the end of every chip ordering.
    pub fn nothing() -> Self {
        Self {
            name: "Nothing".to_string(),
            id: "999".to_string(),
            code: Code::Star,
            attack: 0,
            element: Element::Null,
            megabytes: 100,
            kind: ChipKind::Nothing,
        }
    }

    /// Blank row shown by the "No" sort mode.
    pub fn placeholder() -> Self {
        Self {
            name: String::new(),
            id: String::new(),
            code: Code::Star,
            attack: 0,
            element: Element::Null,
            megabytes: 0,
            kind: ChipKind::Nothing,
        }
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == ChipKind::Nothing {
            return f.write_str("Nothing");
        }
        write!(
            f,
            "{} - {} {} ({:?}, {}, {}MB)",
            self.id, self.name, self.code, self.element, self.attack, self.megabytes
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Pink,
    Yellow,
    Green,
    Blue,
    Red,
    Nothing,
}

impl Color {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "white" => Some(Color::White),
            "pink" => Some(Color::Pink),
            "yellow" => Some(Color::Yellow),
            "green" => Some(Color::Green),
            "blue" => Some(Color::Blue),
            "red" => Some(Color::Red),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bug {
    Nothing,
    Activation,
    Buster,
    Custom,
    Damage,
    Emotion,
    Encounter,
    Movement,
    Panel,
    Result,
}

/// A program part; identity is the full attribute set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaviCustPart {
    pub name: String,
    pub color: Color,
    pub description: String,
    pub compression: String,
    pub bug: Bug,
    pub layout: Vec<String>,
    pub internal_id: u32,
}

impl NaviCustPart {
    /// Terminal sentinel row at the end of the part ordering.
    pub fn nothing() -> Self {
        Self {
            name: "Nothing".to_string(),
            color: Color::Nothing,
            description: "Nothing".to_string(),
            compression: String::new(),
            bug: Bug::Nothing,
            layout: vec!["     ".to_string(); 5],
            internal_id: 999,
        }
    }
}

impl fmt::Display for NaviCustPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == "Nothing" {
            return f.write_str("Nothing");
        }
        write!(f, "{} ({:?})", self.name, self.color)
    }
}

/// A tradeable entity. Routing and queueing only rely on equality; the
/// variant decides which trade screen the worker opens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "item")]
pub enum TradeItem {
    Chip(Chip),
    Part(NaviCustPart),
}

impl fmt::Display for TradeItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeItem::Chip(chip) => chip.fmt(f),
            TradeItem::Part(part) => part.fmt(f),
        }
    }
}

impl From<Chip> for TradeItem {
    fn from(value: Chip) -> Self {
        TradeItem::Chip(value)
    }
}

impl From<NaviCustPart> for TradeItem {
    fn from(value: NaviCustPart) -> Self {
        TradeItem::Part(value)
    }
}
