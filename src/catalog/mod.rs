//! Item catalogue: tradeable chips and parts plus the in-game list orderings.
//!
//! The catalogue is authored elsewhere as JSON; this module only loads it and
//! derives the seven per-sort-mode orderings the router turns into graphs.

mod item;
mod ordering;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

pub use item::{Bug, Chip, ChipKind, Code, Color, Element, NaviCustPart, TradeItem};
pub use ordering::{chip_ordering, natural_order, SortMode, NO_SORT_ROWS};

pub const STANDARD_CHIPS_FILE: &str = "chips.json";
pub const MEGA_CHIPS_FILE: &str = "megachips.json";
pub const UNTRADABLE_CHIPS_FILE: &str = "untradable.json";
pub const PARTS_FILE: &str = "navicust.json";
pub const COMMON_ITEMS_FILE: &str = "common_items.json";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unknown code {code:?} for chip {name:?}")]
    UnknownCode { name: String, code: String },
}

/// One catalogue row; a chip with several codes expands to one [`Chip`] per code.
#[derive(Debug, Deserialize)]
pub struct ChipEntry {
    pub name: String,
    pub id: String,
    pub codes: Vec<String>,
    pub atk: u16,
    pub element: Element,
    pub mb: u16,
}

impl ChipEntry {
    pub fn expand(&self, kind: ChipKind) -> Result<Vec<Chip>, CatalogError> {
        self.codes
            .iter()
            .map(|raw| {
                let code = Code::parse(raw).ok_or_else(|| CatalogError::UnknownCode {
                    name: self.name.clone(),
                    code: raw.clone(),
                })?;
                Ok(Chip {
                    name: self.name.clone(),
                    id: self.id.clone(),
                    code,
                    attack: self.atk,
                    element: self.element,
                    megabytes: self.mb,
                    kind,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct PartEntry {
    pub name: String,
    pub color: Color,
    pub description: String,
    pub compression: String,
    pub bug: Bug,
    pub layout: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    chips: Vec<Chip>,
    parts: Vec<NaviCustPart>,
    common: HashSet<String>,
    chip_index: HashMap<(String, Code), usize>,
}

impl Catalog {
    /// Builds a catalogue from already-expanded rows.
    ///
    /// Tradable chips are the standard chips minus `untradable`, in natural
    /// order, followed by the mega chips in catalogue order.
    pub fn new(
        standard: Vec<Chip>,
        mega: Vec<Chip>,
        untradable: &[Chip],
        parts: Vec<NaviCustPart>,
        common: HashSet<String>,
    ) -> Self {
        let blocked: HashSet<&Chip> = untradable.iter().collect();
        let mut chips: Vec<Chip> = standard
            .into_iter()
            .filter(|chip| !blocked.contains(chip))
            .collect();
        chips.sort_by(natural_order);
        chips.dedup();
        chips.extend(mega);

        let chip_index = chips
            .iter()
            .enumerate()
            .map(|(idx, chip)| ((chip.name.to_lowercase(), chip.code), idx))
            .collect();

        Self {
            chips,
            parts,
            common,
            chip_index,
        }
    }

    /// Loads the catalogue JSON files from `dir`. The common-items list is
    /// optional.
    pub fn load(dir: &Path) -> Result<Self, CatalogError> {
        let standard = expand_all(read_json::<Vec<ChipEntry>>(&dir.join(STANDARD_CHIPS_FILE))?, ChipKind::Standard)?;
        let mega = expand_all(read_json::<Vec<ChipEntry>>(&dir.join(MEGA_CHIPS_FILE))?, ChipKind::Mega)?;
        let untradable = expand_all(
            read_json::<Vec<ChipEntry>>(&dir.join(UNTRADABLE_CHIPS_FILE))?,
            ChipKind::Standard,
        )?;
        let parts = read_json::<Vec<PartEntry>>(&dir.join(PARTS_FILE))?
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| NaviCustPart {
                name: entry.name,
                color: entry.color,
                description: entry.description,
                compression: entry.compression,
                bug: entry.bug,
                layout: entry.layout,
                internal_id: idx as u32,
            })
            .collect();

        let common_path = dir.join(COMMON_ITEMS_FILE);
        let common = if common_path.exists() {
            read_json::<Vec<String>>(&common_path)?.into_iter().collect()
        } else {
            HashSet::new()
        };

        let catalog = Self::new(standard, mega, &untradable, parts, common);
        debug!(
            "loaded catalogue from {}: {} chips, {} parts",
            dir.display(),
            catalog.chips.len(),
            catalog.parts.len()
        );
        Ok(catalog)
    }

    pub fn tradable_chips(&self) -> &[Chip] {
        &self.chips
    }

    pub fn parts(&self) -> &[NaviCustPart] {
        &self.parts
    }

    /// The seven chip orderings in [`SortMode::ALL`] order.
    pub fn chip_orderings(&self) -> Vec<Vec<TradeItem>> {
        SortMode::ALL
            .iter()
            .map(|mode| {
                chip_ordering(*mode, &self.chips)
                    .into_iter()
                    .map(TradeItem::Chip)
                    .collect()
            })
            .collect()
    }

    /// Parts in catalogue order followed by the terminal sentinel.
    pub fn part_ordering(&self) -> Vec<TradeItem> {
        self.parts
            .iter()
            .cloned()
            .chain(std::iter::once(NaviCustPart::nothing()))
            .map(TradeItem::Part)
            .collect()
    }

    pub fn find_chip(&self, name: &str, code: &str) -> Option<&Chip> {
        let code = Code::parse(code)?;
        self.chip_index
            .get(&(name.to_lowercase(), code))
            .map(|idx| &self.chips[*idx])
    }

    pub fn find_part(&self, name: &str, color: &str) -> Option<&NaviCustPart> {
        let color = Color::parse(color)?;
        self.parts
            .iter()
            .find(|part| part.color == color && part.name.eq_ignore_ascii_case(name))
    }

    /// Whether `item` is on the common list, compared by its display text.
    pub fn is_common(&self, item: &TradeItem) -> bool {
        self.common.contains(&item.to_string())
    }

    pub fn common_items(&self) -> &HashSet<String> {
        &self.common
    }

    /// Every item the worker may be asked to route to.
    pub fn all_items(&self) -> impl Iterator<Item = TradeItem> + '_ {
        self.chips
            .iter()
            .cloned()
            .map(TradeItem::Chip)
            .chain(self.parts.iter().cloned().map(TradeItem::Part))
    }
}

fn expand_all(entries: Vec<ChipEntry>, kind: ChipKind) -> Result<Vec<Chip>, CatalogError> {
    let mut chips = Vec::with_capacity(entries.len());
    for entry in &entries {
        chips.extend(entry.expand(kind)?);
    }
    Ok(chips)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let raw = std::fs::read(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
