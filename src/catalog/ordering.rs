use std::cmp::{Ordering, Reverse};

use serde::{Deserialize, Serialize};

use super::item::Chip;

/// Number of blank rows the console shows in the "No" sort mode.
pub const NO_SORT_ROWS: usize = 9;

/// In-game chip sort modes, in the order the "next mode" button cycles them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortMode {
    Id,
    Abcde,
    Code,
    Attack,
    Element,
    No,
    Mb,
}

impl SortMode {
    pub const ALL: [SortMode; 7] = [
        SortMode::Id,
        SortMode::Abcde,
        SortMode::Code,
        SortMode::Attack,
        SortMode::Element,
        SortMode::No,
        SortMode::Mb,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SortMode::Id => "ID",
            SortMode::Abcde => "ABCDE",
            SortMode::Code => "Code",
            SortMode::Attack => "Attack",
            SortMode::Element => "Element",
            SortMode::No => "No",
            SortMode::Mb => "MB",
        }
    }
}

/// Natural chip order: kind, then sorting id, then code (`*` last).
pub fn natural_order(a: &Chip, b: &Chip) -> Ordering {
    (a.kind, a.sorting_id(), a.code).cmp(&(b.kind, b.sorting_id(), b.code))
}

/// Rows of the chip list as the console shows them under `mode`, ending with
/// the terminal sentinel. `chips` are the tradable chips.
pub fn chip_ordering(mode: SortMode, chips: &[Chip]) -> Vec<Chip> {
    let mut rows = chips.to_vec();
    match mode {
        SortMode::No => return vec![Chip::placeholder(); NO_SORT_ROWS],
        SortMode::Id => rows.sort_by(natural_order),
        SortMode::Abcde => rows.sort_by_key(|c| (c.name.to_lowercase(), c.kind, c.code)),
        SortMode::Code => rows.sort_by_key(|c| (c.code, c.kind, c.sorting_id())),
        SortMode::Attack => {
            rows.sort_by_key(|c| (Reverse(c.attack), c.kind, c.sorting_id(), c.code))
        }
        SortMode::Element => rows.sort_by_key(|c| (c.element, c.kind, c.sorting_id(), c.code)),
        SortMode::Mb => rows.sort_by_key(|c| (c.megabytes, c.kind, c.sorting_id(), c.code)),
    }
    rows.push(Chip::nothing());
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ChipKind, Code, Element};

    fn chip(name: &str, id: &str, code: Code, attack: u16, element: Element, mb: u16) -> Chip {
        Chip {
            name: name.to_string(),
            id: id.to_string(),
            code,
            attack,
            element,
            megabytes: mb,
            kind: ChipKind::Standard,
        }
    }

    fn sample() -> Vec<Chip> {
        vec![
            chip("Sword", "060", Code::S, 80, Element::Sword, 10),
            chip("Cannon", "001", Code::Star, 40, Element::Null, 12),
            chip("Cannon", "001", Code::A, 40, Element::Null, 12),
            chip("aquaTower", "020", Code::B, 120, Element::Water, 30),
        ]
    }

    fn names(rows: &[Chip]) -> Vec<String> {
        rows.iter().map(|c| format!("{}{}", c.name, c.code)).collect()
    }

    #[test]
    fn id_order_puts_star_after_letters() {
        let rows = chip_ordering(SortMode::Id, &sample());
        assert_eq!(
            names(&rows),
            ["CannonA", "Cannon*", "aquaTowerB", "SwordS", "Nothing*"]
        );
    }

    #[test]
    fn abcde_is_case_insensitive() {
        let rows = chip_ordering(SortMode::Abcde, &sample());
        assert_eq!(rows[0].name, "aquaTower");
        assert_eq!(rows.last(), Some(&Chip::nothing()));
    }

    #[test]
    fn attack_sorts_descending() {
        let rows = chip_ordering(SortMode::Attack, &sample());
        assert_eq!(rows[0].attack, 120);
        assert_eq!(rows[1].attack, 80);
    }

    #[test]
    fn no_mode_is_placeholder_rows() {
        let rows = chip_ordering(SortMode::No, &sample());
        assert_eq!(rows.len(), NO_SORT_ROWS);
        assert!(rows.iter().all(|r| *r == Chip::placeholder()));
    }
}
