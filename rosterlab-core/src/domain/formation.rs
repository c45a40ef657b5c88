use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::category::Category;

/// Required starter count per category.
///
/// Categories absent from `slots` require zero starters. The reference presets
/// total 12 (ten outfield players, a goalkeeper and a coach), but any total is
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formation {
    pub name: String,
    pub slots: BTreeMap<Category, usize>,
}

/// Names of the built-in formations.
pub const PRESET_NAMES: [&str; 7] = ["3-4-3", "3-5-2", "4-3-3", "4-4-2", "4-5-1", "5-3-2", "5-4-1"];

impl Formation {
    pub fn new(name: impl Into<String>, slots: impl IntoIterator<Item = (Category, usize)>) -> Self {
        Self {
            name: name.into(),
            slots: slots.into_iter().filter(|(_, n)| *n > 0).collect(),
        }
    }

    /// Look up a built-in formation by name (e.g. `"4-3-3"`).
    pub fn preset(name: &str) -> Option<Self> {
        use Category::*;
        let (fullbacks, defenders, midfielders, attackers) = match name {
            "3-4-3" => (0, 3, 4, 3),
            "3-5-2" => (0, 3, 5, 2),
            "4-3-3" => (2, 2, 3, 3),
            "4-4-2" => (2, 2, 4, 2),
            "4-5-1" => (2, 2, 5, 1),
            "5-3-2" => (2, 3, 3, 2),
            "5-4-1" => (2, 3, 4, 1),
            _ => return None,
        };
        Some(Self::new(
            name,
            [
                (Goalkeeper, 1),
                (Fullback, fullbacks),
                (Defender, defenders),
                (Midfielder, midfielders),
                (Attacker, attackers),
                (Coach, 1),
            ],
        ))
    }

    pub fn presets() -> Vec<Self> {
        PRESET_NAMES.iter().filter_map(|n| Self::preset(n)).collect()
    }

    pub fn count(&self, category: Category) -> usize {
        self.slots.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.slots.values().sum()
    }

    /// Categories with at least one required starter, in natural order.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.slots.iter().filter(|(_, n)| **n > 0).map(|(c, _)| *c)
    }
}

impl fmt::Display for Formation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.name)?;
        for (i, (category, count)) in self.slots.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}×{}", count, category.code())?;
        }
        write!(f, ")")
    }
}
